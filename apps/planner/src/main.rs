use std::sync::Arc;

use anyhow::Result;
use chrono::{Local, NaiveDate, NaiveTime};
use clap::{Args, Parser, Subcommand};
use client_core::{
    load_settings, providers::OptionsProvider, ApiClient, ChatAssistant, ControllerConfig,
    ControllerServices, DurableSessionStore, EventType, SelectionController, SessionContext,
    Settings, TripParameters, WeatherCondition,
};
use shared::domain::City;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "planner", about = "Transit delay planner")]
struct Cli {
    /// Overrides the configured prediction API base URL.
    #[arg(long)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Health,
    Register {
        username: String,
        password: String,
    },
    Login {
        username: String,
        password: String,
    },
    Logout,
    Whoami,
    Routes {
        #[arg(long)]
        city: Option<String>,
    },
    Predict {
        #[command(flatten)]
        trip: TripArgs,
        #[command(flatten)]
        conditions: ConditionArgs,
        #[arg(long)]
        json: bool,
    },
    Chat {
        message: String,
        #[command(flatten)]
        trip: TripArgs,
    },
}

/// Overrides applied on top of the default cascade.
#[derive(Args, Debug)]
struct TripArgs {
    #[arg(long)]
    city: Option<String>,
    /// Route id or short name.
    #[arg(long)]
    route: Option<String>,
    #[arg(long)]
    direction: Option<String>,
    #[arg(long)]
    source: Option<String>,
    #[arg(long)]
    destination: Option<String>,
}

#[derive(Args, Debug)]
struct ConditionArgs {
    #[arg(long)]
    date: Option<NaiveDate>,
    #[arg(long, value_parser = parse_time_of_day)]
    time: Option<NaiveTime>,
    #[arg(long, default_value = "Clear")]
    weather: WeatherCondition,
    #[arg(long, default_value_t = 20.0)]
    temperature: f64,
    #[arg(long, default_value_t = 0.0)]
    precipitation: f64,
    #[arg(long, default_value = "None")]
    event: EventType,
    #[arg(long, default_value_t = 0)]
    attendance: u32,
    #[arg(long, default_value_t = 1.0)]
    traffic: f64,
}

impl ConditionArgs {
    fn into_parameters(self) -> TripParameters {
        let date = self.date.unwrap_or_else(|| Local::now().date_naive());
        let mut parameters = TripParameters::on(date);
        if let Some(time) = self.time {
            parameters.time_of_day = time;
        }
        parameters.weather_condition = self.weather;
        parameters.temperature_c = self.temperature;
        parameters.precipitation_mm = self.precipitation;
        parameters.event_type = self.event;
        parameters.event_attendance = self.attendance;
        parameters.traffic_factor = self.traffic;
        parameters
    }
}

fn parse_time_of_day(raw: &str) -> Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(raw, "%H:%M")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings();
    if let Some(api_url) = cli.api_url {
        settings.api_base_url = api_url;
    }
    info!(api = %settings.api_base_url, "planner starting");

    let store = DurableSessionStore::initialize(&settings.session_database_url).await?;
    let api = Arc::new(ApiClient::from_settings(&settings)?.with_session_store(store.clone()));
    let mut session = SessionContext::init_from_store(store, api.clone()).await?;

    match cli.command {
        Command::Health => {
            let health = api.health().await;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
        Command::Register { username, password } => {
            session.register(&username, &password).await?;
            println!("Registered {username}. You can now log in.");
        }
        Command::Login { username, password } => {
            let signed_in = session.login(&username, &password).await?;
            println!("Signed in as {}", signed_in.username);
        }
        Command::Logout => {
            session.logout().await?;
            println!("Signed out");
        }
        Command::Whoami => match session.current() {
            Some(current) => println!("{}", current.username),
            None => println!("not signed in"),
        },
        Command::Routes { city } => {
            let city = City::new(
                city.unwrap_or_else(|| settings.default_city.clone())
                    .to_ascii_lowercase(),
            );
            for route in api.list_routes(&city).await? {
                println!("{}\t{}", route.route_id, route.route_short_name);
            }
        }
        Command::Predict {
            trip,
            conditions,
            json,
        } => {
            session.require_session()?;
            let mut controller = mount_controller(&api, &settings, &trip).await?;
            let outcome = controller.submit(conditions.into_parameters()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                let context = &outcome.context;
                println!(
                    "{} → {} on route {} ({})",
                    context.source.stop_name,
                    context.destination.stop_name,
                    context.route_id,
                    context.city
                );
                println!(
                    "Predicted delay: {:.1} min ({})",
                    outcome.delay_minutes, outcome.band
                );
                if let Some(weather) = &outcome.weather_used {
                    println!(
                        "Weather used: {}, {:.1}°C, {:.1} mm",
                        weather.condition, weather.temperature_c, weather.precipitation_mm
                    );
                }
                if let Some(route) = context
                    .geometry
                    .as_ref()
                    .and_then(|geometry| geometry.selected_alternative())
                {
                    println!(
                        "Path: {:.1} km, about {:.0} min",
                        route.distance_km, route.duration_min
                    );
                }
            }
        }
        Command::Chat { message, trip } => {
            session.require_session()?;
            let controller = mount_controller(&api, &settings, &trip).await?;
            let mut assistant = ChatAssistant::new(api.clone());
            if let Some(reply) = assistant.send(&message, &controller.route_context()).await {
                println!("{}", reply.text);
            }
        }
    }

    Ok(())
}

/// Mounts the controller, lets the default cascade finish, then applies the
/// requested overrides level by level.
async fn mount_controller(
    api: &Arc<ApiClient>,
    settings: &Settings,
    trip: &TripArgs,
) -> Result<SelectionController> {
    let services = ControllerServices::from_api(api.clone());
    let mut controller =
        SelectionController::mount(services, ControllerConfig::from_settings(settings));
    controller.settle().await;

    if let Some(city) = &trip.city {
        controller.set_city(city)?;
        controller.settle().await;
    }
    if let Some(route) = &trip.route {
        controller.set_route(route)?;
        controller.settle().await;
    }
    if let Some(direction) = &trip.direction {
        controller.set_direction(direction)?;
        controller.settle().await;
    }
    if let Some(source) = &trip.source {
        controller.set_source(source)?;
    }
    if let Some(destination) = &trip.destination {
        controller.set_destination(destination)?;
    }
    controller.settle().await;
    Ok(controller)
}
