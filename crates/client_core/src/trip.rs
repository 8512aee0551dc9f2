//! Trip parameters, the assembled prediction payload, and route geometry.

use std::{fmt, str::FromStr};

use chrono::{Local, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use shared::{
    domain::{City, Coordinate, CoordinatePair, RouteId},
    protocol::{
        PredictionRequest, RouteAlternative, RouteInfoResponse, StopSummary, WeatherSnapshot,
    },
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseParameterError {
    kind: &'static str,
    value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WeatherCondition {
    /// Let the server look up live weather at the source stop.
    Auto,
    #[default]
    Clear,
    Rain,
    Snow,
    Fog,
}

impl WeatherCondition {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "Auto",
            Self::Clear => "Clear",
            Self::Rain => "Rain",
            Self::Snow => "Snow",
            Self::Fog => "Fog",
        }
    }
}

impl fmt::Display for WeatherCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WeatherCondition {
    type Err = ParseParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "clear" => Ok(Self::Clear),
            "rain" => Ok(Self::Rain),
            "snow" => Ok(Self::Snow),
            "fog" => Ok(Self::Fog),
            _ => Err(ParseParameterError {
                kind: "weather condition",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EventType {
    #[default]
    #[serde(rename = "None")]
    NoEvent,
    Sports,
    Concert,
    Festival,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoEvent => "None",
            Self::Sports => "Sports",
            Self::Concert => "Concert",
            Self::Festival => "Festival",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ParseParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Self::NoEvent),
            "sports" => Ok(Self::Sports),
            "concert" => Ok(Self::Concert),
            "festival" => Ok(Self::Festival),
            _ => Err(ParseParameterError {
                kind: "event type",
                value: s.to_string(),
            }),
        }
    }
}

/// Form inputs that sit beside the stop selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripParameters {
    pub date: NaiveDate,
    pub time_of_day: NaiveTime,
    pub weather_condition: WeatherCondition,
    pub temperature_c: f64,
    pub precipitation_mm: f64,
    pub event_type: EventType,
    pub event_attendance: u32,
    pub traffic_factor: f64,
}

impl TripParameters {
    pub fn on(date: NaiveDate) -> Self {
        Self {
            date,
            time_of_day: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
            weather_condition: WeatherCondition::default(),
            temperature_c: 20.0,
            precipitation_mm: 0.0,
            event_type: EventType::default(),
            event_attendance: 0,
            traffic_factor: 1.0,
        }
    }
}

impl Default for TripParameters {
    fn default() -> Self {
        Self::on(Local::now().date_naive())
    }
}

/// Path alternatives for one stop pair, plus the pair they were computed for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryResult {
    pub pair: CoordinatePair,
    pub alternatives: Vec<RouteAlternative>,
    pub selected: usize,
    pub fallback: bool,
}

impl GeometryResult {
    pub fn from_response(pair: CoordinatePair, response: RouteInfoResponse) -> Self {
        let selected = if response.selected_route < response.routes.len() {
            response.selected_route
        } else {
            0
        };
        Self {
            pair,
            alternatives: response.routes,
            selected,
            fallback: response.fallback,
        }
    }

    pub fn selected_alternative(&self) -> Option<&RouteAlternative> {
        self.alternatives.get(self.selected)
    }
}

/// Everything handed to the prediction service for one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripContext {
    pub city: City,
    pub route_id: RouteId,
    pub direction: Option<String>,
    pub source: StopSummary,
    pub destination: StopSummary,
    pub parameters: TripParameters,
    pub geometry: Option<GeometryResult>,
}

impl TripContext {
    pub fn source_coords(&self) -> Coordinate {
        self.source.coordinate()
    }

    pub fn destination_coords(&self) -> Coordinate {
        self.destination.coordinate()
    }

    pub fn day_of_week(&self) -> String {
        self.parameters.date.format("%A").to_string()
    }

    pub fn to_request(&self) -> PredictionRequest {
        let from = self.source_coords();
        let to = self.destination_coords();
        PredictionRequest {
            city: self.city.clone(),
            route_id: self.route_id.clone(),
            direction: self.direction.clone().unwrap_or_default(),
            source: self.source.stop_name.clone(),
            destination: self.destination.stop_name.clone(),
            date: self.parameters.date.format("%Y-%m-%d").to_string(),
            time_of_day: self.parameters.time_of_day.format("%H:%M").to_string(),
            day_of_week: self.day_of_week(),
            weather_condition: self.parameters.weather_condition.to_string(),
            precipitation_mm: self.parameters.precipitation_mm,
            temperature_c: self.parameters.temperature_c,
            event_type: self.parameters.event_type.to_string(),
            event_attendance: self.parameters.event_attendance,
            traffic_factor: self.parameters.traffic_factor,
            lat: from.lat,
            lon: from.lon,
            dest_lat: to.lat,
            dest_lon: to.lon,
        }
    }

    /// Compact context forwarded to the chat assistant.
    pub fn route_context(&self) -> serde_json::Value {
        let selected = self
            .geometry
            .as_ref()
            .and_then(GeometryResult::selected_alternative);
        serde_json::json!({
            "city": self.city,
            "route_id": self.route_id,
            "direction": self.direction,
            "origin": self.source.stop_name,
            "destination": self.destination.stop_name,
            "sourceCoords": self.source_coords(),
            "destCoords": self.destination_coords(),
            "distance_km": selected.map(|route| route.distance_km),
            "duration_min": selected.map(|route| route.duration_min),
        })
    }
}

/// Coarse reading of a predicted delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DelayBand {
    OnTime,
    Moderate,
    HeavyTraffic,
}

impl DelayBand {
    pub const MODERATE_AFTER_MIN: f64 = 5.0;
    pub const HEAVY_AFTER_MIN: f64 = 15.0;

    pub fn from_minutes(delay_minutes: f64) -> Self {
        if delay_minutes > Self::HEAVY_AFTER_MIN {
            Self::HeavyTraffic
        } else if delay_minutes > Self::MODERATE_AFTER_MIN {
            Self::Moderate
        } else {
            Self::OnTime
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OnTime => "ON TIME",
            Self::Moderate => "MODERATE",
            Self::HeavyTraffic => "HEAVY TRAFFIC",
        }
    }
}

impl fmt::Display for DelayBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionOutcome {
    pub delay_minutes: f64,
    pub band: DelayBand,
    pub weather_used: Option<WeatherSnapshot>,
    pub context: TripContext,
}

impl PredictionOutcome {
    pub fn new(
        delay_minutes: f64,
        weather_used: Option<WeatherSnapshot>,
        context: TripContext,
    ) -> Self {
        Self {
            delay_minutes,
            band: DelayBand::from_minutes(delay_minutes),
            weather_used,
            context,
        }
    }
}
