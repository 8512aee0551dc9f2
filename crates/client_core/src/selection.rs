//! Cascading selection controller: city → route → direction → stop pair.
//!
//! Each fetch-backed dimension is a [`Node`] with an explicit phase and the
//! scope key derived from its ancestors. Fetches run as spawned tasks and
//! report back over a channel; the owner applies completions one at a time
//! through [`SelectionController::process_next`] or
//! [`SelectionController::settle`]. A completion only commits when its tag
//! still matches the node's current scope and sequence number.

use std::{fmt, future::Future, sync::Arc, time::Duration};

use shared::{
    domain::{City, CoordinatePair, RouteId},
    protocol::{DirectionSummary, RouteInfoResponse, RouteSummary, StopSummary},
};
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    api::ApiClient,
    config::Settings,
    error::{ClientError, SelectionError, SubmitError, ValidationError},
    providers::{GeometryProvider, OptionsProvider, PredictionService},
    trip::{GeometryResult, PredictionOutcome, TripContext, TripParameters},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Routes,
    Directions,
    Stops,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Routes => "routes",
            Self::Directions => "directions",
            Self::Stops => "stops",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodePhase {
    /// No scope can be derived from the ancestors yet.
    Idle,
    Loading,
    Ready,
    /// Options and selection belong to a superseded scope.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryPhase {
    Empty,
    Debouncing,
    Loading,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScopeKey {
    City(City),
    Route {
        city: City,
        route_id: RouteId,
    },
    Direction {
        city: City,
        route_id: RouteId,
        direction: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionList<T> {
    pub scope: ScopeKey,
    pub items: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionState {
    pub city: City,
    pub route_id: Option<RouteId>,
    pub direction: Option<String>,
    pub source: Option<String>,
    pub destination: Option<String>,
}

impl SelectionState {
    fn new(city: City) -> Self {
        Self {
            city,
            route_id: None,
            direction: None,
            source: None,
            destination: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ControllerEvent {
    SelectionChanged(SelectionState),
    OptionsUpdated { node: NodeKind, count: usize },
    GeometryUpdated(Option<GeometryResult>),
    FetchFailed { node: &'static str, message: String },
    PredictionReady(PredictionOutcome),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FetchTag {
    scope: ScopeKey,
    seq: u64,
}

struct Node<T> {
    phase: NodePhase,
    scope: Option<ScopeKey>,
    seq: u64,
    options: Option<OptionList<T>>,
}

impl<T> Node<T> {
    fn new() -> Self {
        Self {
            phase: NodePhase::Idle,
            scope: None,
            seq: 0,
            options: None,
        }
    }

    fn mark_stale(&mut self) {
        if self.phase != NodePhase::Idle {
            self.phase = NodePhase::Stale;
        }
    }

    fn begin(&mut self, scope: ScopeKey) -> FetchTag {
        self.seq += 1;
        self.phase = NodePhase::Loading;
        self.scope = Some(scope.clone());
        FetchTag {
            scope,
            seq: self.seq,
        }
    }

    fn reset(&mut self) {
        self.seq += 1;
        self.phase = NodePhase::Idle;
        self.scope = None;
        self.options = None;
    }

    fn accepts(&self, tag: &FetchTag) -> bool {
        self.phase == NodePhase::Loading
            && self.seq == tag.seq
            && self.scope.as_ref() == Some(&tag.scope)
    }

    fn commit(&mut self, scope: ScopeKey, items: Vec<T>) {
        self.phase = NodePhase::Ready;
        self.options = Some(OptionList { scope, items });
    }

    fn ready(&self) -> Option<&OptionList<T>> {
        match self.phase {
            NodePhase::Ready => self.options.as_ref(),
            _ => None,
        }
    }
}

struct GeometrySlot {
    phase: GeometryPhase,
    seq: u64,
    pending: Option<CoordinatePair>,
    timer: Option<JoinHandle<()>>,
    result: Option<GeometryResult>,
}

impl GeometrySlot {
    fn new() -> Self {
        Self {
            phase: GeometryPhase::Empty,
            seq: 0,
            pending: None,
            timer: None,
            result: None,
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

enum Completion {
    Routes(FetchTag, Result<Vec<RouteSummary>, ClientError>),
    Directions(FetchTag, Result<Vec<DirectionSummary>, ClientError>),
    Stops(FetchTag, Result<Vec<StopSummary>, ClientError>),
    DebounceElapsed {
        seq: u64,
    },
    Geometry {
        seq: u64,
        pair: CoordinatePair,
        result: Result<RouteInfoResponse, ClientError>,
    },
}

#[derive(Clone)]
pub struct ControllerServices {
    pub options: Arc<dyn OptionsProvider>,
    pub geometry: Arc<dyn GeometryProvider>,
    pub prediction: Arc<dyn PredictionService>,
}

impl ControllerServices {
    pub fn from_api(api: Arc<ApiClient>) -> Self {
        Self {
            options: api.clone(),
            geometry: api.clone(),
            prediction: api,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub cities: Vec<City>,
    pub default_city: City,
    pub geometry_debounce: Duration,
}

impl ControllerConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            cities: settings.cities.iter().map(|c| City::new(c.as_str())).collect(),
            default_city: City::new(settings.default_city.as_str()),
            geometry_debounce: settings.geometry_debounce(),
        }
    }
}

pub struct SelectionController {
    options: Arc<dyn OptionsProvider>,
    geometry_provider: Arc<dyn GeometryProvider>,
    prediction: Arc<dyn PredictionService>,
    cities: Vec<City>,
    debounce: Duration,
    selection: SelectionState,
    routes: Node<RouteSummary>,
    directions: Node<DirectionSummary>,
    stops: Node<StopSummary>,
    geometry: GeometrySlot,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    events: broadcast::Sender<ControllerEvent>,
    last_prediction: Option<PredictionOutcome>,
}

impl SelectionController {
    /// Creates the controller with the default city selected and issues the
    /// first routes fetch. Must be called inside a tokio runtime.
    pub fn mount(services: ControllerServices, config: ControllerConfig) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(256);
        let mut cities = config.cities;
        if !cities.contains(&config.default_city) {
            cities.insert(0, config.default_city.clone());
        }

        let mut controller = Self {
            options: services.options,
            geometry_provider: services.geometry,
            prediction: services.prediction,
            cities,
            debounce: config.geometry_debounce,
            selection: SelectionState::new(config.default_city),
            routes: Node::new(),
            directions: Node::new(),
            stops: Node::new(),
            geometry: GeometrySlot::new(),
            completions_tx,
            completions_rx,
            events,
            last_prediction: None,
        };
        controller.on_city_changed();
        controller
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    pub fn phase(&self, node: NodeKind) -> NodePhase {
        match node {
            NodeKind::Routes => self.routes.phase,
            NodeKind::Directions => self.directions.phase,
            NodeKind::Stops => self.stops.phase,
        }
    }

    pub fn scope(&self, node: NodeKind) -> Option<&ScopeKey> {
        match node {
            NodeKind::Routes => self.routes.scope.as_ref(),
            NodeKind::Directions => self.directions.scope.as_ref(),
            NodeKind::Stops => self.stops.scope.as_ref(),
        }
    }

    /// Route options, only while they match the current city.
    pub fn routes(&self) -> Option<&OptionList<RouteSummary>> {
        self.routes.ready()
    }

    pub fn directions(&self) -> Option<&OptionList<DirectionSummary>> {
        self.directions.ready()
    }

    pub fn stops(&self) -> Option<&OptionList<StopSummary>> {
        self.stops.ready()
    }

    pub fn geometry(&self) -> Option<&GeometryResult> {
        self.geometry.result.as_ref()
    }

    pub fn geometry_phase(&self) -> GeometryPhase {
        self.geometry.phase
    }

    pub fn has_pending_work(&self) -> bool {
        [self.routes.phase, self.directions.phase, self.stops.phase].contains(&NodePhase::Loading)
            || matches!(
                self.geometry.phase,
                GeometryPhase::Debouncing | GeometryPhase::Loading
            )
    }

    /// Waits for and applies one completion. Returns `false` when nothing is
    /// outstanding.
    pub async fn process_next(&mut self) -> bool {
        if !self.has_pending_work() {
            return false;
        }
        match self.completions_rx.recv().await {
            Some(completion) => {
                self.apply(completion);
                true
            }
            None => false,
        }
    }

    /// Applies completions until no fetch or debounce is outstanding.
    pub async fn settle(&mut self) {
        while self.process_next().await {}
    }

    /// Applies whatever completions have already arrived without waiting.
    pub fn poll_completions(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.completions_rx.try_recv() {
            self.apply(completion);
            applied += 1;
        }
        applied
    }

    pub fn set_city(&mut self, city: &str) -> Result<(), SelectionError> {
        let city = City::new(city.trim().to_ascii_lowercase());
        if !self.cities.contains(&city) {
            return Err(SelectionError::UnknownCity(city.0));
        }
        if city == self.selection.city {
            return Ok(());
        }
        info!(city = %city, "city selected");
        self.selection.city = city;
        self.on_city_changed();
        Ok(())
    }

    /// Accepts either the route id or its short name.
    pub fn set_route(&mut self, route: &str) -> Result<(), SelectionError> {
        let options = self
            .routes
            .ready()
            .ok_or(SelectionError::NotReady { node: "route" })?;
        let route_id = options
            .items
            .iter()
            .find(|r| r.route_id.as_str() == route || r.route_short_name == route)
            .map(|r| r.route_id.clone())
            .ok_or_else(|| SelectionError::UnknownOption {
                node: "route",
                value: route.to_string(),
            })?;
        if self.selection.route_id.as_ref() == Some(&route_id) {
            return Ok(());
        }
        info!(route_id = %route_id, "route selected");
        self.selection.route_id = Some(route_id);
        self.on_route_changed();
        Ok(())
    }

    pub fn set_direction(&mut self, headsign: &str) -> Result<(), SelectionError> {
        let options = self
            .directions
            .ready()
            .ok_or(SelectionError::NotReady { node: "direction" })?;
        if !options.items.iter().any(|d| d.trip_headsign == headsign) {
            return Err(SelectionError::UnknownOption {
                node: "direction",
                value: headsign.to_string(),
            });
        }
        if self.selection.direction.as_deref() == Some(headsign) {
            return Ok(());
        }
        info!(direction = headsign, "direction selected");
        self.selection.direction = Some(headsign.to_string());
        self.on_direction_changed();
        Ok(())
    }

    pub fn set_source(&mut self, stop_name: &str) -> Result<(), SelectionError> {
        self.ensure_stop_option("source", stop_name)?;
        if self.selection.source.as_deref() != Some(stop_name) {
            self.selection.source = Some(stop_name.to_string());
            self.last_prediction = None;
            self.refresh_geometry();
            self.emit_selection();
        }
        Ok(())
    }

    pub fn set_destination(&mut self, stop_name: &str) -> Result<(), SelectionError> {
        self.ensure_stop_option("destination", stop_name)?;
        if self.selection.destination.as_deref() != Some(stop_name) {
            self.selection.destination = Some(stop_name.to_string());
            self.last_prediction = None;
            self.refresh_geometry();
            self.emit_selection();
        }
        Ok(())
    }

    fn ensure_stop_option(&self, node: &'static str, stop_name: &str) -> Result<(), SelectionError> {
        let options = self.stops.ready().ok_or(SelectionError::NotReady { node })?;
        if options.items.iter().any(|s| s.stop_name == stop_name) {
            Ok(())
        } else {
            Err(SelectionError::UnknownOption {
                node,
                value: stop_name.to_string(),
            })
        }
    }

    /// Last successful prediction for the current stop pair.
    pub fn last_prediction(&self) -> Option<&PredictionOutcome> {
        self.last_prediction.as_ref()
    }

    /// Context for the chat assistant: the current selection, plus delay and
    /// weather once a prediction exists for it.
    pub fn route_context(&self) -> serde_json::Value {
        let mut context = match self.trip_context(TripParameters::default()) {
            Some(context) => context.route_context(),
            None => serde_json::json!({
                "city": self.selection.city,
                "route_id": self.selection.route_id,
                "direction": self.selection.direction,
            }),
        };
        if let (Some(outcome), Some(fields)) = (&self.last_prediction, context.as_object_mut()) {
            fields.insert("delay".into(), serde_json::json!(outcome.delay_minutes));
            fields.insert("delay_band".into(), serde_json::json!(outcome.band));
            if let Some(weather) = &outcome.weather_used {
                fields.insert("weather".into(), serde_json::json!(weather));
            }
        }
        context
    }

    fn trip_context(&self, parameters: TripParameters) -> Option<TripContext> {
        let (source, destination) = self.resolved_stops()?;
        Some(TripContext {
            city: self.selection.city.clone(),
            route_id: self.selection.route_id.clone()?,
            direction: self.selection.direction.clone(),
            source: source.clone(),
            destination: destination.clone(),
            parameters,
            geometry: self.geometry.result.clone(),
        })
    }

    pub async fn submit(
        &mut self,
        parameters: TripParameters,
    ) -> Result<PredictionOutcome, SubmitError> {
        match (
            self.selection.source.as_deref(),
            self.selection.destination.as_deref(),
        ) {
            (Some(source), Some(destination)) if source == destination => {
                return Err(ValidationError::SameStops.into());
            }
            (Some(_), Some(_)) => {}
            _ => return Err(ValidationError::MissingStops.into()),
        }
        let route_id = self
            .selection
            .route_id
            .clone()
            .ok_or(ValidationError::MissingRoute)?;
        let (source, destination) = self
            .resolved_stops()
            .map(|(s, d)| (s.clone(), d.clone()))
            .ok_or(ValidationError::MissingStops)?;

        let pair = CoordinatePair {
            from: source.coordinate(),
            to: destination.coordinate(),
        };
        let cached = self
            .geometry
            .result
            .as_ref()
            .filter(|g| g.pair == pair)
            .cloned();
        let geometry = match cached {
            Some(cached) => Some(cached),
            None => self.fetch_geometry_now(pair).await,
        };

        let context = TripContext {
            city: self.selection.city.clone(),
            route_id,
            direction: self.selection.direction.clone(),
            source,
            destination,
            parameters,
            geometry,
        };
        let request = context.to_request();
        info!(
            city = %context.city,
            route_id = %context.route_id,
            source = %context.source.stop_name,
            destination = %context.destination.stop_name,
            "requesting delay prediction"
        );

        match self.prediction.predict(&request).await {
            Ok(response) => {
                let outcome =
                    PredictionOutcome::new(response.delay_minutes, response.weather_used, context);
                self.last_prediction = Some(outcome.clone());
                let _ = self
                    .events
                    .send(ControllerEvent::PredictionReady(outcome.clone()));
                Ok(outcome)
            }
            Err(err) => {
                warn!("prediction failed: {err}");
                Err(SubmitError::from_service(&err))
            }
        }
    }

    async fn fetch_geometry_now(&mut self, pair: CoordinatePair) -> Option<GeometryResult> {
        self.geometry.cancel_timer();
        self.geometry.seq += 1;
        self.geometry.pending = Some(pair);
        self.geometry.phase = GeometryPhase::Empty;

        match self.geometry_provider.route_geometry(pair).await {
            Ok(response) => {
                let result = GeometryResult::from_response(pair, response);
                self.geometry.phase = GeometryPhase::Ready;
                self.geometry.result = Some(result.clone());
                let _ = self
                    .events
                    .send(ControllerEvent::GeometryUpdated(Some(result.clone())));
                Some(result)
            }
            Err(err) => {
                warn!(from = %pair.from, to = %pair.to, "route geometry failed; submitting without it: {err}");
                self.geometry.pending = None;
                self.report_failure("geometry", &err);
                None
            }
        }
    }

    fn resolved_stops(&self) -> Option<(&StopSummary, &StopSummary)> {
        let stops = self.stops.ready()?;
        let find = |name: &str| stops.items.iter().find(|s| s.stop_name == name);
        Some((
            find(self.selection.source.as_deref()?)?,
            find(self.selection.destination.as_deref()?)?,
        ))
    }

    fn current_pair(&self) -> Option<CoordinatePair> {
        let (source, destination) = self.resolved_stops()?;
        (source.stop_name != destination.stop_name).then(|| CoordinatePair {
            from: source.coordinate(),
            to: destination.coordinate(),
        })
    }

    fn on_city_changed(&mut self) {
        self.selection.route_id = None;
        self.selection.direction = None;
        self.clear_stop_pair();
        self.routes.mark_stale();
        self.directions.mark_stale();
        self.stops.mark_stale();

        self.issue_routes_fetch();
        self.refresh_geometry();
        self.emit_selection();
    }

    fn on_route_changed(&mut self) {
        self.selection.direction = None;
        self.clear_stop_pair();
        self.directions.mark_stale();
        self.stops.mark_stale();

        match self.selection.route_id.clone() {
            Some(route_id) => self.issue_directions_fetch(route_id),
            None => {
                self.directions.reset();
                self.stops.reset();
            }
        }
        self.refresh_geometry();
        self.emit_selection();
    }

    fn on_direction_changed(&mut self) {
        self.clear_stop_pair();
        self.stops.mark_stale();

        match self.selection.route_id.clone() {
            Some(route_id) => self.issue_stops_fetch(route_id, self.selection.direction.clone()),
            None => self.stops.reset(),
        }
        self.refresh_geometry();
        self.emit_selection();
    }

    fn clear_stop_pair(&mut self) {
        self.selection.source = None;
        self.selection.destination = None;
        self.last_prediction = None;
    }

    fn issue_routes_fetch(&mut self) {
        let city = self.selection.city.clone();
        let tag = self.routes.begin(ScopeKey::City(city.clone()));
        debug!(node = "routes", city = %city, seq = tag.seq, "fetching options");

        let provider = Arc::clone(&self.options);
        self.spawn_fetch(
            async move { provider.list_routes(&city).await },
            move |result| Completion::Routes(tag, result),
        );
    }

    fn issue_directions_fetch(&mut self, route_id: RouteId) {
        let city = self.selection.city.clone();
        let tag = self.directions.begin(ScopeKey::Route {
            city: city.clone(),
            route_id: route_id.clone(),
        });
        debug!(node = "directions", city = %city, route_id = %route_id, seq = tag.seq, "fetching options");

        let provider = Arc::clone(&self.options);
        self.spawn_fetch(
            async move { provider.list_directions(&city, &route_id).await },
            move |result| Completion::Directions(tag, result),
        );
    }

    fn issue_stops_fetch(&mut self, route_id: RouteId, direction: Option<String>) {
        let city = self.selection.city.clone();
        let tag = self.stops.begin(ScopeKey::Direction {
            city: city.clone(),
            route_id: route_id.clone(),
            direction: direction.clone(),
        });
        debug!(
            node = "stops",
            city = %city,
            route_id = %route_id,
            direction = direction.as_deref().unwrap_or("-"),
            seq = tag.seq,
            "fetching options"
        );

        let provider = Arc::clone(&self.options);
        self.spawn_fetch(
            async move {
                provider
                    .list_stops(&city, &route_id, direction.as_deref())
                    .await
            },
            move |result| Completion::Stops(tag, result),
        );
    }

    /// Runs `fetch` on its own task so a panicking provider still reports
    /// back as a failed completion instead of leaving the node loading.
    fn spawn_fetch<T, F>(
        &self,
        fetch: F,
        complete: impl FnOnce(Result<T, ClientError>) -> Completion + Send + 'static,
    ) where
        T: Send + 'static,
        F: Future<Output = Result<T, ClientError>> + Send + 'static,
    {
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = match tokio::spawn(fetch).await {
                Ok(result) => result,
                Err(err) => Err(ClientError::Unavailable(format!("fetch task failed: {err}"))),
            };
            let _ = tx.send(complete(result));
        });
    }

    /// Re-evaluates the leaf pair after any change to source, destination or
    /// the stop list.
    fn refresh_geometry(&mut self) {
        let Some(pair) = self.current_pair() else {
            self.clear_geometry();
            return;
        };

        if self.geometry.phase == GeometryPhase::Ready
            && self.geometry.result.as_ref().is_some_and(|g| g.pair == pair)
        {
            return;
        }

        self.geometry.cancel_timer();
        if self.geometry.result.take().is_some() {
            let _ = self.events.send(ControllerEvent::GeometryUpdated(None));
        }
        self.geometry.seq += 1;
        self.geometry.pending = Some(pair);
        self.geometry.phase = GeometryPhase::Debouncing;

        let seq = self.geometry.seq;
        let delay = self.debounce;
        let tx = self.completions_tx.clone();
        self.geometry.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Completion::DebounceElapsed { seq });
        }));
    }

    fn clear_geometry(&mut self) {
        self.geometry.cancel_timer();
        self.geometry.seq += 1;
        self.geometry.pending = None;
        self.geometry.phase = GeometryPhase::Empty;
        if self.geometry.result.take().is_some() {
            let _ = self.events.send(ControllerEvent::GeometryUpdated(None));
        }
    }

    fn apply(&mut self, completion: Completion) {
        match completion {
            Completion::Routes(tag, result) => {
                if !self.routes.accepts(&tag) {
                    debug!(node = "routes", seq = tag.seq, "discarding superseded result");
                    return;
                }
                let items = self.options_or_empty(NodeKind::Routes, result);
                self.selection.route_id = items.first().map(|r| r.route_id.clone());
                let count = items.len();
                self.routes.commit(tag.scope, items);
                self.announce_options(NodeKind::Routes, count);
                self.on_route_changed();
            }
            Completion::Directions(tag, result) => {
                if !self.directions.accepts(&tag) {
                    debug!(node = "directions", seq = tag.seq, "discarding superseded result");
                    return;
                }
                let items = self.options_or_empty(NodeKind::Directions, result);
                self.selection.direction = items.first().map(|d| d.trip_headsign.clone());
                let count = items.len();
                self.directions.commit(tag.scope, items);
                self.announce_options(NodeKind::Directions, count);
                self.on_direction_changed();
            }
            Completion::Stops(tag, result) => {
                if !self.stops.accepts(&tag) {
                    debug!(node = "stops", seq = tag.seq, "discarding superseded result");
                    return;
                }
                let items = self.options_or_empty(NodeKind::Stops, result);
                self.selection.source = items.first().map(|s| s.stop_name.clone());
                self.selection.destination = items.last().map(|s| s.stop_name.clone());
                let count = items.len();
                self.stops.commit(tag.scope, items);
                self.announce_options(NodeKind::Stops, count);
                self.refresh_geometry();
                self.emit_selection();
            }
            Completion::DebounceElapsed { seq } => {
                if self.geometry.phase != GeometryPhase::Debouncing || self.geometry.seq != seq {
                    return;
                }
                self.geometry.timer = None;
                let Some(pair) = self.geometry.pending else {
                    self.geometry.phase = GeometryPhase::Empty;
                    return;
                };
                self.geometry.phase = GeometryPhase::Loading;
                debug!(node = "geometry", from = %pair.from, to = %pair.to, seq, "fetching route geometry");

                let provider = Arc::clone(&self.geometry_provider);
                self.spawn_fetch(
                    async move { provider.route_geometry(pair).await },
                    move |result| Completion::Geometry { seq, pair, result },
                );
            }
            Completion::Geometry { seq, pair, result } => {
                if self.geometry.phase != GeometryPhase::Loading
                    || self.geometry.seq != seq
                    || self.geometry.pending != Some(pair)
                {
                    debug!(node = "geometry", seq, "discarding superseded result");
                    return;
                }
                match result {
                    Ok(response) => {
                        let geometry = GeometryResult::from_response(pair, response);
                        self.geometry.phase = GeometryPhase::Ready;
                        self.geometry.result = Some(geometry.clone());
                        let _ = self
                            .events
                            .send(ControllerEvent::GeometryUpdated(Some(geometry)));
                    }
                    Err(err) => {
                        warn!(from = %pair.from, to = %pair.to, "route geometry failed: {err}");
                        self.geometry.phase = GeometryPhase::Empty;
                        self.geometry.pending = None;
                        self.report_failure("geometry", &err);
                    }
                }
            }
        }
    }

    fn options_or_empty<T>(&self, node: NodeKind, result: Result<Vec<T>, ClientError>) -> Vec<T> {
        result.unwrap_or_else(|err| {
            warn!(node = node.as_str(), "options fetch failed; treating as empty: {err}");
            self.report_failure(node.as_str(), &err);
            Vec::new()
        })
    }

    fn announce_options(&self, node: NodeKind, count: usize) {
        debug!(node = node.as_str(), count, "options ready");
        let _ = self
            .events
            .send(ControllerEvent::OptionsUpdated { node, count });
    }

    fn report_failure(&self, node: &'static str, err: &ClientError) {
        let _ = self.events.send(ControllerEvent::FetchFailed {
            node,
            message: err.to_string(),
        });
    }

    fn emit_selection(&self) {
        let _ = self
            .events
            .send(ControllerEvent::SelectionChanged(self.selection.clone()));
    }
}

impl Drop for SelectionController {
    fn drop(&mut self) {
        self.geometry.cancel_timer();
    }
}

#[cfg(test)]
#[path = "tests/selection_tests.rs"]
mod tests;
