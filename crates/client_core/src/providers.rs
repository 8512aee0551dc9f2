//! Seams to the remote services. `ApiClient` implements all of them; tests
//! substitute in-process fakes.

use async_trait::async_trait;
use shared::{
    domain::{City, CoordinatePair, RouteId},
    protocol::{
        DirectionSummary, LoginResponse, PredictionRequest, PredictionResponse, RouteInfoResponse,
        RouteSummary, StopSummary,
    },
};

use crate::error::ClientError;

#[async_trait]
pub trait OptionsProvider: Send + Sync {
    async fn list_routes(&self, city: &City) -> Result<Vec<RouteSummary>, ClientError>;
    async fn list_directions(
        &self,
        city: &City,
        route_id: &RouteId,
    ) -> Result<Vec<DirectionSummary>, ClientError>;
    async fn list_stops(
        &self,
        city: &City,
        route_id: &RouteId,
        headsign: Option<&str>,
    ) -> Result<Vec<StopSummary>, ClientError>;
}

#[async_trait]
pub trait GeometryProvider: Send + Sync {
    async fn route_geometry(&self, pair: CoordinatePair)
        -> Result<RouteInfoResponse, ClientError>;
}

#[async_trait]
pub trait PredictionService: Send + Sync {
    async fn predict(&self, request: &PredictionRequest)
        -> Result<PredictionResponse, ClientError>;
}

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ClientError>;
    async fn register(&self, username: &str, password: &str) -> Result<(), ClientError>;
}

#[async_trait]
pub trait ChatService: Send + Sync {
    async fn chat(&self, message: &str, context: &serde_json::Value)
        -> Result<String, ClientError>;
}
