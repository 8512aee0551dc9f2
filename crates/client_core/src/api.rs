use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use shared::{
    domain::{City, CoordinatePair, RouteId},
    error::{ApiError, ErrorBody},
    protocol::{
        ChatRequest, ChatResponse, Credentials, DirectionSummary, HealthResponse, LoginResponse,
        PredictionRequest, PredictionResponse, RegisterResponse, RouteInfoQuery,
        RouteInfoResponse, RouteSummary, RoutesQuery, StopSummary, StopsQuery, TripsQuery,
    },
};
use tracing::{debug, warn};
use url::Url;

use crate::{
    config::Settings,
    error::ClientError,
    providers::{AuthService, ChatService, GeometryProvider, OptionsProvider, PredictionService},
    session::{SessionStore, TOKEN_KEY},
};

/// HTTP client for the prediction API. When a session store is attached, the
/// stored token is sent as a bearer credential on every request.
pub struct ApiClient {
    http: Client,
    base_url: Url,
    session_store: Option<Arc<dyn SessionStore>>,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let mut base = base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::Build)?;
        Ok(Self {
            http,
            base_url: Url::parse(&base)?,
            session_store: None,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ClientError> {
        Self::new(&settings.api_base_url, settings.request_timeout())
    }

    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session_store = Some(store);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path)?)
    }

    async fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let Some(store) = &self.session_store else {
            return request;
        };
        match store.get(TOKEN_KEY).await {
            Ok(Some(token)) => request.bearer_auth(token),
            Ok(None) => request,
            Err(err) => {
                warn!("failed to read session token; sending request without it: {err:#}");
                request
            }
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        url: &Url,
    ) -> Result<T, ClientError> {
        let response = self
            .authorize(request)
            .await
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.json::<ErrorBody>().await.ok().map(|body| body.error);
            debug!(%url, status = status.as_u16(), "api call rejected");
            return Err(ApiError::from_status(status.as_u16(), message).into());
        }

        response
            .json::<T>()
            .await
            .map_err(|source| ClientError::Decode {
                url: url.to_string(),
                source,
            })
    }

    /// Never fails: an unreachable or broken server reports as offline.
    pub async fn health(&self) -> HealthResponse {
        let url = match self.endpoint("health") {
            Ok(url) => url,
            Err(err) => {
                warn!("health check failed: {err}");
                return HealthResponse::offline();
            }
        };
        match self
            .send_json::<HealthResponse>(self.http.get(url.clone()), &url)
            .await
        {
            Ok(health) => health,
            Err(err) => {
                warn!("health check failed: {err}");
                HealthResponse::offline()
            }
        }
    }
}

#[async_trait]
impl OptionsProvider for ApiClient {
    async fn list_routes(&self, city: &City) -> Result<Vec<RouteSummary>, ClientError> {
        let url = self.endpoint("api/routes")?;
        let request = self.http.get(url.clone()).query(&RoutesQuery { city });
        self.send_json(request, &url).await
    }

    async fn list_directions(
        &self,
        city: &City,
        route_id: &RouteId,
    ) -> Result<Vec<DirectionSummary>, ClientError> {
        let url = self.endpoint("api/trips")?;
        let request = self
            .http
            .get(url.clone())
            .query(&TripsQuery { city, route_id });
        self.send_json(request, &url).await
    }

    async fn list_stops(
        &self,
        city: &City,
        route_id: &RouteId,
        headsign: Option<&str>,
    ) -> Result<Vec<StopSummary>, ClientError> {
        let url = self.endpoint("api/stops")?;
        let request = self.http.get(url.clone()).query(&StopsQuery {
            city,
            route_id,
            headsign,
        });
        self.send_json(request, &url).await
    }
}

#[async_trait]
impl GeometryProvider for ApiClient {
    async fn route_geometry(
        &self,
        pair: CoordinatePair,
    ) -> Result<RouteInfoResponse, ClientError> {
        let url = self.endpoint("api/route-info")?;
        let request = self
            .http
            .get(url.clone())
            .query(&RouteInfoQuery::from(pair));
        self.send_json(request, &url).await
    }
}

#[async_trait]
impl PredictionService for ApiClient {
    async fn predict(
        &self,
        request: &PredictionRequest,
    ) -> Result<PredictionResponse, ClientError> {
        let url = self.endpoint("api/predict")?;
        self.send_json(self.http.post(url.clone()).json(request), &url)
            .await
    }
}

#[async_trait]
impl AuthService for ApiClient {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ClientError> {
        let url = self.endpoint("api/auth/login")?;
        let body = Credentials {
            username: username.to_string(),
            password: password.to_string(),
        };
        self.send_json(self.http.post(url.clone()).json(&body), &url)
            .await
    }

    async fn register(&self, username: &str, password: &str) -> Result<(), ClientError> {
        let url = self.endpoint("api/auth/register")?;
        let body = Credentials {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response: RegisterResponse = self
            .send_json(self.http.post(url.clone()).json(&body), &url)
            .await?;
        debug!(message = %response.message, "registered");
        Ok(())
    }
}

#[async_trait]
impl ChatService for ApiClient {
    async fn chat(
        &self,
        message: &str,
        context: &serde_json::Value,
    ) -> Result<String, ClientError> {
        let url = self.endpoint("api/chat")?;
        let body = ChatRequest {
            message: message.to_string(),
            context: context.clone(),
        };
        let response: ChatResponse = self
            .send_json(self.http.post(url.clone()).json(&body), &url)
            .await?;
        Ok(response.reply)
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
