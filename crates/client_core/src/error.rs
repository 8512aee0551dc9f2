//! Error types surfaced by the client crate.

use shared::error::ApiError;
use thiserror::Error;

pub const GENERIC_PREDICTION_FAILURE: &str = "Failed to get prediction";
pub const GENERIC_LOGIN_FAILURE: &str = "Failed to login";
pub const GENERIC_REGISTER_FAILURE: &str = "Failed to register";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to build http client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("invalid api url: {0}")]
    Url(#[from] url::ParseError),
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("{0}")]
    Unavailable(String),
}

impl ClientError {
    /// Message the server put in its `{"error": ...}` body, if any.
    pub fn service_message(&self) -> Option<&str> {
        match self {
            Self::Api(err) => err.message.as_deref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("unknown city '{0}'")]
    UnknownCity(String),
    #[error("{node} options are not loaded for the current selection")]
    NotReady { node: &'static str },
    #[error("'{value}' is not a {node} option for the current selection")]
    UnknownOption { node: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Select a route before requesting a prediction")]
    MissingRoute,
    #[error("Select both a source and a destination stop")]
    MissingStops,
    #[error("Source and destination cannot be the same")]
    SameStops,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    Prediction(String),
}

impl SubmitError {
    pub fn from_service(err: &ClientError) -> Self {
        Self::Prediction(
            err.service_message()
                .unwrap_or(GENERIC_PREDICTION_FAILURE)
                .to_string(),
        )
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("not signed in")]
    NotAuthenticated,
    #[error("{0}")]
    Rejected(String),
    #[error("session store failure: {0}")]
    Store(#[source] anyhow::Error),
}
