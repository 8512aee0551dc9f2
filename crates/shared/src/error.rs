use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error body returned by the prediction API on every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    Unavailable,
    Internal,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            400 | 409 | 422 => Self::Validation,
            502..=504 => Self::Unavailable,
            _ => Self::Internal,
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{code:?} ({status}): {}", message.as_deref().unwrap_or("no error message"))]
pub struct ApiError {
    pub code: ErrorCode,
    pub status: u16,
    pub message: Option<String>,
}

impl ApiError {
    pub fn from_status(status: u16, message: Option<String>) -> Self {
        Self {
            code: ErrorCode::from_status(status),
            status,
            message: message.filter(|m| !m.trim().is_empty()),
        }
    }
}
