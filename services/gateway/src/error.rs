//! services/gateway/src/error.rs
//!
//! Defines the primary error type for the gateway service and how it is rendered
//! to the browser.

use crate::config::ConfigError;
use academy_core::{CoreError, PortError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// The primary error type for the `gateway` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An error surfaced by one of the core operations.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl From<PortError> for ApiError {
    fn from(e: PortError) -> Self {
        ApiError::Core(e.into())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Core(e) => match e {
                CoreError::Validation(_) => StatusCode::BAD_REQUEST,
                CoreError::Unauthenticated => StatusCode::UNAUTHORIZED,
                CoreError::Forbidden => StatusCode::FORBIDDEN,
                CoreError::NotFound(_) => StatusCode::NOT_FOUND,
                CoreError::Busy => StatusCode::CONFLICT,
                CoreError::Remote(_) => StatusCode::BAD_GATEWAY,
            },
            ApiError::Config(_) | ApiError::Io(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            // Remote messages are shown to the user verbatim.
            ApiError::Core(e) => json!({ "error": e.to_string(), "key": e.message_key() }),
            other => {
                error!("Internal error: {}", other);
                json!({ "error": "Internal server error", "key": "errors.remote" })
            }
        };
        (status, Json(body)).into_response()
    }
}
