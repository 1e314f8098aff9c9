//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how it is
//! presented to HTTP clients.

use crate::config::ConfigError;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use excuse_core::ports::PortError;
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("{0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a failure while applying database migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// JSON body returned for every failed request.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Stable, machine-readable error kind.
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Port(port) => match port {
                PortError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
                PortError::MissingField(_) => (StatusCode::UNPROCESSABLE_ENTITY, "missing_field"),
                PortError::UnsupportedLanguage(_) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "unsupported_language")
                }
                PortError::TemplateNotFound { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "template_not_found")
                }
                PortError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                PortError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
                PortError::ServiceUnavailable(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
                }
                PortError::EmptyResponse => (StatusCode::BAD_GATEWAY, "empty_response"),
                PortError::Unexpected(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            },
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        let retry_after_secs = match &self {
            ApiError::Port(PortError::RateLimited { retry_after_secs }) => *retry_after_secs,
            _ => None,
        };

        // Internal details stay in the logs.
        let message = if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            error!("Request failed: {}", self);
            "Something went wrong, please try again later.".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorBody {
            kind: kind.to_string(),
            message,
            retry_after_secs,
        };
        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after_secs {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
