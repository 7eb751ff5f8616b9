// HTTP error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for HTTP handlers
pub type AppResult<T> = Result<T, AppError>;

/// Application error with HTTP status code
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    #[must_use]
    pub fn service_unavailable() -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "Service temporarily unavailable. Please try again later.")
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for AppError {}

#[derive(Debug, Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
    status: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse { error: self.message, status: status.as_u16() });
        (status, body).into_response()
    }
}

impl From<mediafusion_core::Error> for AppError {
    fn from(err: mediafusion_core::Error) -> Self {
        use mediafusion_core::Error;

        match err {
            Error::NotFound(msg) => Self::not_found(msg),
            Error::AlreadyExists(msg) => Self::new(StatusCode::CONFLICT, msg),
            Error::Validation(msg) => Self::bad_request(msg),
            Error::DataIntegrity(msg) => {
                tracing::error!(%msg, "data integrity error");
                Self::internal_server_error("Data processing error")
            }
            Error::Database(e) => {
                tracing::error!(%e, "database error");
                Self::internal_server_error("Database error")
            }
            Error::Redis(e) => {
                tracing::error!(%e, "redis error");
                Self::service_unavailable()
            }
            Error::Serialization(e) => {
                tracing::error!(%e, "serialization error");
                Self::internal_server_error("Data processing error")
            }
            Error::Internal(msg) => {
                tracing::error!(%msg, "internal error");
                Self::internal_server_error("Internal server error")
            }
        }
    }
}

impl From<mediafusion_core::error::ProviderError> for AppError {
    fn from(err: mediafusion_core::error::ProviderError) -> Self {
        use mediafusion_core::error::ProviderError;

        match err {
            ProviderError::Auth => Self::new(StatusCode::UNAUTHORIZED, "provider authentication failed"),
            ProviderError::Quota => Self::new(StatusCode::TOO_MANY_REQUESTS, "provider quota exceeded"),
            ProviderError::Content => Self::not_found("provider does not have this content"),
            ProviderError::Timeout => Self::new(StatusCode::GATEWAY_TIMEOUT, "provider request timed out"),
            ProviderError::Protocol(msg) => {
                tracing::error!(%msg, "provider protocol error");
                Self::new(StatusCode::BAD_GATEWAY, "provider returned an unexpected response")
            }
            ProviderError::Network(msg) => {
                tracing::error!(%msg, "provider network error");
                Self::service_unavailable()
            }
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON serialization/deserialization error: {}", err);
        Self::bad_request("Invalid request data format")
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("Anyhow error: {}", err);
        Self::internal_server_error("Internal server error")
    }
}
