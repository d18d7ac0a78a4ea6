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
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for AppError {}

/// Error response JSON structure
#[derive(Debug, Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
    status: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse {
            error: self.message,
            status: status.as_u16(),
        });

        (status, body).into_response()
    }
}

/// Convert gridcast_core errors to HTTP errors
impl From<gridcast_core::Error> for AppError {
    fn from(err: gridcast_core::Error) -> Self {
        use gridcast_core::Error;

        match err {
            Error::InvalidSelection(msg) => AppError::bad_request(msg),
            Error::NotFound(msg) => AppError::not_found(msg),
            Error::Unauthorized(msg) => AppError::unauthorized(msg),
            Error::Forbidden(msg) => AppError::forbidden(msg),
            Error::InvalidState(msg) => AppError::conflict(msg),
            Error::Persistence(msg) => {
                tracing::error!("Persistence error: {}", msg);
                AppError::internal_server_error("Storage error")
            }
            Error::Serialization(e) => {
                tracing::error!("Serialization error: {}", e);
                AppError::internal_server_error("Data processing error")
            }
            Error::SourceUnavailable(msg) => {
                tracing::error!("Source unavailable: {}", msg);
                AppError::internal_server_error("Source unavailable")
            }
            Error::TransientRender(msg) => {
                tracing::error!("Render error: {}", msg);
                AppError::internal_server_error("Render error")
            }
            Error::Media(msg) => {
                tracing::error!("Media transport error: {}", msg);
                AppError::internal_server_error("Media transport error")
            }
            Error::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                AppError::internal_server_error("Internal server error")
            }
        }
    }
}

/// Convert media transport errors to HTTP errors via the core taxonomy
impl From<gridcast_media::MediaError> for AppError {
    fn from(err: gridcast_media::MediaError) -> Self {
        gridcast_core::Error::from(err).into()
    }
}

/// Convert serde_json errors to HTTP errors
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::bad_request(format!("JSON error: {}", err))
    }
}

/// Convert anyhow errors to HTTP errors
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("Unhandled error: {}", err);
        AppError::internal_server_error("Internal server error")
    }
}
