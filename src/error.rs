//! Domain error types for the report server.
//!
//! Uses thiserror for ergonomic error handling with automatic Display implementations.

use actix_web::{HttpResponse, ResponseError};
use std::fmt;

use crate::views::ViewError;

/// Application-level errors.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The view index was missing and could not be served after reinstalling it
    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    /// The view service failed or could not be reached
    #[error("View service error: {0}")]
    ViewService(String),

    /// Resource not found
    #[error("{0} not found")]
    NotFound(String),

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status, error_code, response_message) = match self {
            AppError::IndexUnavailable(err_str) => {
                tracing::warn!("Index unavailable: {}", err_str);
                (
                    actix_web::http::StatusCode::SERVICE_UNAVAILABLE,
                    "INDEX_UNAVAILABLE",
                    "The report index is being rebuilt, retry shortly".to_string(),
                )
            }
            AppError::ViewService(err_str) => {
                tracing::error!("View service error: {}", err_str);
                (
                    actix_web::http::StatusCode::BAD_GATEWAY,
                    "VIEW_SERVICE_ERROR",
                    "The document store could not serve this report".to_string(),
                )
            }
            AppError::NotFound(_) => (
                actix_web::http::StatusCode::NOT_FOUND,
                "NOT_FOUND",
                self.to_string(),
            ),
            AppError::InvalidInput(_) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "INVALID_INPUT",
                self.to_string(),
            ),
        };

        HttpResponse::build(status).json(ErrorResponse {
            error: error_code.to_string(),
            message: response_message,
        })
    }
}

/// Error response body matching OpenAPI schema.
#[derive(Debug, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

impl From<ViewError> for AppError {
    fn from(err: ViewError) -> Self {
        match err {
            ViewError::IndexMissing { .. } => AppError::IndexUnavailable(err.to_string()),
            other => AppError::ViewService(other.to_string()),
        }
    }
}
