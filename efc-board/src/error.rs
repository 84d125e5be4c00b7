//! Error types for efc-board

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::library::LibraryStatus;
use crate::speech::SpeechError;

/// Errors surfaced by the phrase library to its callers
///
/// Storage, remote and image failures never appear here; they are absorbed
/// below the library boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LibraryError {
    /// Rejected before any state change (e.g. empty text)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Mutation attempted before initialization finished
    #[error("Phrase library not ready (state: {0:?})")]
    NotReady(LibraryStatus),
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Cross-origin request from an origin not allowed to mutate (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Library(#[from] LibraryError),

    #[error("Speech error: {0}")]
    Speech(#[from] SpeechError),

    #[error("Common error: {0}")]
    Common(#[from] efc_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            ApiError::Library(ref err @ LibraryError::Validation(_)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", err.to_string())
            }
            ApiError::Library(ref err @ LibraryError::NotReady(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "NOT_READY", err.to_string())
            }
            ApiError::Speech(ref err) => (StatusCode::BAD_GATEWAY, "SPEECH_ERROR", err.to_string()),
            ApiError::Common(efc_common::Error::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg)
            }
            ApiError::Common(efc_common::Error::Json(ref err)) => {
                (StatusCode::BAD_REQUEST, "INVALID_JSON", err.to_string())
            }
            ApiError::Common(ref err) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "COMMON_ERROR", err.to_string())
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
