//! Error types for Alignment Core.
//!
//! Defines a unified error type that maps cleanly to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Unified error type for Alignment Core operations.
#[derive(Debug, Error)]
pub enum AlignmentError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Completion provider error: {0}")]
    Completion(String),

    #[error("Completion timed out after {0}s")]
    Timeout(u64),

    #[error("Ledger error: {0}")]
    Ledger(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error response body for API clients.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AlignmentError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            AlignmentError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone(), None)
            }
            AlignmentError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone(), None)
            }
            AlignmentError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone(), None)
            }
            AlignmentError::Completion(msg) => {
                tracing::error!(error = %msg, "Completion provider error");
                (
                    StatusCode::BAD_GATEWAY,
                    "COMPLETION_ERROR",
                    "The completion provider failed".to_string(),
                    None,
                )
            }
            AlignmentError::Timeout(secs) => (
                StatusCode::GATEWAY_TIMEOUT,
                "COMPLETION_TIMEOUT",
                format!("The completion provider did not answer within {}s", secs),
                None,
            ),
            AlignmentError::Ledger(e) => {
                // Log the actual error but don't expose internals
                tracing::error!(error = %e, "Ledger error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "LEDGER_ERROR",
                    "A ledger error occurred".to_string(),
                    None,
                )
            }
            AlignmentError::Config(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR",
                "Configuration error".to_string(),
                Some(msg.clone()),
            ),
            AlignmentError::Serialization(e) => (
                StatusCode::BAD_REQUEST,
                "SERIALIZATION_ERROR",
                "Failed to process request/response".to_string(),
                Some(e.to_string()),
            ),
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for alignment operations.
pub type AlignmentResult<T> = Result<T, AlignmentError>;
