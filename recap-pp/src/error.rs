//! Error types for recap-pp
//!
//! Two layers, matching how failures propagate:
//! - `PipelineError` is the domain taxonomy. Stage failures are caught and
//!   persisted by the pipeline services; only persistence failures bubble.
//! - `ApiError` maps onto HTTP responses for the handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::RecordingStatus;

/// Which upstream capability failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamKind {
    /// Provider returned 429
    RateLimited,
    /// Bounded call exceeded its deadline
    Timeout,
    /// Non-success status or unparseable body
    InvalidResponse,
}

impl std::fmt::Display for UpstreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamKind::RateLimited => f.write_str("rate limited"),
            UpstreamKind::Timeout => f.write_str("timeout"),
            UpstreamKind::InvalidResponse => f.write_str("invalid response"),
        }
    }
}

/// A classified provider failure, with the upstream detail kept verbatim
#[derive(Debug, Clone, Error)]
#[error("{service} error ({kind}): {detail}")]
pub struct UpstreamError {
    /// Capability name ("transcription", "analysis")
    pub service: &'static str,
    /// Failure classification
    pub kind: UpstreamKind,
    /// Upstream error text, unmodified
    pub detail: String,
}

/// Domain error taxonomy for the processing pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed or missing input (recording id, empty file reference)
    #[error("Validation error: {0}")]
    Validation(String),

    /// File exceeds the transcription service's hard ceiling
    #[error("File too large for transcription: {size} bytes exceeds {limit} byte limit")]
    FileTooLarge {
        /// Reported file size in bytes
        size: i64,
        /// Configured ceiling in bytes
        limit: i64,
    },

    /// Provider call failed
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// Recording/job store read or write failed
    #[error("Persistence error: {0}")]
    Persistence(#[from] recap_common::Error),

    /// Attempted state transition is not legal for the current state
    #[error("Illegal transition: {from} -> {to}")]
    IllegalTransition {
        /// Status the recording was in
        from: RecordingStatus,
        /// Requested target status
        to: RecordingStatus,
    },

    /// Recovery invoked on a recording that does not meet staleness criteria
    #[error("Recording is not stuck (status {status}, age {age_minutes} minutes)")]
    NotStuck {
        /// Current status
        status: RecordingStatus,
        /// Age at the time of the check
        age_minutes: i64,
    },
}

impl PipelineError {
    /// Whether this error must bubble to the caller instead of being
    /// converted into a persisted failure state
    pub fn is_persistence(&self) -> bool {
        matches!(self, PipelineError::Persistence(_))
    }
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

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),

    /// recap-common error
    #[error("Common error: {0}")]
    Common(#[from] recap_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Other(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
            ApiError::Common(ref err) => match err {
                recap_common::Error::NotFound(msg) => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone())
                }
                recap_common::Error::InvalidInput(msg) => {
                    (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone())
                }
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "COMMON_ERROR",
                    err.to_string(),
                ),
            },
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
