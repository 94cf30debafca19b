//! Stuck-recording recovery endpoints
//!
//! With a recording_id: single-id recovery (reset and re-dispatch).
//! Without one: batch sweep over all working-state recordings.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::{ApiError, PipelineError};
use crate::AppState;

/// POST /recover-stuck-recordings request
#[derive(Debug, Deserialize, Default)]
pub struct RecoverRequest {
    #[serde(default)]
    pub recording_id: Option<String>,
    #[serde(default)]
    pub force_retry: bool,
}

/// POST /recover-stuck-recordings
pub async fn recover_stuck_recordings(
    State(state): State<AppState>,
    Json(request): Json<RecoverRequest>,
) -> Response {
    match request.recording_id {
        Some(raw_id) => recover_single(state, raw_id, request.force_retry).await,
        None => run_sweep(state).await,
    }
}

async fn recover_single(state: AppState, raw_id: String, force_retry: bool) -> Response {
    let recording_id = match Uuid::parse_str(raw_id.trim()) {
        Ok(id) => id,
        Err(_) => {
            return ApiError::BadRequest(format!("malformed recording id: {}", raw_id))
                .into_response()
        }
    };

    match state
        .recovery
        .recover_one(&state.processing, recording_id, force_retry)
        .await
    {
        Ok(outcome) => Json(json!({
            "success": outcome.success,
            "recording_id": outcome.recording_id,
            "previous_status": outcome.previous_status,
            "retry_method": outcome.retry_method,
            "status": outcome.status,
            "error": outcome.error,
        }))
        .into_response(),
        Err(PipelineError::NotStuck { status, age_minutes }) => {
            tracing::debug!(
                recording_id = %recording_id,
                status = %status,
                age_minutes,
                "Recovery declined: recording not stuck"
            );
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "error": "not stuck" })),
            )
                .into_response()
        }
        Err(PipelineError::Validation(message)) => ApiError::BadRequest(message).into_response(),
        Err(PipelineError::Persistence(err)) => {
            ApiError::Common(err).into_response()
        }
        Err(other) => ApiError::Internal(other.to_string()).into_response(),
    }
}

async fn run_sweep(state: AppState) -> Response {
    match state.recovery.sweep().await {
        Ok(report) => Json(json!({
            "success": true,
            "scanned": report.scanned,
            "repaired": report.repaired(),
            "results": report.outcomes,
        }))
        .into_response(),
        Err(PipelineError::Persistence(err)) => ApiError::Common(err).into_response(),
        Err(other) => ApiError::Internal(other.to_string()).into_response(),
    }
}

/// Build recovery routes
pub fn recover_routes() -> Router<AppState> {
    Router::new().route("/recover-stuck-recordings", post(recover_stuck_recordings))
}
