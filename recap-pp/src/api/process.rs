//! Processing trigger endpoint
//!
//! Expected upstream failures come back as 200 with `success: false`; the
//! failure is persisted on the row either way. Only malformed input, a
//! missing recording, and store failures map to error statuses.

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult, PipelineError};
use crate::AppState;

/// POST /process-recording request
#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    pub recording_id: String,
}

/// POST /process-recording
pub async fn process_recording(
    State(state): State<AppState>,
    Json(request): Json<ProcessRequest>,
) -> ApiResult<Json<Value>> {
    let recording_id = Uuid::parse_str(request.recording_id.trim()).map_err(|_| {
        ApiError::BadRequest(format!("malformed recording id: {}", request.recording_id))
    })?;

    // 404 before dispatch so unknown ids never open a job row
    if crate::db::recordings::get(&state.db, recording_id)
        .await?
        .is_none()
    {
        return Err(ApiError::NotFound(format!(
            "Recording not found: {}",
            recording_id
        )));
    }

    match state.processing.process(recording_id).await {
        Ok(outcome) => {
            if outcome.success {
                Ok(Json(json!({ "success": true, "data": outcome })))
            } else {
                Ok(Json(json!({ "success": false, "error": outcome.error, "data": outcome })))
            }
        }
        Err(PipelineError::Validation(message)) => Err(ApiError::BadRequest(message)),
        Err(PipelineError::Persistence(err)) => {
            *state.last_error.write().await = Some(err.to_string());
            Err(ApiError::Common(err))
        }
        Err(other) => {
            // The processing client converts stage failures internally;
            // anything else reaching this point is unexpected
            *state.last_error.write().await = Some(other.to_string());
            Err(ApiError::Internal(other.to_string()))
        }
    }
}

/// Build processing routes
pub fn process_routes() -> Router<AppState> {
    Router::new().route("/process-recording", post(process_recording))
}
