//! Recording registration and read-only status queries

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{Recording, RecordingStatus};
use crate::AppState;

/// POST /recordings request: a completed upload to register
#[derive(Debug, Deserialize)]
pub struct CreateRecordingRequest {
    pub title: String,
    pub file_url: String,
    #[serde(default)]
    pub file_size: Option<i64>,
}

/// Status-surface view of a recording
#[derive(Debug, Serialize)]
pub struct RecordingView {
    pub id: Uuid,
    pub title: String,
    pub status: RecordingStatus,
    pub file_size: Option<i64>,
    pub transcript_present: bool,
    pub summary_present: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_notes: Option<String>,
    pub processing_progress: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Detail view: the status surface plus the stored results
#[derive(Debug, Serialize)]
pub struct RecordingDetail {
    #[serde(flatten)]
    pub view: RecordingView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_insights: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coaching_evaluation: Option<serde_json::Value>,
}

impl RecordingView {
    fn from_recording(recording: &Recording) -> Self {
        Self {
            id: recording.id,
            title: recording.title.clone(),
            status: recording.status,
            file_size: recording.file_size,
            transcript_present: recording.transcript.is_some(),
            summary_present: recording.ai_summary.is_some(),
            error_message: recording.error_message.clone(),
            processing_notes: recording.processing_notes.clone(),
            processing_progress: recording.processing_progress,
            created_at: recording.created_at,
            updated_at: recording.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

/// POST /recordings
///
/// Register a completed upload. The upload transport is handled
/// elsewhere; only the file reference and size arrive here.
pub async fn create_recording(
    State(state): State<AppState>,
    Json(request): Json<CreateRecordingRequest>,
) -> ApiResult<Json<RecordingView>> {
    if request.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".to_string()));
    }
    if request.file_url.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "file_url must not be empty".to_string(),
        ));
    }

    let recording = Recording::new(request.title, request.file_url, request.file_size);
    crate::db::recordings::insert(&state.db, &recording).await?;

    tracing::info!(
        recording_id = %recording.id,
        file_size = ?recording.file_size,
        "Recording registered"
    );

    Ok(Json(RecordingView::from_recording(&recording)))
}

/// GET /recordings?limit=N — recent-first list
pub async fn list_recordings(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<RecordingView>>> {
    let limit = params.limit.clamp(1, 500);
    let recordings = crate::db::recordings::list_recent(&state.db, limit).await?;
    Ok(Json(
        recordings.iter().map(RecordingView::from_recording).collect(),
    ))
}

/// GET /recordings/{id} — full detail for one recording
pub async fn get_recording(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RecordingDetail>> {
    let recording = crate::db::recordings::get(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Recording not found: {}", id)))?;

    Ok(Json(RecordingDetail {
        view: RecordingView::from_recording(&recording),
        transcript: recording.transcript,
        ai_summary: recording.ai_summary,
        ai_insights: recording.ai_insights,
        coaching_evaluation: recording.coaching_evaluation,
    }))
}

/// Build recording routes
pub fn recording_routes() -> Router<AppState> {
    Router::new()
        .route("/recordings", post(create_recording).get(list_recordings))
        .route("/recordings/:id", get(get_recording))
}
