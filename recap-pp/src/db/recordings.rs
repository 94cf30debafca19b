//! Recording row persistence
//!
//! All status changes go through the guarded transition functions: the
//! UPDATE is conditioned on the status the caller read, so a lost race
//! surfaces as a failed transition instead of a silent double write.
//! Every write refreshes `updated_at`.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::models::{Recording, RecordingStatus};
use crate::utils::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};
use recap_common::Result;

fn parse_ts(field: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| recap_common::Error::Internal(format!("Failed to parse {}: {}", field, e)))
}

fn parse_json(field: &str, value: Option<String>) -> Result<Option<serde_json::Value>> {
    value
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| recap_common::Error::Internal(format!("Failed to parse {}: {}", field, e)))
}

fn row_to_recording(row: &sqlx::sqlite::SqliteRow) -> Result<Recording> {
    let id_str: String = row.get("id");
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| recap_common::Error::Internal(format!("Failed to parse id: {}", e)))?;

    let status_str: String = row.get("status");
    let status = RecordingStatus::parse(&status_str).ok_or_else(|| {
        recap_common::Error::Internal(format!("Unknown recording status: {}", status_str))
    })?;

    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Recording {
        id,
        title: row.get("title"),
        file_url: row.get("file_url"),
        file_size: row.get("file_size"),
        status,
        transcript: row.get("transcript"),
        ai_summary: row.get("ai_summary"),
        ai_insights: parse_json("ai_insights", row.get("ai_insights"))?,
        coaching_evaluation: parse_json("coaching_evaluation", row.get("coaching_evaluation"))?,
        error_message: row.get("error_message"),
        processing_notes: row.get("processing_notes"),
        processing_progress: row.get("processing_progress"),
        created_at: parse_ts("created_at", &created_at)?,
        updated_at: parse_ts("updated_at", &updated_at)?,
    })
}

/// Insert a new recording row
pub async fn insert(pool: &SqlitePool, recording: &Recording) -> Result<()> {
    let id = recording.id.to_string();
    let status = recording.status.as_str();
    let ai_insights = recording
        .ai_insights
        .as_ref()
        .map(|v| v.to_string());
    let coaching = recording
        .coaching_evaluation
        .as_ref()
        .map(|v| v.to_string());
    let created_at = recording.created_at.to_rfc3339();
    let updated_at = recording.updated_at.to_rfc3339();

    retry_on_lock("insert_recording", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        sqlx::query(
            r#"
            INSERT INTO recordings (
                id, title, file_url, file_size, status,
                transcript, ai_summary, ai_insights, coaching_evaluation,
                error_message, processing_notes, processing_progress,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&recording.title)
        .bind(&recording.file_url)
        .bind(recording.file_size)
        .bind(status)
        .bind(&recording.transcript)
        .bind(&recording.ai_summary)
        .bind(&ai_insights)
        .bind(&coaching)
        .bind(&recording.error_message)
        .bind(&recording.processing_notes)
        .bind(recording.processing_progress)
        .bind(&created_at)
        .bind(&updated_at)
        .execute(pool)
        .await
        .map_err(recap_common::Error::Database)?;
        Ok(())
    })
    .await
}

/// Load a recording by id
pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<Option<Recording>> {
    let id_str = id.to_string();
    let row = sqlx::query("SELECT * FROM recordings WHERE id = ?")
        .bind(id_str)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(row_to_recording).transpose()
}

/// Recent-first recording list
pub async fn list_recent(pool: &SqlitePool, limit: i64) -> Result<Vec<Recording>> {
    let rows = sqlx::query("SELECT * FROM recordings ORDER BY created_at DESC LIMIT ?")
        .bind(limit)
        .fetch_all(pool)
        .await?;

    rows.iter().map(row_to_recording).collect()
}

/// Recordings currently in a working state (recovery sweep candidates)
pub async fn list_working(pool: &SqlitePool) -> Result<Vec<Recording>> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM recordings
        WHERE status IN ('processing', 'transcribing', 'processing_large_file')
        ORDER BY created_at ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_recording).collect()
}

/// Core guarded write: status + progress + error_message, conditioned on
/// the status the caller observed. Returns false when the row was not in
/// the expected status anymore (race lost or already moved).
async fn guarded_status_write(
    pool: &SqlitePool,
    id: Uuid,
    expected: RecordingStatus,
    target: RecordingStatus,
    progress: Option<i64>,
    error_message: Option<&str>,
) -> Result<bool> {
    let id_str = id.to_string();
    let now = Utc::now().to_rfc3339();

    let result = retry_on_lock("transition_recording", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        sqlx::query(
            r#"
            UPDATE recordings
            SET status = ?,
                processing_progress = COALESCE(?, processing_progress),
                error_message = ?,
                updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(target.as_str())
        .bind(progress)
        .bind(error_message)
        .bind(&now)
        .bind(&id_str)
        .bind(expected.as_str())
        .execute(pool)
        .await
        .map_err(recap_common::Error::Database)
    })
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Perform a legality-checked transition
///
/// Fails with `IllegalTransition` when the edge is not in the state
/// machine's legal set, or when the row moved out of the observed status
/// before the write landed.
pub async fn transition(
    pool: &SqlitePool,
    recording: &Recording,
    target: RecordingStatus,
    progress: Option<i64>,
    error_message: Option<&str>,
) -> std::result::Result<(), PipelineError> {
    if !recording.status.can_transition_to(target) {
        return Err(PipelineError::IllegalTransition {
            from: recording.status,
            to: target,
        });
    }

    let written =
        guarded_status_write(pool, recording.id, recording.status, target, progress, error_message)
            .await?;
    if !written {
        return Err(PipelineError::IllegalTransition {
            from: recording.status,
            to: target,
        });
    }

    tracing::debug!(
        recording_id = %recording.id,
        from = %recording.status,
        to = %target,
        "Recording transitioned"
    );
    Ok(())
}

/// Recovery escape hatch: force a transition out of any non-terminal state
///
/// Terminal states are still protected; forcing out of one is an error.
pub async fn transition_forced(
    pool: &SqlitePool,
    recording: &Recording,
    target: RecordingStatus,
    progress: Option<i64>,
    error_message: Option<&str>,
) -> std::result::Result<(), PipelineError> {
    if recording.status.is_terminal() {
        return Err(PipelineError::IllegalTransition {
            from: recording.status,
            to: target,
        });
    }

    let written =
        guarded_status_write(pool, recording.id, recording.status, target, progress, error_message)
            .await?;
    if !written {
        return Err(PipelineError::IllegalTransition {
            from: recording.status,
            to: target,
        });
    }

    tracing::info!(
        recording_id = %recording.id,
        from = %recording.status,
        to = %target,
        "Recording transition forced by recovery"
    );
    Ok(())
}

/// Persist the transcript and move transcribing → transcribed in one write
pub async fn complete_transcription(
    pool: &SqlitePool,
    recording: &Recording,
    transcript: &str,
    progress: i64,
) -> std::result::Result<(), PipelineError> {
    if !recording.status.can_transition_to(RecordingStatus::Transcribed) {
        return Err(PipelineError::IllegalTransition {
            from: recording.status,
            to: RecordingStatus::Transcribed,
        });
    }

    let id_str = recording.id.to_string();
    let expected = recording.status.as_str();
    let now = Utc::now().to_rfc3339();

    let result = retry_on_lock("complete_transcription", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        sqlx::query(
            r#"
            UPDATE recordings
            SET status = 'transcribed',
                transcript = ?,
                processing_progress = ?,
                error_message = NULL,
                updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(transcript)
        .bind(progress)
        .bind(&now)
        .bind(&id_str)
        .bind(expected)
        .execute(pool)
        .await
        .map_err(recap_common::Error::Database)
    })
    .await
    .map_err(PipelineError::Persistence)?;

    if result.rows_affected() == 0 {
        return Err(PipelineError::IllegalTransition {
            from: recording.status,
            to: RecordingStatus::Transcribed,
        });
    }
    Ok(())
}

/// Persist analysis results and move transcribed → completed in one write
pub async fn complete_analysis(
    pool: &SqlitePool,
    recording: &Recording,
    summary: &str,
    insights: Option<&serde_json::Value>,
    coaching: Option<&serde_json::Value>,
    progress: i64,
) -> std::result::Result<(), PipelineError> {
    if !recording.status.can_transition_to(RecordingStatus::Completed) {
        return Err(PipelineError::IllegalTransition {
            from: recording.status,
            to: RecordingStatus::Completed,
        });
    }

    let id_str = recording.id.to_string();
    let expected = recording.status.as_str();
    let insights_json = insights.map(|v| v.to_string());
    let coaching_json = coaching.map(|v| v.to_string());
    let now = Utc::now().to_rfc3339();

    let result = retry_on_lock("complete_analysis", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        sqlx::query(
            r#"
            UPDATE recordings
            SET status = 'completed',
                ai_summary = ?,
                ai_insights = ?,
                coaching_evaluation = ?,
                processing_progress = ?,
                error_message = NULL,
                updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(summary)
        .bind(&insights_json)
        .bind(&coaching_json)
        .bind(progress)
        .bind(&now)
        .bind(&id_str)
        .bind(expected)
        .execute(pool)
        .await
        .map_err(recap_common::Error::Database)
    })
    .await
    .map_err(PipelineError::Persistence)?;

    if result.rows_affected() == 0 {
        return Err(PipelineError::IllegalTransition {
            from: recording.status,
            to: RecordingStatus::Completed,
        });
    }
    Ok(())
}

/// Forced reset for on-demand recovery: back to transcribing, progress 0,
/// with the recovery annotation in error_message
pub async fn reset_for_retry(
    pool: &SqlitePool,
    recording: &Recording,
    annotation: &str,
) -> std::result::Result<(), PipelineError> {
    transition_forced(
        pool,
        recording,
        RecordingStatus::Transcribing,
        Some(crate::models::PROGRESS_QUEUED),
        Some(annotation),
    )
    .await
}

/// Append an operational note to processing_notes
pub async fn append_note(pool: &SqlitePool, id: Uuid, note: &str) -> Result<()> {
    let id_str = id.to_string();
    let now = Utc::now().to_rfc3339();

    retry_on_lock("append_note", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        sqlx::query(
            r#"
            UPDATE recordings
            SET processing_notes = CASE
                    WHEN processing_notes IS NULL THEN ?
                    ELSE processing_notes || '; ' || ?
                END,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(note)
        .bind(note)
        .bind(&now)
        .bind(&id_str)
        .execute(pool)
        .await
        .map_err(recap_common::Error::Database)?;
        Ok(())
    })
    .await
}

/// Bump processing_progress (monotonic within an attempt; the write is
/// guarded so progress never moves backwards)
pub async fn update_progress(pool: &SqlitePool, id: Uuid, progress: i64) -> Result<()> {
    let id_str = id.to_string();
    let now = Utc::now().to_rfc3339();

    retry_on_lock("update_progress", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        sqlx::query(
            r#"
            UPDATE recordings
            SET processing_progress = ?,
                updated_at = ?
            WHERE id = ? AND processing_progress <= ?
            "#,
        )
        .bind(progress)
        .bind(&now)
        .bind(&id_str)
        .bind(progress)
        .execute(pool)
        .await
        .map_err(recap_common::Error::Database)?;
        Ok(())
    })
    .await
}
