//! Processing job persistence
//!
//! Jobs are append-only observability rows: one per dispatch attempt,
//! closed (end_time set) exactly once.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{JobStatus, ProcessingJob};
use crate::utils::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};
use recap_common::Result;

fn parse_ts(field: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| recap_common::Error::Internal(format!("Failed to parse {}: {}", field, e)))
}

fn parse_opt_ts(field: &str, value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.map(|s| parse_ts(field, &s)).transpose()
}

fn row_to_job(row: &sqlx::sqlite::SqliteRow) -> Result<ProcessingJob> {
    let id_str: String = row.get("id");
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| recap_common::Error::Internal(format!("Failed to parse job id: {}", e)))?;

    let recording_id_str: String = row.get("recording_id");
    let recording_id = Uuid::parse_str(&recording_id_str).map_err(|e| {
        recap_common::Error::Internal(format!("Failed to parse recording_id: {}", e))
    })?;

    let status_str: String = row.get("status");
    let status = JobStatus::parse(&status_str).ok_or_else(|| {
        recap_common::Error::Internal(format!("Unknown job status: {}", status_str))
    })?;

    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(ProcessingJob {
        id,
        recording_id,
        status,
        created_at: parse_ts("created_at", &created_at)?,
        start_time: parse_opt_ts("start_time", row.get("start_time"))?,
        end_time: parse_opt_ts("end_time", row.get("end_time"))?,
        updated_at: parse_ts("updated_at", &updated_at)?,
    })
}

/// Insert a new job row
pub async fn insert(pool: &SqlitePool, job: &ProcessingJob) -> Result<()> {
    let id = job.id.to_string();
    let recording_id = job.recording_id.to_string();
    let status = job.status.as_str();
    let created_at = job.created_at.to_rfc3339();
    let start_time = job.start_time.map(|t| t.to_rfc3339());
    let end_time = job.end_time.map(|t| t.to_rfc3339());
    let updated_at = job.updated_at.to_rfc3339();

    retry_on_lock("insert_job", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        sqlx::query(
            r#"
            INSERT INTO processing_jobs (
                id, recording_id, status, created_at, start_time, end_time, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&recording_id)
        .bind(status)
        .bind(&created_at)
        .bind(&start_time)
        .bind(&end_time)
        .bind(&updated_at)
        .execute(pool)
        .await
        .map_err(recap_common::Error::Database)?;
        Ok(())
    })
    .await
}

/// Mark a pending job as running, stamping start_time
pub async fn mark_running(pool: &SqlitePool, id: Uuid) -> Result<()> {
    let id_str = id.to_string();
    let now = Utc::now().to_rfc3339();

    retry_on_lock("mark_job_running", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        sqlx::query(
            r#"
            UPDATE processing_jobs
            SET status = 'running', start_time = ?, updated_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(&now)
        .bind(&now)
        .bind(&id_str)
        .execute(pool)
        .await
        .map_err(recap_common::Error::Database)?;
        Ok(())
    })
    .await
}

/// Close a job exactly once, stamping end_time
///
/// The WHERE clause refuses to reopen an already-closed job.
pub async fn close(pool: &SqlitePool, id: Uuid, status: JobStatus) -> Result<()> {
    let id_str = id.to_string();
    let now = Utc::now().to_rfc3339();

    retry_on_lock("close_job", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        sqlx::query(
            r#"
            UPDATE processing_jobs
            SET status = ?, end_time = ?, updated_at = ?
            WHERE id = ? AND end_time IS NULL
            "#,
        )
        .bind(status.as_str())
        .bind(&now)
        .bind(&now)
        .bind(&id_str)
        .execute(pool)
        .await
        .map_err(recap_common::Error::Database)?;
        Ok(())
    })
    .await
}

/// Latest jobs, newest first, bounded by `limit` (the monitor sample)
pub async fn latest(pool: &SqlitePool, limit: i64) -> Result<Vec<ProcessingJob>> {
    let rows = sqlx::query(
        "SELECT * FROM processing_jobs ORDER BY created_at DESC, id DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_job).collect()
}
