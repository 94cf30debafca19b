//! Database access for recap-pp
//!
//! SQLite via sqlx. Tables are bootstrapped at pool init; all timestamps
//! are stored as RFC 3339 text.

pub mod jobs;
pub mod recordings;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize the database connection pool
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create recap-pp tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recordings (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            file_url TEXT NOT NULL,
            file_size INTEGER,
            status TEXT NOT NULL DEFAULT 'pending',
            transcript TEXT,
            ai_summary TEXT,
            ai_insights TEXT,
            coaching_evaluation TEXT,
            error_message TEXT,
            processing_notes TEXT,
            processing_progress INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS processing_jobs (
            id TEXT PRIMARY KEY,
            recording_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            created_at TEXT NOT NULL,
            start_time TEXT,
            end_time TEXT,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_recordings_status ON recordings(status)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_jobs_created_at ON processing_jobs(created_at)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (recordings, processing_jobs)");

    Ok(())
}
