//! Processing job observability records
//!
//! One row per dispatch attempt. Jobs are append-only; a job is closed
//! (gets `end_time`) exactly once. The queue monitor aggregates over the
//! most recent rows for health reporting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of one processing attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, not yet picked up
    Pending,
    /// Work started (`start_time` set)
    Running,
    /// Finished successfully (`end_time` set)
    Completed,
    /// Finished with an error (`end_time` set)
    Failed,
    /// Abandoned before completion (`end_time` set)
    Cancelled,
}

impl JobStatus {
    /// Stable string form, used for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Parse the stable string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            "cancelled" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One processing attempt for a recording
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingJob {
    /// Unique job identifier
    pub id: Uuid,
    /// Recording this attempt belongs to
    pub recording_id: Uuid,
    /// Attempt outcome
    pub status: JobStatus,
    /// Row creation time
    pub created_at: DateTime<Utc>,
    /// When work actually started (>= created_at)
    pub start_time: Option<DateTime<Utc>>,
    /// When work finished (>= start_time)
    pub end_time: Option<DateTime<Utc>>,
    /// Last write time
    pub updated_at: DateTime<Utc>,
}

impl ProcessingJob {
    /// Create a new pending job for a recording
    pub fn new(recording_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            recording_id,
            status: JobStatus::Pending,
            created_at: now,
            start_time: None,
            end_time: None,
            updated_at: now,
        }
    }

    /// Queue wait in milliseconds, when both timestamps are present and ordered
    pub fn wait_ms(&self) -> Option<i64> {
        let start = self.start_time?;
        let delta = (start - self.created_at).num_milliseconds();
        (delta > 0).then_some(delta)
    }

    /// Processing duration in milliseconds, when both timestamps are present and ordered
    pub fn process_ms(&self) -> Option<i64> {
        let (start, end) = (self.start_time?, self.end_time?);
        let delta = (end - start).num_milliseconds();
        (delta > 0).then_some(delta)
    }
}
