//! Queue health statistics
//!
//! Aggregation is a pure function over a fetched job sample so it can be
//! unit-tested without a timer. The periodic sampler and the manual
//! refresh endpoint share the same fetch-and-aggregate path; there is no
//! separate fast path.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::db;
use crate::models::{JobStatus, ProcessingJob};
use recap_common::events::{EventBus, RecapEvent};
use recap_common::Result;

/// Point-in-time queue health over a bounded sample of recent jobs
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    /// Jobs in the sample
    pub total: u64,
    /// Jobs waiting for dispatch
    pub pending: u64,
    /// Jobs currently running
    pub processing: u64,
    /// Jobs finished successfully
    pub completed: u64,
    /// Jobs failed or cancelled
    pub failed: u64,
    /// Mean (start_time - created_at) over jobs with a positive delta, ms
    pub avg_wait_ms: f64,
    /// Mean (end_time - start_time) over jobs with a positive delta, ms
    pub avg_process_ms: f64,
    /// completed / total * 100; 100 for an empty sample
    pub success_rate: f64,
    /// When the sample was taken
    pub sampled_at: DateTime<Utc>,
}

/// Aggregate a job sample into queue statistics
pub fn aggregate(jobs: &[ProcessingJob]) -> QueueStats {
    let mut pending = 0u64;
    let mut processing = 0u64;
    let mut completed = 0u64;
    let mut failed = 0u64;

    let mut wait_samples: Vec<i64> = Vec::new();
    let mut process_samples: Vec<i64> = Vec::new();

    for job in jobs {
        match job.status {
            JobStatus::Pending => pending += 1,
            JobStatus::Running => processing += 1,
            JobStatus::Completed => completed += 1,
            JobStatus::Failed | JobStatus::Cancelled => failed += 1,
        }
        if let Some(wait) = job.wait_ms() {
            wait_samples.push(wait);
        }
        if let Some(duration) = job.process_ms() {
            process_samples.push(duration);
        }
    }

    let total = jobs.len() as u64;
    let success_rate = if total == 0 {
        100.0
    } else {
        completed as f64 / total as f64 * 100.0
    };

    QueueStats {
        total,
        pending,
        processing,
        completed,
        failed,
        avg_wait_ms: mean(&wait_samples),
        avg_process_ms: mean(&process_samples),
        success_rate,
        sampled_at: Utc::now(),
    }
}

fn mean(samples: &[i64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<i64>() as f64 / samples.len() as f64
}

/// Samples the job table and caches the latest statistics
pub struct QueueMonitor {
    db: SqlitePool,
    event_bus: EventBus,
    sample_size: i64,
    latest: Arc<RwLock<Option<QueueStats>>>,
}

impl QueueMonitor {
    pub fn new(db: SqlitePool, event_bus: EventBus, sample_size: i64) -> Self {
        Self {
            db,
            event_bus,
            sample_size,
            latest: Arc::new(RwLock::new(None)),
        }
    }

    /// Fetch the latest sample and recompute statistics
    ///
    /// Used by both the periodic ticker and the manual refresh endpoint:
    /// identical query and aggregation either way.
    pub async fn refresh(&self) -> Result<QueueStats> {
        let jobs = db::jobs::latest(&self.db, self.sample_size).await?;
        let stats = aggregate(&jobs);

        *self.latest.write().await = Some(stats.clone());

        self.event_bus.emit_lossy(RecapEvent::QueueStatsUpdated {
            pending: stats.pending,
            processing: stats.processing,
            completed: stats.completed,
            failed: stats.failed,
            success_rate: stats.success_rate,
            timestamp: stats.sampled_at,
        });

        Ok(stats)
    }

    /// Last computed statistics, if a refresh has run
    pub async fn latest(&self) -> Option<QueueStats> {
        self.latest.read().await.clone()
    }
}
