//! Stuck-recording recovery
//!
//! Restores the invariant that no recording stays in a working state
//! forever. The batch sweep repairs rows whose final write crashed after
//! producing results, fails rows that exceeded the staleness threshold,
//! and leaves young rows alone. The single-id path resets a stuck (or
//! forced) recording and re-dispatches it through the router's candidate
//! list exactly as a fresh job.

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db;
use crate::error::PipelineError;
use crate::models::{Recording, RecordingStatus, PROGRESS_COMPLETE, PROGRESS_TRANSCRIBED};
use crate::services::processing::{ProcessOutcome, ProcessingClient};
use recap_common::events::{EventBus, RecapEvent};

/// What the sweep did with one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepAction {
    /// Both results present: forced to completed
    CompletedFromResults,
    /// Transcript only: forced to transcribed
    RestoredTranscribed,
    /// Past the staleness threshold with no partial results: failed
    TimedOut,
    /// Too young to touch; optional annotation only
    StillProcessing,
    /// Handling this candidate errored (others are unaffected)
    Error,
}

/// Per-candidate sweep outcome
#[derive(Debug, Clone, Serialize)]
pub struct CandidateOutcome {
    pub recording_id: Uuid,
    pub previous_status: RecordingStatus,
    pub action: SweepAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Aggregate sweep report
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub outcomes: Vec<CandidateOutcome>,
}

impl SweepReport {
    pub fn count(&self, action: SweepAction) -> usize {
        self.outcomes.iter().filter(|o| o.action == action).count()
    }

    pub fn repaired(&self) -> usize {
        self.count(SweepAction::CompletedFromResults) + self.count(SweepAction::RestoredTranscribed)
    }
}

/// Result of single-id recovery
#[derive(Debug, Clone, Serialize)]
pub struct RecoveryOutcome {
    pub success: bool,
    pub recording_id: Uuid,
    /// Status before the reset
    pub previous_status: RecordingStatus,
    /// Primary strategy the re-dispatch used
    pub retry_method: &'static str,
    /// Status after the re-dispatched attempt
    pub status: RecordingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Scans for and recovers recordings stuck in working states
pub struct RecoveryScanner {
    db: SqlitePool,
    event_bus: EventBus,
    stale_after_minutes: i64,
}

impl RecoveryScanner {
    pub fn new(db: SqlitePool, event_bus: EventBus, stale_after_minutes: i64) -> Self {
        Self {
            db,
            event_bus,
            stale_after_minutes,
        }
    }

    /// Batch sweep over all working-state recordings
    ///
    /// Candidates are handled independently: one candidate's failure is
    /// recorded in the report and the sweep continues.
    pub async fn sweep(&self) -> Result<SweepReport, PipelineError> {
        let candidates = db::recordings::list_working(&self.db)
            .await
            .map_err(PipelineError::Persistence)?;

        let scanned = candidates.len();
        let mut outcomes = Vec::with_capacity(scanned);

        for recording in candidates {
            let recording_id = recording.id;
            let previous_status = recording.status;
            let outcome = match self.handle_candidate(&recording).await {
                Ok((action, detail)) => CandidateOutcome {
                    recording_id,
                    previous_status,
                    action,
                    detail,
                },
                Err(err) => {
                    tracing::error!(
                        recording_id = %recording_id,
                        error = %err,
                        "Sweep candidate handling failed"
                    );
                    CandidateOutcome {
                        recording_id,
                        previous_status,
                        action: SweepAction::Error,
                        detail: Some(err.to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }

        let report = SweepReport { scanned, outcomes };
        tracing::info!(
            scanned = report.scanned,
            repaired = report.repaired(),
            timed_out = report.count(SweepAction::TimedOut),
            untouched = report.count(SweepAction::StillProcessing),
            errors = report.count(SweepAction::Error),
            "Recovery sweep finished"
        );
        self.event_bus.emit_lossy(RecapEvent::RecoverySweepCompleted {
            scanned: report.scanned,
            repaired: report.repaired(),
            timed_out: report.count(SweepAction::TimedOut),
            untouched: report.count(SweepAction::StillProcessing),
            errors: report.count(SweepAction::Error),
            timestamp: Utc::now(),
        });

        Ok(report)
    }

    async fn handle_candidate(
        &self,
        recording: &Recording,
    ) -> Result<(SweepAction, Option<String>), PipelineError> {
        let age_minutes = recording.age_minutes(Utc::now());

        // Final write crashed after producing results: restore the
        // terminal state the results imply
        if recording.has_complete_results() {
            db::recordings::transition_forced(
                &self.db,
                recording,
                RecordingStatus::Completed,
                Some(PROGRESS_COMPLETE),
                None,
            )
            .await?;
            self.emit_status(recording, RecordingStatus::Completed);
            return Ok((SweepAction::CompletedFromResults, None));
        }

        if recording.transcript.is_some() {
            db::recordings::transition_forced(
                &self.db,
                recording,
                RecordingStatus::Transcribed,
                Some(PROGRESS_TRANSCRIBED),
                None,
            )
            .await?;
            self.emit_status(recording, RecordingStatus::Transcribed);
            return Ok((SweepAction::RestoredTranscribed, None));
        }

        if age_minutes > self.stale_after_minutes {
            let message = format!("Processing timeout after {} minutes", age_minutes);
            db::recordings::transition_forced(
                &self.db,
                recording,
                RecordingStatus::Failed,
                None,
                Some(&message),
            )
            .await?;
            self.emit_status(recording, RecordingStatus::Failed);
            return Ok((SweepAction::TimedOut, Some(message)));
        }

        // Young with no partial results: annotate once with a size-based
        // estimate, no state change
        let already_noted = recording
            .processing_notes
            .as_deref()
            .map(|n| n.contains("still processing"))
            .unwrap_or(false);
        if !already_noted {
            let note = still_processing_note(recording.file_size, age_minutes);
            db::recordings::append_note(&self.db, recording.id, &note)
                .await
                .map_err(PipelineError::Persistence)?;
        }
        Ok((SweepAction::StillProcessing, None))
    }

    /// On-demand recovery of a single recording
    ///
    /// A recording that is not stuck (young, and `force_retry` not set)
    /// yields `NotStuck` without mutation. Otherwise the row is reset to
    /// `transcribing` with an annotated error_message and re-dispatched
    /// through the processing client.
    pub async fn recover_one(
        &self,
        processing: &ProcessingClient,
        recording_id: Uuid,
        force_retry: bool,
    ) -> Result<RecoveryOutcome, PipelineError> {
        let recording = db::recordings::get(&self.db, recording_id)
            .await
            .map_err(PipelineError::Persistence)?
            .ok_or_else(|| {
                PipelineError::Validation(format!("recording {} not found", recording_id))
            })?;

        if !recording.status.is_working() {
            return Err(PipelineError::Validation(format!(
                "recording {} is not in a working state (status '{}')",
                recording_id, recording.status
            )));
        }

        let age_minutes = recording.age_minutes(Utc::now());
        let stuck = age_minutes > self.stale_after_minutes;
        if !stuck && !force_retry {
            return Err(PipelineError::NotStuck {
                status: recording.status,
                age_minutes,
            });
        }

        let previous_status = recording.status;
        let annotation = format!(
            "Recovery retry: reset from '{}' after {} minutes{}",
            previous_status,
            age_minutes,
            if force_retry { " (forced)" } else { "" }
        );
        db::recordings::reset_for_retry(&self.db, &recording, &annotation).await?;
        self.emit_status(&recording, RecordingStatus::Transcribing);

        let plan = processing.router().route(recording.file_size);
        tracing::info!(
            recording_id = %recording_id,
            previous_status = %previous_status,
            retry_method = plan.primary().name(),
            "Re-dispatching recovered recording"
        );

        let outcome: ProcessOutcome = processing.process(recording_id).await?;

        Ok(RecoveryOutcome {
            success: outcome.success,
            recording_id,
            previous_status,
            retry_method: plan.primary().name(),
            status: outcome.status,
            error: outcome.error,
        })
    }

    fn emit_status(&self, recording: &Recording, new_status: RecordingStatus) {
        self.event_bus.emit_lossy(RecapEvent::RecordingStatusChanged {
            recording_id: recording.id,
            old_status: recording.status.as_str().to_string(),
            new_status: new_status.as_str().to_string(),
            timestamp: Utc::now(),
        });
    }
}

/// Rough remaining-time estimate for the young-candidate annotation
fn still_processing_note(file_size: Option<i64>, age_minutes: i64) -> String {
    match file_size {
        Some(size) => {
            let size_mib = size / (1024 * 1024);
            // Empirical throughput of the standard path is ~10 MiB/min
            let estimated_total = (size_mib / 10).max(1);
            let remaining = (estimated_total - age_minutes).max(1);
            format!(
                "still processing; estimated {} minutes remaining for {} MiB file",
                remaining, size_mib
            )
        }
        None => "still processing; no size available for an estimate".to_string(),
    }
}
