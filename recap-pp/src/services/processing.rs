//! Processing client: drives one recording through the pipeline
//!
//! One call = one attempt: transcription then analysis, strictly
//! sequential, each stage persisted as it completes. Stage failures are
//! converted into a persisted failure state and reported in the returned
//! outcome; the entry point only errors for validation and persistence
//! problems. Retries are the recovery scanner's responsibility.

use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::db;
use crate::error::PipelineError;
use crate::models::{
    JobStatus, ProcessingJob, Recording, RecordingStatus, PROGRESS_ANALYZING, PROGRESS_COMPLETE,
    PROGRESS_QUEUED, PROGRESS_TRANSCRIBED, PROGRESS_TRANSCRIBING,
};
use crate::services::analysis_client::{AnalysisRequest, Analyzer};
use crate::services::size_router::{attempt_chain, ProcessingStrategy, RoutePlan, SizeRouter};
use crate::services::transcription_client::{Transcriber, TranscriptionRequest};
use recap_common::events::{EventBus, RecapEvent};

/// Synchronous result of one processing attempt
///
/// Callers use this for the HTTP response only; the recording row is the
/// source of truth for state.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProcessOutcome {
    /// Whether the recording reached `completed` (or already had results)
    pub success: bool,
    /// Recording the attempt ran against
    pub recording_id: Uuid,
    /// Status after the attempt
    pub status: RecordingStatus,
    /// Failure detail when success is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether a transcript is present after the attempt
    pub transcript_present: bool,
    /// Whether a summary is present after the attempt
    pub summary_present: bool,
    /// Total attempt wall-clock time
    pub elapsed_ms: u64,
}

/// Orchestrates Transcribe → Analyze for one recording
pub struct ProcessingClient {
    db: SqlitePool,
    event_bus: EventBus,
    router: SizeRouter,
    transcriber: Arc<dyn Transcriber>,
    analyzer: Arc<dyn Analyzer>,
}

impl ProcessingClient {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        pipeline: &PipelineConfig,
        transcriber: Arc<dyn Transcriber>,
        analyzer: Arc<dyn Analyzer>,
    ) -> Self {
        Self {
            db,
            event_bus,
            router: SizeRouter::new(pipeline),
            transcriber,
            analyzer,
        }
    }

    /// The router this client dispatches through
    pub fn router(&self) -> &SizeRouter {
        &self.router
    }

    /// Run one processing attempt for a recording
    ///
    /// Never returns an error for stage failures; those are persisted and
    /// reported in the outcome. Errors are limited to a missing recording
    /// (validation) and store failures (persistence).
    pub async fn process(&self, recording_id: Uuid) -> Result<ProcessOutcome, PipelineError> {
        let started = Instant::now();

        let recording = db::recordings::get(&self.db, recording_id)
            .await
            .map_err(PipelineError::Persistence)?
            .ok_or_else(|| {
                PipelineError::Validation(format!("recording {} not found", recording_id))
            })?;

        if recording.file_url.trim().is_empty() {
            return Err(PipelineError::Validation(format!(
                "recording {} has an empty file reference",
                recording_id
            )));
        }

        // Idempotent resume: complete results mean nothing to do
        if recording.status == RecordingStatus::Completed && recording.has_complete_results() {
            tracing::debug!(recording_id = %recording_id, "Recording already completed, skipping");
            return Ok(self.outcome(&recording, true, None, started));
        }
        if recording.status.is_terminal() {
            return Ok(self.outcome(
                &recording,
                false,
                Some(format!(
                    "recording is in terminal state '{}'; recovery is required to retry",
                    recording.status
                )),
                started,
            ));
        }

        let plan = self.router.route(recording.file_size);
        tracing::info!(
            recording_id = %recording_id,
            file_size = ?recording.file_size,
            primary = %plan.primary(),
            "Dispatching processing attempt"
        );

        // Observability row for this attempt
        let job = ProcessingJob::new(recording_id);
        db::jobs::insert(&self.db, &job)
            .await
            .map_err(PipelineError::Persistence)?;
        db::jobs::mark_running(&self.db, job.id)
            .await
            .map_err(PipelineError::Persistence)?;

        match self.run_stages(recording, &plan).await {
            Ok(final_recording) => {
                db::jobs::close(&self.db, job.id, JobStatus::Completed)
                    .await
                    .map_err(PipelineError::Persistence)?;
                Ok(self.outcome(&final_recording, true, None, started))
            }
            Err(err) if err.is_persistence() => {
                // Best effort: without a working store the job row may be
                // beyond saving too
                let _ = db::jobs::close(&self.db, job.id, JobStatus::Failed).await;
                Err(err)
            }
            Err(err) => {
                db::jobs::close(&self.db, job.id, JobStatus::Failed)
                    .await
                    .map_err(PipelineError::Persistence)?;
                // The failure state was persisted by the failing stage;
                // re-read so the outcome reflects the row
                let current = db::recordings::get(&self.db, recording_id)
                    .await
                    .map_err(PipelineError::Persistence)?;
                Ok(ProcessOutcome {
                    success: false,
                    recording_id,
                    status: current
                        .as_ref()
                        .map(|r| r.status)
                        .unwrap_or(RecordingStatus::Failed),
                    error: Some(err.to_string()),
                    transcript_present: current
                        .as_ref()
                        .map(|r| r.transcript.is_some())
                        .unwrap_or(false),
                    summary_present: current
                        .as_ref()
                        .map(|r| r.ai_summary.is_some())
                        .unwrap_or(false),
                    elapsed_ms: started.elapsed().as_millis() as u64,
                })
            }
        }
    }

    /// Sequential stage execution; failure states are persisted here
    /// before the error is returned.
    async fn run_stages(
        &self,
        mut recording: Recording,
        plan: &RoutePlan,
    ) -> Result<Recording, PipelineError> {
        // Claim: move the row into the working state for this path. The
        // guard is the status condition on the UPDATE only; there is no
        // lock (known gap, see DESIGN notes).
        if matches!(
            recording.status,
            RecordingStatus::Pending | RecordingStatus::Uploading
        ) {
            let target = if plan.is_large_file() {
                RecordingStatus::ProcessingLargeFile
            } else {
                RecordingStatus::Processing
            };
            self.transition(&mut recording, target, Some(PROGRESS_QUEUED), None)
                .await?;
        }

        if recording.transcript.is_none() {
            self.run_transcription(&mut recording, plan).await?;
        } else {
            // Idempotent resume: transcript already persisted, advance the
            // status to match without calling the provider
            self.advance_to_transcribed(&mut recording).await?;
        }

        if recording.ai_summary.is_none() {
            self.run_analysis(&mut recording).await?;
        } else if recording.status == RecordingStatus::Transcribed {
            // Results already present from an interrupted final write
            self.transition(&mut recording, RecordingStatus::Completed, Some(PROGRESS_COMPLETE), None)
                .await?;
        }

        Ok(recording)
    }

    async fn run_transcription(
        &self,
        recording: &mut Recording,
        plan: &RoutePlan,
    ) -> Result<(), PipelineError> {
        if matches!(
            recording.status,
            RecordingStatus::Processing | RecordingStatus::ProcessingLargeFile
        ) {
            self.transition(
                recording,
                RecordingStatus::Transcribing,
                Some(PROGRESS_TRANSCRIBING),
                None,
            )
            .await?;
        }

        let stage_start = Instant::now();
        let request = TranscriptionRequest {
            recording_id: recording.id,
            file_url: recording.file_url.clone(),
            file_size: recording.file_size,
        };

        // Ceiling check first: a file the service can never accept must
        // fail before any network call
        let result = match self.router.check_transcribable(recording.file_size) {
            Err(err) => Err(err),
            Ok(()) => {
                attempt_chain("transcription", plan, |strategy| {
                    let request = &request;
                    async move {
                        self.transcriber
                            .transcribe(request, strategy)
                            .await
                            .map(|text| (strategy, text))
                    }
                })
                .await
            }
        };

        match result {
            Ok((strategy, text)) => {
                let elapsed_ms = stage_start.elapsed().as_millis() as u64;
                let old_status = recording.status;
                db::recordings::complete_transcription(
                    &self.db,
                    recording,
                    &text,
                    PROGRESS_TRANSCRIBED,
                )
                .await?;
                recording.transcript = Some(text);
                recording.status = RecordingStatus::Transcribed;
                recording.processing_progress = PROGRESS_TRANSCRIBED;

                self.note_stage(recording.id, "transcription", elapsed_ms, Some(strategy))
                    .await?;
                self.emit_status(recording.id, old_status, recording.status);
                self.event_bus.emit_lossy(RecapEvent::ProcessingStageCompleted {
                    recording_id: recording.id,
                    stage: "transcription".to_string(),
                    elapsed_ms,
                    timestamp: chrono::Utc::now(),
                });
                Ok(())
            }
            Err(err) if err.is_persistence() => Err(err),
            Err(err) => {
                // Upstream detail is captured verbatim in error_message
                let message = err.to_string();
                let old_status = recording.status;
                db::recordings::transition(
                    &self.db,
                    recording,
                    RecordingStatus::TranscriptionFailed,
                    None,
                    Some(&message),
                )
                .await?;
                recording.status = RecordingStatus::TranscriptionFailed;
                self.emit_status(recording.id, old_status, recording.status);
                tracing::warn!(
                    recording_id = %recording.id,
                    error = %message,
                    "Transcription stage failed"
                );
                Err(err)
            }
        }
    }

    async fn run_analysis(&self, recording: &mut Recording) -> Result<(), PipelineError> {
        let transcript = recording.transcript.clone().ok_or_else(|| {
            PipelineError::Validation(format!(
                "recording {} has no transcript to analyze",
                recording.id
            ))
        })?;

        db::recordings::update_progress(&self.db, recording.id, PROGRESS_ANALYZING)
            .await
            .map_err(PipelineError::Persistence)?;

        let stage_start = Instant::now();
        let request = AnalysisRequest {
            recording_id: recording.id,
            transcript,
        };

        match self.analyzer.analyze(&request).await {
            Ok(result) => {
                let elapsed_ms = stage_start.elapsed().as_millis() as u64;
                let old_status = recording.status;
                db::recordings::complete_analysis(
                    &self.db,
                    recording,
                    &result.summary,
                    result.insights.as_ref(),
                    result.coaching_evaluation.as_ref(),
                    PROGRESS_COMPLETE,
                )
                .await?;
                recording.ai_summary = Some(result.summary);
                recording.ai_insights = result.insights;
                recording.coaching_evaluation = result.coaching_evaluation;
                recording.status = RecordingStatus::Completed;
                recording.processing_progress = PROGRESS_COMPLETE;

                self.note_stage(recording.id, "analysis", elapsed_ms, None).await?;
                self.emit_status(recording.id, old_status, recording.status);
                self.event_bus.emit_lossy(RecapEvent::ProcessingStageCompleted {
                    recording_id: recording.id,
                    stage: "analysis".to_string(),
                    elapsed_ms,
                    timestamp: chrono::Utc::now(),
                });
                Ok(())
            }
            Err(err) if err.is_persistence() => Err(err),
            Err(err) => {
                let message = err.to_string();
                let old_status = recording.status;
                db::recordings::transition(
                    &self.db,
                    recording,
                    RecordingStatus::ProcessingFailed,
                    None,
                    Some(&message),
                )
                .await?;
                recording.status = RecordingStatus::ProcessingFailed;
                self.emit_status(recording.id, old_status, recording.status);
                tracing::warn!(
                    recording_id = %recording.id,
                    error = %message,
                    "Analysis stage failed"
                );
                Err(err)
            }
        }
    }

    /// Walk the row to `transcribed` along legal edges without any
    /// provider call (transcript already present)
    async fn advance_to_transcribed(
        &self,
        recording: &mut Recording,
    ) -> Result<(), PipelineError> {
        if matches!(
            recording.status,
            RecordingStatus::Transcribed | RecordingStatus::Completed
        ) {
            return Ok(());
        }
        if matches!(
            recording.status,
            RecordingStatus::Pending | RecordingStatus::Uploading
        ) {
            self.transition(
                recording,
                RecordingStatus::Processing,
                Some(PROGRESS_QUEUED),
                None,
            )
            .await?;
        }
        if matches!(
            recording.status,
            RecordingStatus::Processing | RecordingStatus::ProcessingLargeFile
        ) {
            self.transition(
                recording,
                RecordingStatus::Transcribing,
                Some(PROGRESS_TRANSCRIBING),
                None,
            )
            .await?;
        }
        if recording.status == RecordingStatus::Transcribing {
            self.transition(
                recording,
                RecordingStatus::Transcribed,
                Some(PROGRESS_TRANSCRIBED),
                None,
            )
            .await?;
        }
        Ok(())
    }

    async fn transition(
        &self,
        recording: &mut Recording,
        target: RecordingStatus,
        progress: Option<i64>,
        error_message: Option<&str>,
    ) -> Result<(), PipelineError> {
        let old_status = recording.status;
        db::recordings::transition(&self.db, recording, target, progress, error_message).await?;
        recording.status = target;
        if let Some(progress) = progress {
            recording.processing_progress = progress;
        }
        self.emit_status(recording.id, old_status, target);
        Ok(())
    }

    async fn note_stage(
        &self,
        recording_id: Uuid,
        stage: &str,
        elapsed_ms: u64,
        strategy: Option<ProcessingStrategy>,
    ) -> Result<(), PipelineError> {
        let note = match strategy {
            Some(strategy) => format!("{} completed in {} ms via {}", stage, elapsed_ms, strategy),
            None => format!("{} completed in {} ms", stage, elapsed_ms),
        };
        db::recordings::append_note(&self.db, recording_id, &note)
            .await
            .map_err(PipelineError::Persistence)
    }

    fn emit_status(&self, recording_id: Uuid, old: RecordingStatus, new: RecordingStatus) {
        self.event_bus.emit_lossy(RecapEvent::RecordingStatusChanged {
            recording_id,
            old_status: old.as_str().to_string(),
            new_status: new.as_str().to_string(),
            timestamp: chrono::Utc::now(),
        });
    }

    fn outcome(
        &self,
        recording: &Recording,
        success: bool,
        error: Option<String>,
        started: Instant,
    ) -> ProcessOutcome {
        ProcessOutcome {
            success,
            recording_id: recording.id,
            status: recording.status,
            error: error.or_else(|| recording.error_message.clone()),
            transcript_present: recording.transcript.is_some(),
            summary_present: recording.ai_summary.is_some(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }
}
