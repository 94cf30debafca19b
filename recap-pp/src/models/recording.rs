//! Recording lifecycle state machine
//!
//! A recording progresses through:
//! pending → uploading → processing|processing_large_file → transcribing
//! → transcribed → completed,
//! with each working state able to fall into its matching failure state and
//! any non-terminal state able to fall into `failed`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Progress milestone written when a recording is queued or reset
pub const PROGRESS_QUEUED: i64 = 0;
/// Progress milestone written when transcription begins
pub const PROGRESS_TRANSCRIBING: i64 = 25;
/// Progress milestone written when the transcript is persisted
pub const PROGRESS_TRANSCRIBED: i64 = 75;
/// Progress milestone written when analysis begins
pub const PROGRESS_ANALYZING: i64 = 85;
/// Progress milestone written at completion
pub const PROGRESS_COMPLETE: i64 = 100;

/// Recording pipeline status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingStatus {
    /// Upload registered, nothing dispatched yet
    Pending,
    /// Upload still in flight (written by the upload collaborator)
    Uploading,
    /// Standard-path run claimed the recording
    Processing,
    /// Large-file-path run claimed the recording
    ProcessingLargeFile,
    /// Transcription stage in flight
    Transcribing,
    /// Transcript persisted, analysis not yet finished
    Transcribed,
    /// All stages finished
    Completed,
    /// Failed outside a specific stage (or forced by recovery)
    Failed,
    /// Transcription stage failed
    TranscriptionFailed,
    /// Processing/analysis stage failed
    ProcessingFailed,
}

impl RecordingStatus {
    /// Stable string form, used for database storage and the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordingStatus::Pending => "pending",
            RecordingStatus::Uploading => "uploading",
            RecordingStatus::Processing => "processing",
            RecordingStatus::ProcessingLargeFile => "processing_large_file",
            RecordingStatus::Transcribing => "transcribing",
            RecordingStatus::Transcribed => "transcribed",
            RecordingStatus::Completed => "completed",
            RecordingStatus::Failed => "failed",
            RecordingStatus::TranscriptionFailed => "transcription_failed",
            RecordingStatus::ProcessingFailed => "processing_failed",
        }
    }

    /// Parse the stable string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RecordingStatus::Pending),
            "uploading" => Some(RecordingStatus::Uploading),
            "processing" => Some(RecordingStatus::Processing),
            "processing_large_file" => Some(RecordingStatus::ProcessingLargeFile),
            "transcribing" => Some(RecordingStatus::Transcribing),
            "transcribed" => Some(RecordingStatus::Transcribed),
            "completed" => Some(RecordingStatus::Completed),
            "failed" => Some(RecordingStatus::Failed),
            "transcription_failed" => Some(RecordingStatus::TranscriptionFailed),
            "processing_failed" => Some(RecordingStatus::ProcessingFailed),
            _ => None,
        }
    }

    /// Whether this status ends the lifecycle
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RecordingStatus::Completed
                | RecordingStatus::Failed
                | RecordingStatus::TranscriptionFailed
                | RecordingStatus::ProcessingFailed
        )
    }

    /// Working states the recovery scanner considers stuck candidates
    pub fn is_working(&self) -> bool {
        matches!(
            self,
            RecordingStatus::Processing
                | RecordingStatus::Transcribing
                | RecordingStatus::ProcessingLargeFile
        )
    }

    /// Whether `target` is reachable from this status along a legal edge
    ///
    /// Terminal states have no outgoing edges. Recovery uses a separate
    /// forced path and does not consult this table.
    pub fn can_transition_to(&self, target: RecordingStatus) -> bool {
        use RecordingStatus::*;
        match (self, target) {
            (Pending, Uploading)
            | (Pending, Processing)
            | (Pending, ProcessingLargeFile)
            | (Uploading, Processing)
            | (Uploading, ProcessingLargeFile)
            | (Processing, Transcribing)
            | (Processing, ProcessingFailed)
            | (ProcessingLargeFile, Transcribing)
            | (ProcessingLargeFile, ProcessingFailed)
            | (Transcribing, Transcribed)
            | (Transcribing, TranscriptionFailed)
            | (Transcribed, Completed)
            | (Transcribed, ProcessingFailed) => true,
            // Any non-terminal state may fail with an explanatory message
            (from, Failed) if !from.is_terminal() => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for RecordingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recording row: one uploaded media file and its processing results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    /// Unique recording identifier
    pub id: Uuid,
    /// Display title
    pub title: String,
    /// Reference to the uploaded media (transport handled elsewhere)
    pub file_url: String,
    /// Size in bytes, when the uploader reported one
    pub file_size: Option<i64>,
    /// Current lifecycle status
    pub status: RecordingStatus,
    /// Transcription output
    pub transcript: Option<String>,
    /// Analysis summary
    pub ai_summary: Option<String>,
    /// Structured analysis insights (JSON)
    pub ai_insights: Option<serde_json::Value>,
    /// Structured coaching evaluation (JSON)
    pub coaching_evaluation: Option<serde_json::Value>,
    /// Upstream error detail, set on failure states and recovery annotations
    pub error_message: Option<String>,
    /// Operational annotations (stage timings, sweep notes)
    pub processing_notes: Option<String>,
    /// 0-100, non-decreasing within one processing attempt
    pub processing_progress: i64,
    /// Row creation time
    pub created_at: DateTime<Utc>,
    /// Last write time, refreshed on every update
    pub updated_at: DateTime<Utc>,
}

impl Recording {
    /// Create a new pending recording for a completed upload
    pub fn new(title: String, file_url: String, file_size: Option<i64>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title,
            file_url,
            file_size,
            status: RecordingStatus::Pending,
            transcript: None,
            ai_summary: None,
            ai_insights: None,
            coaching_evaluation: None,
            error_message: None,
            processing_notes: None,
            processing_progress: PROGRESS_QUEUED,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether both pipeline outputs are present
    pub fn has_complete_results(&self) -> bool {
        self.transcript.is_some() && self.ai_summary.is_some()
    }

    /// Age of the recording relative to `now`, in whole minutes
    pub fn age_minutes(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_minutes()
    }
}
