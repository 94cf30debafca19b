//! Data models for the processing pipeline

pub mod job;
pub mod recording;

pub use job::{JobStatus, ProcessingJob};
pub use recording::{Recording, RecordingStatus};
pub use recording::{
    PROGRESS_ANALYZING, PROGRESS_COMPLETE, PROGRESS_QUEUED, PROGRESS_TRANSCRIBED,
    PROGRESS_TRANSCRIBING,
};
