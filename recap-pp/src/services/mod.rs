//! Pipeline services
//!
//! The four core components (router, processing client, recovery scanner,
//! queue monitor), the provider client seams, and the scheduler they run
//! under.

pub mod analysis_client;
pub mod processing;
pub mod queue_monitor;
pub mod recovery;
pub mod scheduler;
pub mod size_router;
pub mod transcription_client;

pub use analysis_client::{AnalysisRequest, AnalysisResult, Analyzer, HttpAnalysisClient};
pub use processing::{ProcessOutcome, ProcessingClient};
pub use queue_monitor::{aggregate, QueueMonitor, QueueStats};
pub use recovery::{RecoveryOutcome, RecoveryScanner, SweepAction, SweepReport};
pub use size_router::{attempt_chain, ProcessingStrategy, RoutePlan, SizeRouter};
pub use transcription_client::{HttpTranscriptionClient, Transcriber, TranscriptionRequest};
