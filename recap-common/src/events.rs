//! Event types for the RECAP event system
//!
//! Provides shared event definitions and the EventBus used to broadcast
//! pipeline activity to SSE clients and background observers.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// RECAP event types
///
/// Events are broadcast via EventBus and can be serialized for SSE
/// transmission. All events use this central enum for type safety and
/// exhaustive matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RecapEvent {
    /// A recording moved to a new status
    ///
    /// Triggers:
    /// - SSE: update recording status displays
    RecordingStatusChanged {
        /// Recording UUID
        recording_id: Uuid,
        /// Status before the transition
        old_status: String,
        /// Status after the transition
        new_status: String,
        /// When the transition was written
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A processing stage finished for a recording
    ///
    /// Triggers:
    /// - SSE: update per-recording progress
    /// - Observability: stage latency tracking
    ProcessingStageCompleted {
        /// Recording UUID
        recording_id: Uuid,
        /// Stage name ("transcription", "analysis")
        stage: String,
        /// Wall-clock time the stage took
        elapsed_ms: u64,
        /// When the stage completed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Queue statistics were resampled
    ///
    /// Emitted by the periodic sampler and by manual refresh.
    ///
    /// Triggers:
    /// - SSE: update queue health display
    QueueStatsUpdated {
        /// Jobs waiting for dispatch
        pending: u64,
        /// Jobs currently running
        processing: u64,
        /// Jobs finished successfully
        completed: u64,
        /// Jobs failed or cancelled
        failed: u64,
        /// completed / total * 100 over the sample
        success_rate: f64,
        /// When the sample was taken
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A recovery sweep finished
    ///
    /// Triggers:
    /// - SSE: surface repaired/failed counts
    RecoverySweepCompleted {
        /// Candidates examined
        scanned: usize,
        /// Recordings restored from partial results
        repaired: usize,
        /// Recordings failed as stale
        timed_out: usize,
        /// Candidates left untouched (too young)
        untouched: usize,
        /// Candidates whose handling errored
        errors: usize,
        /// When the sweep finished
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl RecapEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            RecapEvent::RecordingStatusChanged { .. } => "RecordingStatusChanged",
            RecapEvent::ProcessingStageCompleted { .. } => "ProcessingStageCompleted",
            RecapEvent::QueueStatsUpdated { .. } => "QueueStatsUpdated",
            RecapEvent::RecoverySweepCompleted { .. } => "RecoverySweepCompleted",
        }
    }
}

/// Central event distribution bus for application-wide events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RecapEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<RecapEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: RecapEvent,
    ) -> std::result::Result<usize, broadcast::error::SendError<RecapEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Useful for non-critical events where it's acceptable if no component
    /// is currently listening.
    pub fn emit_lossy(&self, event: RecapEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
