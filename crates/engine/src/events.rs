//! Engine events broadcast over a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` by every orchestrator. The UI
//! layer subscribes to render per-column and per-job state changes; the
//! `JobSucceeded` event is the user-facing success signal.

use serde::Serialize;
use studio_core::types::DbId;
use tokio::sync::broadcast;

/// A lifecycle change inside the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StudioEvent {
    /// A column began streaming.
    ColumnStarted {
        project_id: DbId,
        column_id: DbId,
        model_id: String,
    },

    /// A column's stream completed normally.
    ColumnFinished { project_id: DbId, column_id: DbId },

    /// A column's stream ended with an error.
    ColumnFailed {
        project_id: DbId,
        column_id: DbId,
        error: String,
    },

    /// A column's stream was cancelled locally.
    ColumnCancelled { project_id: DbId, column_id: DbId },

    /// A job (or a regeneration round) was acknowledged by the remote side.
    JobSubmitted {
        project_id: DbId,
        job_id: DbId,
        round: u32,
        task_count: usize,
    },

    /// New results arrived for a job that is still processing.
    JobProgress {
        project_id: DbId,
        job_id: DbId,
        result_count: usize,
    },

    /// A job finished successfully.
    JobSucceeded {
        project_id: DbId,
        job_id: DbId,
        result_urls: Vec<String>,
    },

    /// A job failed on the remote side. Results seen so far are kept.
    JobFailed {
        project_id: DbId,
        job_id: DbId,
        error: String,
        result_count: usize,
    },

    /// Polling stopped because the status endpoint was unreachable. The
    /// job keeps its last known state.
    PollingStopped {
        project_id: DbId,
        job_id: DbId,
        error: String,
    },
}

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out of [`StudioEvent`]s.
pub struct EventBus {
    sender: broadcast::Sender<StudioEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// Slow receivers observe `RecvError::Lagged` once the buffer is full.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: StudioEvent) {
        // A send error only means there are no receivers right now.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StudioEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
