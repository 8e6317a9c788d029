//! Event types published by the clear event recorder.
//!
//! `ClearEvent` is broadcast after a clear batch has committed. All variants
//! are Clone + Send + Sync for use with tokio broadcast channels.

use serde::{Deserialize, Serialize};

use crate::run::{RunId, RunState};
use crate::task::TaskInstanceKey;

/// Events emitted around a clear batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClearEvent {
    /// A batch is about to be cleared.
    ClearRequested { keys: Vec<TaskInstanceKey> },

    /// A task instance was reset and its attempt recorded.
    TaskCleared {
        key: TaskInstanceKey,
        try_number: u32,
        max_tries: u32,
    },

    /// A run changed state because of the clear.
    RunStateChanged {
        run_id: RunId,
        from: RunState,
        to: RunState,
    },

    /// The batch committed.
    BatchCommitted {
        cleared: usize,
        skipped: usize,
        markers_removed: u64,
    },
}
