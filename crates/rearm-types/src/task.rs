//! Task instance types.
//!
//! A task instance is one execution slot of one task within one workflow run,
//! identified by `(run_id, task_id, map_index)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::run::RunId;

/// Map index used by task instances that are not expanded from a mapped task.
pub const UNMAPPED: i32 = -1;

/// State of a task instance. An absent state (`None` in `Option<TaskState>`)
/// means the instance has not been scheduled yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Scheduled,
    Queued,
    Running,
    Success,
    Failed,
    Skipped,
    UpstreamFailed,
    UpForRetry,
    UpForReschedule,
    Deferred,
    Restarting,
    Removed,
}

impl TaskState {
    /// Finished states whose outcome is kept verbatim in the attempt ledger.
    pub fn is_finished(self) -> bool {
        matches!(self, TaskState::Success | TaskState::Failed | TaskState::Skipped)
    }

    /// States selected by an "only failed" clear.
    pub fn is_failure(self) -> bool {
        matches!(self, TaskState::Failed | TaskState::UpstreamFailed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Scheduled => "scheduled",
            TaskState::Queued => "queued",
            TaskState::Running => "running",
            TaskState::Success => "success",
            TaskState::Failed => "failed",
            TaskState::Skipped => "skipped",
            TaskState::UpstreamFailed => "upstream_failed",
            TaskState::UpForRetry => "up_for_retry",
            TaskState::UpForReschedule => "up_for_reschedule",
            TaskState::Deferred => "deferred",
            TaskState::Restarting => "restarting",
            TaskState::Removed => "removed",
        };
        f.write_str(s)
    }
}

impl FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scheduled" => Ok(TaskState::Scheduled),
            "queued" => Ok(TaskState::Queued),
            "running" => Ok(TaskState::Running),
            "success" => Ok(TaskState::Success),
            "failed" => Ok(TaskState::Failed),
            "skipped" => Ok(TaskState::Skipped),
            "upstream_failed" => Ok(TaskState::UpstreamFailed),
            "up_for_retry" => Ok(TaskState::UpForRetry),
            "up_for_reschedule" => Ok(TaskState::UpForReschedule),
            "deferred" => Ok(TaskState::Deferred),
            "restarting" => Ok(TaskState::Restarting),
            "removed" => Ok(TaskState::Removed),
            other => Err(format!("invalid task state: '{other}'")),
        }
    }
}

/// Composite identity of a task instance, unique within a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskInstanceKey {
    pub run_id: RunId,
    pub task_id: String,
    /// Position within a mapped task, or [`UNMAPPED`].
    pub map_index: i32,
}

impl TaskInstanceKey {
    pub fn new(run_id: RunId, task_id: impl Into<String>, map_index: i32) -> Self {
        Self {
            run_id,
            task_id: task_id.into(),
            map_index,
        }
    }

    /// Key of an unmapped task instance.
    pub fn unmapped(run_id: RunId, task_id: impl Into<String>) -> Self {
        Self::new(run_id, task_id, UNMAPPED)
    }
}

impl fmt::Display for TaskInstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.map_index == UNMAPPED {
            write!(f, "{}/{}", self.run_id, self.task_id)
        } else {
            write!(f, "{}/{}[{}]", self.run_id, self.task_id, self.map_index)
        }
    }
}

/// Resume token of a deferred task instance: the method to call on resume
/// and its arguments. Stored and cleared as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeferredContinuation {
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kwargs: Option<serde_json::Value>,
}

/// One scheduled execution slot of one task within one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInstance {
    /// Surrogate row id; reschedule markers and attempt records point at it.
    pub id: Uuid,
    pub run_id: RunId,
    /// Workflow the owning run belongs to (denormalized for definition lookup).
    pub workflow_id: String,
    pub task_id: String,
    pub map_index: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<TaskState>,
    /// Number of attempts started so far. Clearing never decrements it.
    pub try_number: u32,
    /// Retry budget: attempts allowed before the instance is exhausted.
    pub max_tries: u32,
    /// Handle of the executor that ran the last attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_executor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<DeferredContinuation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl TaskInstance {
    /// A never-run task instance with the given retry budget.
    pub fn new(
        run_id: RunId,
        workflow_id: impl Into<String>,
        task_id: impl Into<String>,
        max_tries: u32,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            run_id,
            workflow_id: workflow_id.into(),
            task_id: task_id.into(),
            map_index: UNMAPPED,
            state: None,
            try_number: 0,
            max_tries,
            external_executor_id: None,
            next: None,
            start_date: None,
            end_date: None,
            updated_at: Utc::now(),
        }
    }

    pub fn key(&self) -> TaskInstanceKey {
        TaskInstanceKey::new(self.run_id, self.task_id.clone(), self.map_index)
    }
}
