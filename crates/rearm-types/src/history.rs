//! Attempt ledger types.
//!
//! An `AttemptRecord` is an immutable snapshot of a task instance taken just
//! before a clear resets it. One record is written per cleared instance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::run::RunId;
use crate::task::{TaskInstance, TaskState};

/// Historical record of one attempt of a task instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub id: Uuid,
    /// Row id of the task instance this attempt belonged to.
    pub task_instance_id: Uuid,
    pub run_id: RunId,
    pub workflow_id: String,
    pub task_id: String,
    pub map_index: i32,
    pub try_number: u32,
    pub max_tries: u32,
    /// State the instance was in when it was cleared (may be absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_state: Option<TaskState>,
    /// Outcome of the attempt. Unfinished attempts are recorded as failed.
    pub state: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_executor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    pub recorded_at: DateTime<Utc>,
}

impl AttemptRecord {
    /// Snapshot `ti` as it is right now.
    pub fn snapshot(ti: &TaskInstance, recorded_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            task_instance_id: ti.id,
            run_id: ti.run_id,
            workflow_id: ti.workflow_id.clone(),
            task_id: ti.task_id.clone(),
            map_index: ti.map_index,
            try_number: ti.try_number,
            max_tries: ti.max_tries,
            observed_state: ti.state,
            state: recorded_outcome(ti.state),
            external_executor_id: ti.external_executor_id.clone(),
            start_date: ti.start_date,
            end_date: ti.end_date,
            recorded_at,
        }
    }
}

/// Outcome stored for an attempt that was in `state` when cleared.
///
/// Success, failed and skipped are kept. Anything else was interrupted by
/// the clear and counts as a failed attempt.
pub fn recorded_outcome(state: Option<TaskState>) -> TaskState {
    match state {
        Some(s) if s.is_finished() => s,
        _ => TaskState::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finished_states_recorded_verbatim() {
        assert_eq!(recorded_outcome(Some(TaskState::Success)), TaskState::Success);
        assert_eq!(recorded_outcome(Some(TaskState::Failed)), TaskState::Failed);
        assert_eq!(recorded_outcome(Some(TaskState::Skipped)), TaskState::Skipped);
    }

    #[test]
    fn test_unfinished_states_recorded_as_failed() {
        for state in [
            Some(TaskState::UpForRetry),
            Some(TaskState::UpForReschedule),
            Some(TaskState::Running),
            Some(TaskState::Queued),
            Some(TaskState::Scheduled),
            Some(TaskState::Restarting),
            Some(TaskState::Deferred),
            None,
        ] {
            assert_eq!(recorded_outcome(state), TaskState::Failed, "{state:?}");
        }
    }

    #[test]
    fn test_snapshot_copies_attempt_fields() {
        let mut ti = TaskInstance::new(RunId::new(), "etl", "load", 3);
        ti.try_number = 2;
        ti.state = Some(TaskState::Running);
        ti.external_executor_id = Some("celery-42".to_string());

        let now = Utc::now();
        let record = AttemptRecord::snapshot(&ti, now);

        assert_eq!(record.task_instance_id, ti.id);
        assert_eq!(record.try_number, 2);
        assert_eq!(record.max_tries, 3);
        assert_eq!(record.observed_state, Some(TaskState::Running));
        assert_eq!(record.state, TaskState::Failed);
        assert_eq!(record.external_executor_id.as_deref(), Some("celery-42"));
        assert_eq!(record.recorded_at, now);
    }
}
