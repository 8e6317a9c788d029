//! Workflow run types.
//!
//! A `WorkflowRun` is the aggregate root owning a set of task instances.
//! Clearing task instances may push a finished run back to `Queued`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Unique identifier for a workflow run, wrapping a UUID v7 (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Create a new RunId using UUID v7.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create a RunId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Lifecycle state of a workflow run.
///
/// - Queued: created or re-armed, waiting for the scheduler to start it
/// - Running: the scheduler is making decisions for it
/// - Success / Failed: finished; no further scheduling without re-queuing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Queued,
    Running,
    Success,
    Failed,
}

impl RunState {
    /// Whether the run has finished (success or failed).
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Success | RunState::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Queued => write!(f, "queued"),
            RunState::Running => write!(f, "running"),
            RunState::Success => write!(f, "success"),
            RunState::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for RunState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "queued" => Ok(RunState::Queued),
            "running" => Ok(RunState::Running),
            "success" => Ok(RunState::Success),
            "failed" => Ok(RunState::Failed),
            other => Err(format!("invalid run state: '{other}'")),
        }
    }
}

/// One execution of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: RunId,
    /// Workflow this run executes.
    pub workflow_id: String,
    pub state: RunState,
    /// When the run was (last) put into the queue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queued_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    /// Last time the scheduler evaluated this run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_scheduling_decision: Option<DateTime<Utc>>,
    /// How many times a clear has re-queued this run.
    #[serde(default)]
    pub clear_number: u32,
}

impl WorkflowRun {
    /// A freshly queued run for `workflow_id`.
    pub fn queued(workflow_id: impl Into<String>) -> Self {
        Self {
            id: RunId::new(),
            workflow_id: workflow_id.into(),
            state: RunState::Queued,
            queued_at: Some(Utc::now()),
            start_date: None,
            end_date: None,
            last_scheduling_decision: None,
            clear_number: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(RunState::Success.is_terminal());
        assert!(RunState::Failed.is_terminal());
        assert!(!RunState::Queued.is_terminal());
        assert!(!RunState::Running.is_terminal());
    }

    #[test]
    fn test_run_state_display_from_str() {
        for state in [
            RunState::Queued,
            RunState::Running,
            RunState::Success,
            RunState::Failed,
        ] {
            let parsed: RunState = state.to_string().parse().unwrap();
            assert_eq!(parsed, state);
        }
        assert!("paused".parse::<RunState>().is_err());
    }

    #[test]
    fn test_run_state_serde_matches_display() {
        let json = serde_json::to_string(&RunState::Success).unwrap();
        assert_eq!(json, "\"success\"");
    }

    #[test]
    fn test_run_id_parse() {
        let id = RunId::new();
        let parsed: RunId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_queued_run_defaults() {
        let run = WorkflowRun::queued("etl");
        assert_eq!(run.state, RunState::Queued);
        assert!(run.queued_at.is_some());
        assert!(run.start_date.is_none());
        assert_eq!(run.clear_number, 0);
    }
}
