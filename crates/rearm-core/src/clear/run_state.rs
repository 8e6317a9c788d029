//! Run-state aggregator.
//!
//! Settles the state of each run implicated by a clear batch. Every run is
//! judged on the state it had before the batch began, independently of the
//! other runs in the batch.

use chrono::{DateTime, Utc};
use rearm_types::run::{RunId, RunState, WorkflowRun};

/// What a clear does to the runs it touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunStatePolicy {
    /// Re-queue runs that had finished; leave running/queued runs alone.
    #[default]
    Auto,
    /// Force every implicated run into this state.
    Set(RunState),
    /// Do not modify runs at all.
    Leave,
}

/// A state change applied to a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunTransition {
    pub run_id: RunId,
    pub from: RunState,
    pub to: RunState,
}

/// Put `run` back in the queue: no start, no end, no scheduling decision.
pub fn requeue(run: &mut WorkflowRun, now: DateTime<Utc>) {
    run.state = RunState::Queued;
    run.start_date = None;
    run.end_date = None;
    run.last_scheduling_decision = None;
    run.queued_at = Some(now);
    run.clear_number = run.clear_number.saturating_add(1);
}

/// Apply `policy` to `run`, whose state before the batch was `prior`.
///
/// Returns the transition when the run was modified and must be written
/// back; `None` means the run is untouched.
pub fn settle_run(
    run: &mut WorkflowRun,
    prior: RunState,
    policy: RunStatePolicy,
    now: DateTime<Utc>,
) -> Option<RunTransition> {
    let target = match policy {
        RunStatePolicy::Leave => return None,
        RunStatePolicy::Auto if prior.is_terminal() => RunState::Queued,
        RunStatePolicy::Auto => return None,
        RunStatePolicy::Set(state) => state,
    };

    if target == RunState::Queued {
        requeue(run, now);
    } else {
        run.state = target;
    }

    Some(RunTransition {
        run_id: run.id,
        from: prior,
        to: target,
    })
}
