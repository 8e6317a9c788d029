//! Task instance resetter.
//!
//! Brings a task instance back to a clearable baseline: attempt recorded,
//! retry budget recomputed, state absent, executor handle and deferred
//! continuation dropped. `try_number` is left alone.

use chrono::{DateTime, Utc};
use rearm_types::definition::WorkflowDefinition;
use rearm_types::error::RepositoryError;
use rearm_types::task::TaskInstance;

use super::ledger::record_attempt;
use super::retry::{RetryBudget, retry_budget};
use crate::repository::clear::ClearTransaction;

/// Apply the in-memory part of a reset.
pub fn reset_fields(ti: &mut TaskInstance, max_tries: u32, now: DateTime<Utc>) {
    ti.max_tries = max_tries;
    ti.state = None;
    ti.external_executor_id = None;
    ti.next = None;
    ti.updated_at = now;
}

/// Record, re-budget, reset and persist one task instance.
///
/// The attempt record is written first so it reflects the pre-reset state.
pub async fn reset_task_instance<T: ClearTransaction>(
    tx: &mut T,
    ti: &mut TaskInstance,
    definition: Option<&WorkflowDefinition>,
    now: DateTime<Utc>,
) -> Result<RetryBudget, RepositoryError> {
    record_attempt(tx, ti, now).await?;

    let budget = retry_budget(ti, definition);
    if budget.source.is_fallback() {
        tracing::debug!(
            run_id = %ti.run_id,
            task_id = %ti.task_id,
            workflow_id = %ti.workflow_id,
            source = ?budget.source,
            "no task definition, keeping existing retry budget"
        );
    }

    reset_fields(ti, budget.max_tries, now);
    tx.update_task_instance(ti).await?;

    Ok(budget)
}
