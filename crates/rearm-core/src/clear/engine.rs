//! Clear engine.
//!
//! Sequences the ledger writer, retry accountant, resetter, dependent
//! cleanup and run-state aggregator for one batch, inside a transaction owned
//! by the caller. The engine never commits; a returned error means the
//! caller must drop the transaction and retry the whole batch.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use rearm_types::definition::WorkflowDefinition;
use rearm_types::error::RepositoryError;
use rearm_types::run::RunId;
use rearm_types::task::TaskInstanceKey;

use super::dependents::remove_dependents;
use super::reset::reset_task_instance;
use super::retry::BudgetSource;
use super::run_state::{RunStatePolicy, RunTransition, settle_run};
use crate::repository::clear::ClearTransaction;
use crate::repository::definition::DefinitionRepository;

/// Why a key in the batch was not cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The owning run no longer exists.
    RunMissing,
    /// The task instance no longer exists.
    TaskInstanceMissing,
}

/// A task instance that was reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearedTask {
    pub key: TaskInstanceKey,
    pub try_number: u32,
    pub max_tries: u32,
    pub budget_source: BudgetSource,
}

/// Outcome of one clear batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearReport {
    /// Cleared instances in batch order. One attempt record was written for each.
    pub cleared: Vec<ClearedTask>,
    pub skipped: Vec<(TaskInstanceKey, SkipReason)>,
    pub run_transitions: Vec<RunTransition>,
    pub markers_removed: u64,
}

impl ClearReport {
    pub fn is_empty(&self) -> bool {
        self.cleared.is_empty()
    }
}

/// Clears task instances through a [`ClearTransaction`].
///
/// Generic over `D: DefinitionRepository`, used to resolve definitions of
/// workflows other than the one the caller supplied.
pub struct ClearEngine<D: DefinitionRepository> {
    definitions: D,
}

impl<D: DefinitionRepository> ClearEngine<D> {
    pub fn new(definitions: D) -> Self {
        Self { definitions }
    }

    pub fn definitions(&self) -> &D {
        &self.definitions
    }

    /// Clear `keys` inside `tx`.
    ///
    /// - Duplicate keys are cleared once, in first-seen order.
    /// - Keys whose run or task instance no longer exists are skipped.
    /// - `definition` is used for instances of its workflow; other workflows
    ///   are looked up through the definition repository.
    /// - Each run with at least one cleared instance is settled under `policy`.
    pub async fn clear<T: ClearTransaction>(
        &self,
        tx: &mut T,
        keys: &[TaskInstanceKey],
        definition: Option<&WorkflowDefinition>,
        policy: RunStatePolicy,
    ) -> Result<ClearReport, RepositoryError> {
        let now = Utc::now();
        let mut report = ClearReport::default();
        let mut definitions = DefinitionCache::new(definition);

        for (run_id, run_keys) in group_by_run(keys) {
            let Some(mut run) = tx.get_run(&run_id).await? else {
                tracing::debug!(run_id = %run_id, keys = run_keys.len(), "run not found, skipping");
                report
                    .skipped
                    .extend(run_keys.into_iter().map(|k| (k, SkipReason::RunMissing)));
                continue;
            };
            let prior_state = run.state;
            let mut cleared_in_run = 0usize;

            for key in run_keys {
                let Some(mut ti) = tx.get_task_instance(&key).await? else {
                    tracing::debug!(key = %key, "task instance not found, skipping");
                    report.skipped.push((key, SkipReason::TaskInstanceMissing));
                    continue;
                };

                let def = definitions.resolve(&self.definitions, &ti.workflow_id).await?;
                let budget = reset_task_instance(tx, &mut ti, def, now).await?;
                report.markers_removed += remove_dependents(tx, &ti).await?;

                report.cleared.push(ClearedTask {
                    key,
                    try_number: ti.try_number,
                    max_tries: budget.max_tries,
                    budget_source: budget.source,
                });
                cleared_in_run += 1;
            }

            if cleared_in_run == 0 {
                continue;
            }

            if let Some(transition) = settle_run(&mut run, prior_state, policy, now) {
                tx.update_run(&run).await?;
                tracing::info!(
                    run_id = %run_id,
                    from = %transition.from,
                    to = %transition.to,
                    "run state changed by clear"
                );
                report.run_transitions.push(transition);
            }
        }

        tracing::info!(
            cleared = report.cleared.len(),
            skipped = report.skipped.len(),
            runs_changed = report.run_transitions.len(),
            markers_removed = report.markers_removed,
            "clear batch applied"
        );

        Ok(report)
    }
}

/// Deduplicate `keys` and group them by run, both in first-seen order.
fn group_by_run(keys: &[TaskInstanceKey]) -> Vec<(RunId, Vec<TaskInstanceKey>)> {
    let mut seen = HashSet::new();
    let mut slots: HashMap<RunId, usize> = HashMap::new();
    let mut groups: Vec<(RunId, Vec<TaskInstanceKey>)> = Vec::new();

    for key in keys {
        if !seen.insert(key) {
            continue;
        }
        let slot = *slots.entry(key.run_id).or_insert_with(|| {
            groups.push((key.run_id, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(key.clone());
    }

    groups
}

/// Per-batch cache of resolved definitions, keyed by workflow id.
struct DefinitionCache {
    resolved: HashMap<String, Option<WorkflowDefinition>>,
}

impl DefinitionCache {
    fn new(supplied: Option<&WorkflowDefinition>) -> Self {
        let mut resolved = HashMap::new();
        if let Some(def) = supplied {
            resolved.insert(def.workflow_id.clone(), Some(def.clone()));
        }
        Self { resolved }
    }

    async fn resolve<D: DefinitionRepository>(
        &mut self,
        repo: &D,
        workflow_id: &str,
    ) -> Result<Option<&WorkflowDefinition>, RepositoryError> {
        if !self.resolved.contains_key(workflow_id) {
            let found = repo.get_definition(workflow_id).await?;
            if found.is_none() {
                tracing::debug!(workflow_id, "no stored definition for workflow");
            }
            self.resolved.insert(workflow_id.to_string(), found);
        }
        Ok(self.resolved.get(workflow_id).and_then(Option::as_ref))
    }
}
