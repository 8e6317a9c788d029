//! Clear service.
//!
//! Owns the transaction boundary around the clear engine: opens a
//! transaction, runs the batch, commits. Any error drops the transaction,
//! which rolls the whole batch back; retrying is up to the caller.

use std::collections::HashSet;

use rearm_types::config::ClearConfig;
use rearm_types::definition::WorkflowDefinition;
use rearm_types::error::ClearError;
use rearm_types::run::RunId;
use rearm_types::task::{TaskInstance, TaskInstanceKey};

use super::engine::{ClearEngine, ClearReport};
use super::observer::{ClearObserver, ObserverChain};
use super::run_state::RunStatePolicy;
use crate::repository::clear::{ClearStore, ClearTransaction};
use crate::repository::definition::DefinitionRepository;

/// Selection and behavior of a whole-run clear.
#[derive(Debug, Clone, Default)]
pub struct ClearOptions {
    /// Select only `failed` and `upstream_failed` instances.
    pub only_failed: bool,
    /// Return the selection without writing anything.
    pub dry_run: bool,
    /// Restrict the selection to these task ids.
    pub task_ids: Option<Vec<String>>,
    pub run_state: RunStatePolicy,
}

impl ClearOptions {
    fn selects(&self, ti: &TaskInstance) -> bool {
        if self.only_failed && !ti.state.is_some_and(|s| s.is_failure()) {
            return false;
        }
        match &self.task_ids {
            Some(ids) => ids.iter().any(|id| id == &ti.task_id),
            None => true,
        }
    }
}

/// Result of [`ClearService::clear_runs`].
#[derive(Debug, Clone, PartialEq)]
pub enum ClearOutcome {
    /// Instances that would have been cleared.
    DryRun(Vec<TaskInstance>),
    Cleared(ClearReport),
}

/// Service running clear batches against a [`ClearStore`].
///
/// Generic over the store and the definition repository so rearm-core
/// never depends on rearm-infra.
pub struct ClearService<S: ClearStore, D: DefinitionRepository> {
    store: S,
    engine: ClearEngine<D>,
    observers: ObserverChain,
    max_batch_size: usize,
}

impl<S: ClearStore, D: DefinitionRepository> ClearService<S, D> {
    pub fn new(store: S, definitions: D, observers: ObserverChain, config: &ClearConfig) -> Self {
        Self {
            store,
            engine: ClearEngine::new(definitions),
            observers,
            max_batch_size: config.max_batch_size,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn definitions(&self) -> &D {
        self.engine.definitions()
    }

    /// Clear the given task instances in one transaction.
    ///
    /// `definition` is the caller's view of the workflow the keys belong to;
    /// instances of other workflows are resolved from the definition
    /// repository. Observers are notified before the engine runs and after
    /// the transaction commits. The batch limit counts distinct keys.
    pub async fn clear_task_instances(
        &self,
        keys: &[TaskInstanceKey],
        definition: Option<&WorkflowDefinition>,
        policy: RunStatePolicy,
    ) -> Result<ClearReport, ClearError> {
        let distinct: HashSet<&TaskInstanceKey> = keys.iter().collect();
        self.check_batch_size(distinct.len())?;

        let tx = self.store.begin().await?;
        self.run_batch(tx, keys, definition, policy).await
    }

    /// Clear the task instances of whole runs.
    ///
    /// Selection and clearing share one transaction, so a concurrent writer
    /// cannot slip instances in between. With `dry_run` the transaction is
    /// rolled back and the selection returned.
    pub async fn clear_runs(
        &self,
        run_ids: &[RunId],
        definition: Option<&WorkflowDefinition>,
        options: &ClearOptions,
    ) -> Result<ClearOutcome, ClearError> {
        let mut tx = self.store.begin().await?;

        let mut selected = Vec::new();
        for run_id in run_ids {
            let instances = tx.list_task_instances(run_id).await?;
            selected.extend(instances.into_iter().filter(|ti| options.selects(ti)));
        }

        tracing::debug!(
            runs = run_ids.len(),
            selected = selected.len(),
            only_failed = options.only_failed,
            dry_run = options.dry_run,
            "selected task instances to clear"
        );

        if options.dry_run {
            return Ok(ClearOutcome::DryRun(selected));
        }

        self.check_batch_size(selected.len())?;
        let keys: Vec<TaskInstanceKey> = selected.iter().map(TaskInstance::key).collect();
        let report = self.run_batch(tx, &keys, definition, options.run_state).await?;
        Ok(ClearOutcome::Cleared(report))
    }

    async fn run_batch(
        &self,
        mut tx: S::Transaction,
        keys: &[TaskInstanceKey],
        definition: Option<&WorkflowDefinition>,
        policy: RunStatePolicy,
    ) -> Result<ClearReport, ClearError> {
        self.observers.before_clear(keys);

        let report = match self.engine.clear(&mut tx, keys, definition, policy).await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(error = %e, keys = keys.len(), "clear batch rolled back");
                return Err(e.into());
            }
        };
        if let Err(e) = tx.commit().await {
            tracing::warn!(error = %e, keys = keys.len(), "clear batch failed to commit");
            return Err(e.into());
        }

        self.observers.after_clear(&report);
        Ok(report)
    }

    fn check_batch_size(&self, size: usize) -> Result<(), ClearError> {
        if self.max_batch_size > 0 && size > self.max_batch_size {
            tracing::warn!(size, max = self.max_batch_size, "clear batch rejected");
            return Err(ClearError::BatchTooLarge {
                size,
                max: self.max_batch_size,
            });
        }
        Ok(())
    }
}
