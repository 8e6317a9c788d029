//! In-memory `ClearStore` and `DefinitionRepository` for tests.
//!
//! A transaction works on a private copy of the committed state and swaps it
//! in on commit, so dropped transactions leave no trace.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use rearm_types::definition::WorkflowDefinition;
use rearm_types::error::RepositoryError;
use rearm_types::history::AttemptRecord;
use rearm_types::reschedule::RescheduleMarker;
use rearm_types::run::{RunId, WorkflowRun};
use rearm_types::task::{TaskInstance, TaskInstanceKey};
use uuid::Uuid;

use crate::repository::clear::{ClearStore, ClearTransaction};
use crate::repository::definition::DefinitionRepository;

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub runs: HashMap<RunId, WorkflowRun>,
    pub task_instances: BTreeMap<TaskInstanceKey, TaskInstance>,
    pub attempts: Vec<AttemptRecord>,
    pub markers: Vec<RescheduleMarker>,
}

impl MemoryState {
    pub fn attempts_for(&self, task_instance_id: &Uuid) -> Vec<&AttemptRecord> {
        self.attempts
            .iter()
            .filter(|a| &a.task_instance_id == task_instance_id)
            .collect()
    }

    pub fn markers_for(&self, task_instance_id: &Uuid) -> usize {
        self.markers
            .iter()
            .filter(|m| &m.task_instance_id == task_instance_id)
            .count()
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_run_updates: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose transactions fail every `update_run` with a conflict.
    pub fn failing_run_updates(self) -> Self {
        Self {
            fail_run_updates: true,
            ..self
        }
    }

    pub fn insert_run(&self, run: WorkflowRun) {
        self.state.lock().unwrap().runs.insert(run.id, run);
    }

    pub fn insert_task_instance(&self, ti: TaskInstance) {
        self.state
            .lock()
            .unwrap()
            .task_instances
            .insert(ti.key(), ti);
    }

    pub fn insert_marker(&self, marker: RescheduleMarker) {
        self.state.lock().unwrap().markers.push(marker);
    }

    /// Snapshot of the committed state.
    pub fn snapshot(&self) -> MemoryState {
        self.state.lock().unwrap().clone()
    }

    pub fn task_instance(&self, key: &TaskInstanceKey) -> TaskInstance {
        self.snapshot().task_instances[key].clone()
    }

    pub fn run(&self, run_id: &RunId) -> WorkflowRun {
        self.snapshot().runs[run_id].clone()
    }
}

pub struct MemoryTransaction {
    committed: Arc<Mutex<MemoryState>>,
    working: MemoryState,
    fail_run_updates: bool,
}

impl ClearStore for MemoryStore {
    type Transaction = MemoryTransaction;

    async fn begin(&self) -> Result<MemoryTransaction, RepositoryError> {
        let working = self
            .state
            .lock()
            .map_err(|_| RepositoryError::Connection)?
            .clone();
        Ok(MemoryTransaction {
            committed: Arc::clone(&self.state),
            working,
            fail_run_updates: self.fail_run_updates,
        })
    }
}

impl ClearTransaction for MemoryTransaction {
    async fn get_run(&mut self, run_id: &RunId) -> Result<Option<WorkflowRun>, RepositoryError> {
        Ok(self.working.runs.get(run_id).cloned())
    }

    async fn get_task_instance(
        &mut self,
        key: &TaskInstanceKey,
    ) -> Result<Option<TaskInstance>, RepositoryError> {
        Ok(self.working.task_instances.get(key).cloned())
    }

    async fn list_task_instances(
        &mut self,
        run_id: &RunId,
    ) -> Result<Vec<TaskInstance>, RepositoryError> {
        Ok(self
            .working
            .task_instances
            .values()
            .filter(|ti| &ti.run_id == run_id)
            .cloned()
            .collect())
    }

    async fn insert_attempt_record(&mut self, record: &AttemptRecord) -> Result<(), RepositoryError> {
        self.working.attempts.push(record.clone());
        Ok(())
    }

    async fn update_task_instance(&mut self, ti: &TaskInstance) -> Result<(), RepositoryError> {
        match self.working.task_instances.get_mut(&ti.key()) {
            Some(existing) => {
                *existing = ti.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn delete_reschedule_markers(
        &mut self,
        task_instance_id: &Uuid,
    ) -> Result<u64, RepositoryError> {
        let before = self.working.markers.len();
        self.working
            .markers
            .retain(|m| &m.task_instance_id != task_instance_id);
        Ok((before - self.working.markers.len()) as u64)
    }

    async fn update_run(&mut self, run: &WorkflowRun) -> Result<(), RepositoryError> {
        if self.fail_run_updates {
            return Err(RepositoryError::Conflict("database is locked".to_string()));
        }
        match self.working.runs.get_mut(&run.id) {
            Some(existing) => {
                *existing = run.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn commit(self) -> Result<(), RepositoryError> {
        let mut committed = self
            .committed
            .lock()
            .map_err(|_| RepositoryError::Connection)?;
        *committed = self.working;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryDefinitions {
    defs: Mutex<HashMap<String, WorkflowDefinition>>,
}

impl MemoryDefinitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, def: WorkflowDefinition) -> Self {
        self.defs
            .lock()
            .unwrap()
            .insert(def.workflow_id.clone(), def);
        self
    }
}

impl DefinitionRepository for MemoryDefinitions {
    async fn save_definition(&self, def: &WorkflowDefinition) -> Result<(), RepositoryError> {
        self.defs
            .lock()
            .map_err(|_| RepositoryError::Connection)?
            .insert(def.workflow_id.clone(), def.clone());
        Ok(())
    }

    async fn get_definition(
        &self,
        workflow_id: &str,
    ) -> Result<Option<WorkflowDefinition>, RepositoryError> {
        Ok(self
            .defs
            .lock()
            .map_err(|_| RepositoryError::Connection)?
            .get(workflow_id)
            .cloned())
    }

    async fn delete_definition(&self, workflow_id: &str) -> Result<bool, RepositoryError> {
        Ok(self
            .defs
            .lock()
            .map_err(|_| RepositoryError::Connection)?
            .remove(workflow_id)
            .is_some())
    }
}
