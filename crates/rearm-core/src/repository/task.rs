//! Task repository trait definition.
//!
//! Non-transactional access to runs, task instances, attempt records and
//! reschedule markers. Used by the scheduling layer to create records and by
//! callers that inspect the outcome of a clear.

use rearm_types::error::RepositoryError;
use rearm_types::history::AttemptRecord;
use rearm_types::reschedule::RescheduleMarker;
use rearm_types::run::{RunId, WorkflowRun};
use rearm_types::task::{TaskInstance, TaskInstanceKey};
use uuid::Uuid;

pub trait TaskRepository: Send + Sync {
    // -----------------------------------------------------------------------
    // Runs
    // -----------------------------------------------------------------------

    fn create_run(
        &self,
        run: &WorkflowRun,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_run(
        &self,
        run_id: &RunId,
    ) -> impl std::future::Future<Output = Result<Option<WorkflowRun>, RepositoryError>> + Send;

    /// Delete a run together with its task instances (cascade).
    /// Returns `true` if it existed.
    fn delete_run(
        &self,
        run_id: &RunId,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Task instances
    // -----------------------------------------------------------------------

    fn create_task_instance(
        &self,
        ti: &TaskInstance,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn get_task_instance(
        &self,
        key: &TaskInstanceKey,
    ) -> impl std::future::Future<Output = Result<Option<TaskInstance>, RepositoryError>> + Send;

    /// Overwrite the mutable fields of a task instance (scheduler-side writes).
    fn save_task_instance(
        &self,
        ti: &TaskInstance,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Attempt records and reschedule markers
    // -----------------------------------------------------------------------

    /// Attempt records of a task instance, oldest first.
    fn list_attempt_records(
        &self,
        task_instance_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<AttemptRecord>, RepositoryError>> + Send;

    fn create_reschedule_marker(
        &self,
        marker: &RescheduleMarker,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn count_reschedule_markers(
        &self,
        task_instance_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
