//! Transactional storage interface used by the clear engine.
//!
//! A clear batch touches three coupled records -- task instances, their
//! attempt records and reschedule markers, and the owning runs -- and every
//! write must land in one transaction. `ClearStore` opens that transaction;
//! `ClearTransaction` is the unit-of-work handle the engine writes through.
//!
//! Dropping a transaction without calling [`ClearTransaction::commit`] rolls
//! it back. Implementations must re-read rows through the transaction so
//! concurrent writers cannot cause lost updates on `try_number`/`max_tries`.

use rearm_types::error::RepositoryError;
use rearm_types::history::AttemptRecord;
use rearm_types::run::{RunId, WorkflowRun};
use rearm_types::task::{TaskInstance, TaskInstanceKey};
use uuid::Uuid;

/// Factory for clear transactions.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait ClearStore: Send + Sync {
    type Transaction: ClearTransaction;

    /// Open a new transaction.
    fn begin(
        &self,
    ) -> impl std::future::Future<Output = Result<Self::Transaction, RepositoryError>> + Send;
}

/// Reads and writes performed inside one clear transaction.
pub trait ClearTransaction: Send {
    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Load a run. `None` if it no longer exists.
    fn get_run(
        &mut self,
        run_id: &RunId,
    ) -> impl std::future::Future<Output = Result<Option<WorkflowRun>, RepositoryError>> + Send;

    /// Load a task instance by its composite key.
    fn get_task_instance(
        &mut self,
        key: &TaskInstanceKey,
    ) -> impl std::future::Future<Output = Result<Option<TaskInstance>, RepositoryError>> + Send;

    /// All task instances of a run, ordered by task id then map index.
    fn list_task_instances(
        &mut self,
        run_id: &RunId,
    ) -> impl std::future::Future<Output = Result<Vec<TaskInstance>, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Append one attempt record.
    fn insert_attempt_record(
        &mut self,
        record: &AttemptRecord,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Persist the mutable fields of a task instance.
    fn update_task_instance(
        &mut self,
        ti: &TaskInstance,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete every reschedule marker of a task instance, across all tries.
    /// Returns the number of markers removed.
    fn delete_reschedule_markers(
        &mut self,
        task_instance_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Persist the mutable fields of a run.
    fn update_run(
        &mut self,
        run: &WorkflowRun,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Commit every write made through this transaction.
    fn commit(self) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send
    where
        Self: Sized;
}
