//! Workflow definition repository trait.
//!
//! Serialized workflow definitions keyed by workflow id. The clear engine
//! looks a definition up whenever a task instance belongs to a workflow other
//! than the one the caller supplied.

use rearm_types::definition::WorkflowDefinition;
use rearm_types::error::RepositoryError;

pub trait DefinitionRepository: Send + Sync {
    /// Upsert a definition (insert or replace by workflow id).
    fn save_definition(
        &self,
        def: &WorkflowDefinition,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get the definition of `workflow_id`, if one has been stored.
    fn get_definition(
        &self,
        workflow_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<WorkflowDefinition>, RepositoryError>> + Send;

    /// Delete a definition. Returns `true` if it existed.
    fn delete_definition(
        &self,
        workflow_id: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}
