//! Workflow definition types.
//!
//! Only the part of a workflow definition the clear engine consults: which
//! tasks exist and how many retries each is configured with. Definitions are
//! persisted as JSON blobs keyed by `workflow_id`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-task configuration relevant to retry accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    /// Retries granted on top of the current try when the task is cleared.
    #[serde(default)]
    pub retries: u32,
}

/// The serialized shape of a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub workflow_id: String,
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskDefinition>,
}

impl WorkflowDefinition {
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            tasks: BTreeMap::new(),
        }
    }

    /// Builder-style helper to add a task with `retries`.
    pub fn with_task(mut self, task_id: impl Into<String>, retries: u32) -> Self {
        self.tasks.insert(task_id.into(), TaskDefinition { retries });
        self
    }

    pub fn has_task(&self, task_id: &str) -> bool {
        self.tasks.contains_key(task_id)
    }

    /// Configured retries for `task_id`, or `None` if the task is not part of
    /// this definition (e.g. removed since the run started).
    pub fn task_retries(&self, task_id: &str) -> Option<u32> {
        self.tasks.get(task_id).map(|t| t.retries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_lookup() {
        let def = WorkflowDefinition::new("etl")
            .with_task("extract", 0)
            .with_task("load", 2);

        assert!(def.has_task("extract"));
        assert!(!def.has_task("transform"));
        assert_eq!(def.task_retries("load"), Some(2));
        assert_eq!(def.task_retries("transform"), None);
    }

    #[test]
    fn test_definition_json_defaults() {
        let def: WorkflowDefinition =
            serde_json::from_str(r#"{"workflow_id":"etl","tasks":{"load":{}}}"#).unwrap();
        assert_eq!(def.task_retries("load"), Some(0));

        let empty: WorkflowDefinition = serde_json::from_str(r#"{"workflow_id":"etl"}"#).unwrap();
        assert!(empty.tasks.is_empty());
    }
}
