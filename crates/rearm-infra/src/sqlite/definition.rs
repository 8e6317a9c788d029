//! SQLite workflow definition repository.
//!
//! Definitions are stored as JSON blobs keyed by workflow id.

use chrono::Utc;
use rearm_core::repository::definition::DefinitionRepository;
use rearm_types::definition::WorkflowDefinition;
use rearm_types::error::RepositoryError;
use sqlx::Row;

use super::pool::DatabasePool;
use super::rows::{format_datetime, map_write_error};

/// SQLite-backed implementation of `DefinitionRepository`.
#[derive(Clone)]
pub struct SqliteDefinitionRepository {
    pool: DatabasePool,
}

impl SqliteDefinitionRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct DefinitionRow {
    definition: String,
}

impl DefinitionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            definition: row.try_get("definition")?,
        })
    }

    fn into_definition(self) -> Result<WorkflowDefinition, RepositoryError> {
        serde_json::from_str(&self.definition)
            .map_err(|e| RepositoryError::Query(format!("invalid workflow definition JSON: {e}")))
    }
}

impl DefinitionRepository for SqliteDefinitionRepository {
    async fn save_definition(&self, def: &WorkflowDefinition) -> Result<(), RepositoryError> {
        let definition_json = serde_json::to_string(def)
            .map_err(|e| RepositoryError::Query(format!("serialize definition: {e}")))?;

        sqlx::query(
            r#"INSERT INTO workflow_definitions (workflow_id, definition, updated_at)
               VALUES (?, ?, ?)
               ON CONFLICT(workflow_id) DO UPDATE SET
                 definition = excluded.definition,
                 updated_at = excluded.updated_at"#,
        )
        .bind(&def.workflow_id)
        .bind(&definition_json)
        .bind(format_datetime(&Utc::now()))
        .execute(&self.pool.writer)
        .await
        .map_err(map_write_error)?;

        tracing::debug!(workflow_id = %def.workflow_id, tasks = def.tasks.len(), "saved workflow definition");
        Ok(())
    }

    async fn get_definition(
        &self,
        workflow_id: &str,
    ) -> Result<Option<WorkflowDefinition>, RepositoryError> {
        let row = sqlx::query("SELECT definition FROM workflow_definitions WHERE workflow_id = ?")
            .bind(workflow_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let r = DefinitionRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(r.into_definition()?))
            }
            None => Ok(None),
        }
    }

    async fn delete_definition(&self, workflow_id: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM workflow_definitions WHERE workflow_id = ?")
            .bind(workflow_id)
            .execute(&self.pool.writer)
            .await
            .map_err(map_write_error)?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    #[tokio::test]
    async fn test_save_get_and_replace_definition() {
        let repo = SqliteDefinitionRepository::new(test_pool().await);
        let def = WorkflowDefinition::new("etl")
            .with_task("extract", 0)
            .with_task("load", 2);

        repo.save_definition(&def).await.unwrap();
        assert_eq!(repo.get_definition("etl").await.unwrap(), Some(def));

        let trimmed = WorkflowDefinition::new("etl").with_task("extract", 1);
        repo.save_definition(&trimmed).await.unwrap();
        let loaded = repo.get_definition("etl").await.unwrap().unwrap();
        assert!(!loaded.has_task("load"));
        assert_eq!(loaded.task_retries("extract"), Some(1));
    }

    #[tokio::test]
    async fn test_missing_definition_is_none() {
        let repo = SqliteDefinitionRepository::new(test_pool().await);
        assert!(repo.get_definition("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_definition() {
        let repo = SqliteDefinitionRepository::new(test_pool().await);
        repo.save_definition(&WorkflowDefinition::new("etl")).await.unwrap();

        assert!(repo.delete_definition("etl").await.unwrap());
        assert!(!repo.delete_definition("etl").await.unwrap());
        assert!(repo.get_definition("etl").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_definition_is_query_error() {
        let pool = test_pool().await;
        sqlx::query(
            "INSERT INTO workflow_definitions (workflow_id, definition, updated_at) VALUES ('etl', 'not json', '2026-01-01T00:00:00Z')",
        )
        .execute(&pool.writer)
        .await
        .unwrap();

        let repo = SqliteDefinitionRepository::new(pool);
        assert!(matches!(
            repo.get_definition("etl").await,
            Err(RepositoryError::Query(_))
        ));
    }
}
