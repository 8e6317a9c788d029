//! SQLite task repository implementation.
//!
//! Implements `TaskRepository` from `rearm-core`. Writes go through the
//! writer pool one statement at a time; reads use the reader pool.

use rearm_core::repository::task::TaskRepository;
use rearm_types::error::RepositoryError;
use rearm_types::history::AttemptRecord;
use rearm_types::reschedule::RescheduleMarker;
use rearm_types::run::{RunId, WorkflowRun};
use rearm_types::task::{TaskInstance, TaskInstanceKey};
use uuid::Uuid;

use super::pool::DatabasePool;
use super::rows::{
    AttemptRow, RUN_COLUMNS, TASK_INSTANCE_COLUMNS, format_datetime, map_write_error,
    next_columns, row_to_marker, row_to_run, row_to_task_instance,
};

/// SQLite-backed implementation of `TaskRepository`.
#[derive(Clone)]
pub struct SqliteTaskRepository {
    pool: DatabasePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Reschedule markers of a task instance, oldest try first.
    pub async fn list_reschedule_markers(
        &self,
        task_instance_id: &Uuid,
    ) -> Result<Vec<RescheduleMarker>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM reschedule_markers WHERE task_instance_id = ? ORDER BY try_number ASC",
        )
        .bind(task_instance_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut markers = Vec::with_capacity(rows.len());
        for row in &rows {
            markers.push(row_to_marker(row)?);
        }
        Ok(markers)
    }
}

impl TaskRepository for SqliteTaskRepository {
    async fn create_run(&self, run: &WorkflowRun) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO workflow_runs
               (id, workflow_id, state, queued_at, start_date, end_date,
                last_scheduling_decision, clear_number)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(run.id.to_string())
        .bind(&run.workflow_id)
        .bind(run.state.to_string())
        .bind(run.queued_at.as_ref().map(format_datetime))
        .bind(run.start_date.as_ref().map(format_datetime))
        .bind(run.end_date.as_ref().map(format_datetime))
        .bind(run.last_scheduling_decision.as_ref().map(format_datetime))
        .bind(i64::from(run.clear_number))
        .execute(&self.pool.writer)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn get_run(&self, run_id: &RunId) -> Result<Option<WorkflowRun>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {RUN_COLUMNS} FROM workflow_runs WHERE id = ?"
        ))
        .bind(run_id.to_string())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => Ok(Some(row_to_run(&row)?)),
            None => Ok(None),
        }
    }

    async fn delete_run(&self, run_id: &RunId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM workflow_runs WHERE id = ?")
            .bind(run_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(map_write_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_task_instance(&self, ti: &TaskInstance) -> Result<(), RepositoryError> {
        let (next_method, next_kwargs) = next_columns(ti.next.as_ref())?;

        sqlx::query(
            r#"INSERT INTO task_instances
               (id, run_id, workflow_id, task_id, map_index, state, try_number, max_tries,
                external_executor_id, next_method, next_kwargs, start_date, end_date, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(ti.id.to_string())
        .bind(ti.run_id.to_string())
        .bind(&ti.workflow_id)
        .bind(&ti.task_id)
        .bind(ti.map_index)
        .bind(ti.state.map(|s| s.to_string()))
        .bind(i64::from(ti.try_number))
        .bind(i64::from(ti.max_tries))
        .bind(&ti.external_executor_id)
        .bind(&next_method)
        .bind(&next_kwargs)
        .bind(ti.start_date.as_ref().map(format_datetime))
        .bind(ti.end_date.as_ref().map(format_datetime))
        .bind(format_datetime(&ti.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.message().contains("UNIQUE") {
                    return RepositoryError::Conflict(format!(
                        "task instance {} already exists",
                        ti.key()
                    ));
                }
            }
            map_write_error(e)
        })?;

        Ok(())
    }

    async fn get_task_instance(
        &self,
        key: &TaskInstanceKey,
    ) -> Result<Option<TaskInstance>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {TASK_INSTANCE_COLUMNS} FROM task_instances
             WHERE run_id = ? AND task_id = ? AND map_index = ?"
        ))
        .bind(key.run_id.to_string())
        .bind(&key.task_id)
        .bind(key.map_index)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => Ok(Some(row_to_task_instance(&row)?)),
            None => Ok(None),
        }
    }

    async fn save_task_instance(&self, ti: &TaskInstance) -> Result<(), RepositoryError> {
        let (next_method, next_kwargs) = next_columns(ti.next.as_ref())?;

        let result = sqlx::query(
            r#"UPDATE task_instances SET
                 state = ?, try_number = ?, max_tries = ?, external_executor_id = ?,
                 next_method = ?, next_kwargs = ?, start_date = ?, end_date = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(ti.state.map(|s| s.to_string()))
        .bind(i64::from(ti.try_number))
        .bind(i64::from(ti.max_tries))
        .bind(&ti.external_executor_id)
        .bind(&next_method)
        .bind(&next_kwargs)
        .bind(ti.start_date.as_ref().map(format_datetime))
        .bind(ti.end_date.as_ref().map(format_datetime))
        .bind(format_datetime(&ti.updated_at))
        .bind(ti.id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn list_attempt_records(
        &self,
        task_instance_id: &Uuid,
    ) -> Result<Vec<AttemptRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM attempt_records WHERE task_instance_id = ? ORDER BY recorded_at ASC, id ASC",
        )
        .bind(task_instance_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = AttemptRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            records.push(r.into_record()?);
        }
        Ok(records)
    }

    async fn create_reschedule_marker(
        &self,
        marker: &RescheduleMarker,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO reschedule_markers
               (id, task_instance_id, try_number, start_date, end_date, reschedule_date)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(marker.id.to_string())
        .bind(marker.task_instance_id.to_string())
        .bind(i64::from(marker.try_number))
        .bind(format_datetime(&marker.start_date))
        .bind(format_datetime(&marker.end_date))
        .bind(format_datetime(&marker.reschedule_date))
        .execute(&self.pool.writer)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn count_reschedule_markers(&self, task_instance_id: &Uuid) -> Result<u64, RepositoryError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM reschedule_markers WHERE task_instance_id = ?")
                .bind(task_instance_id.to_string())
                .fetch_one(&self.pool.reader)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use rearm_types::run::RunState;
    use rearm_types::task::TaskState;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    fn marker(ti: &TaskInstance, try_number: u32) -> RescheduleMarker {
        let now = Utc::now();
        RescheduleMarker {
            id: Uuid::now_v7(),
            task_instance_id: ti.id,
            try_number,
            start_date: now - Duration::minutes(1),
            end_date: now,
            reschedule_date: now + Duration::minutes(5),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_run() {
        let repo = SqliteTaskRepository::new(test_pool().await);
        let mut run = WorkflowRun::queued("etl");
        run.state = RunState::Success;
        run.end_date = Some(Utc::now());
        run.clear_number = 2;

        repo.create_run(&run).await.unwrap();

        let loaded = repo.get_run(&run.id).await.unwrap().unwrap();
        assert_eq!(loaded, run);
        assert!(repo.get_run(&RunId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_task_instance_round_trip_and_save() {
        let repo = SqliteTaskRepository::new(test_pool().await);
        let run = WorkflowRun::queued("etl");
        repo.create_run(&run).await.unwrap();

        let mut ti = TaskInstance::new(run.id, "etl", "extract", 1);
        ti.map_index = 3;
        repo.create_task_instance(&ti).await.unwrap();
        assert_eq!(repo.get_task_instance(&ti.key()).await.unwrap().unwrap(), ti);

        ti.state = Some(TaskState::Running);
        ti.try_number = 1;
        ti.external_executor_id = Some("worker-1".to_string());
        repo.save_task_instance(&ti).await.unwrap();
        assert_eq!(repo.get_task_instance(&ti.key()).await.unwrap().unwrap(), ti);
    }

    #[tokio::test]
    async fn test_duplicate_task_instance_conflicts() {
        let repo = SqliteTaskRepository::new(test_pool().await);
        let run = WorkflowRun::queued("etl");
        repo.create_run(&run).await.unwrap();

        repo.create_task_instance(&TaskInstance::new(run.id, "etl", "extract", 0))
            .await
            .unwrap();
        let err = repo
            .create_task_instance(&TaskInstance::new(run.id, "etl", "extract", 0))
            .await
            .unwrap_err();

        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_task_instance_requires_run() {
        let repo = SqliteTaskRepository::new(test_pool().await);
        let orphan = TaskInstance::new(RunId::new(), "etl", "extract", 0);
        assert!(repo.create_task_instance(&orphan).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_run_cascades() {
        let repo = SqliteTaskRepository::new(test_pool().await);
        let run = WorkflowRun::queued("etl");
        repo.create_run(&run).await.unwrap();
        let ti = TaskInstance::new(run.id, "etl", "sensor", 0);
        repo.create_task_instance(&ti).await.unwrap();
        repo.create_reschedule_marker(&marker(&ti, 1)).await.unwrap();

        assert!(repo.delete_run(&run.id).await.unwrap());
        assert!(!repo.delete_run(&run.id).await.unwrap());

        assert!(repo.get_task_instance(&ti.key()).await.unwrap().is_none());
        assert_eq!(repo.count_reschedule_markers(&ti.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reschedule_markers_listed_by_try() {
        let repo = SqliteTaskRepository::new(test_pool().await);
        let run = WorkflowRun::queued("etl");
        repo.create_run(&run).await.unwrap();
        let ti = TaskInstance::new(run.id, "etl", "sensor", 0);
        repo.create_task_instance(&ti).await.unwrap();

        let second = marker(&ti, 2);
        let first = marker(&ti, 1);
        repo.create_reschedule_marker(&second).await.unwrap();
        repo.create_reschedule_marker(&first).await.unwrap();

        assert_eq!(repo.count_reschedule_markers(&ti.id).await.unwrap(), 2);
        assert_eq!(
            repo.list_reschedule_markers(&ti.id).await.unwrap(),
            vec![first, second]
        );
    }

    #[tokio::test]
    async fn test_save_missing_task_instance_not_found() {
        let repo = SqliteTaskRepository::new(test_pool().await);
        let ti = TaskInstance::new(RunId::new(), "etl", "ghost", 0);
        assert!(matches!(
            repo.save_task_instance(&ti).await,
            Err(RepositoryError::NotFound)
        ));
    }
}
