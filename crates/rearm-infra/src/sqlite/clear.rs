//! SQLite clear store.
//!
//! Implements `ClearStore` and `ClearTransaction` from `rearm-core` on top of
//! a sqlx transaction on the writer pool. Dropping a `SqliteClearTransaction`
//! without committing rolls it back.

use rearm_core::repository::clear::{ClearStore, ClearTransaction};
use rearm_types::error::RepositoryError;
use rearm_types::history::AttemptRecord;
use rearm_types::run::{RunId, WorkflowRun};
use rearm_types::task::{TaskInstance, TaskInstanceKey};
use sqlx::{Sqlite, Transaction};
use uuid::Uuid;

use super::pool::DatabasePool;
use super::rows::{
    RUN_COLUMNS, TASK_INSTANCE_COLUMNS, format_datetime, map_write_error, next_columns,
    row_to_run, row_to_task_instance,
};

/// SQLite-backed implementation of `ClearStore`.
#[derive(Clone)]
pub struct SqliteClearStore {
    pool: DatabasePool,
}

impl SqliteClearStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

impl ClearStore for SqliteClearStore {
    type Transaction = SqliteClearTransaction;

    async fn begin(&self) -> Result<SqliteClearTransaction, RepositoryError> {
        let tx = self.pool.writer.begin().await.map_err(map_write_error)?;
        Ok(SqliteClearTransaction { tx })
    }
}

/// One clear batch's transaction on the writer connection.
pub struct SqliteClearTransaction {
    tx: Transaction<'static, Sqlite>,
}

impl ClearTransaction for SqliteClearTransaction {
    async fn get_run(&mut self, run_id: &RunId) -> Result<Option<WorkflowRun>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {RUN_COLUMNS} FROM workflow_runs WHERE id = ?"
        ))
        .bind(run_id.to_string())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_write_error)?;

        row.as_ref().map(row_to_run).transpose()
    }

    async fn get_task_instance(
        &mut self,
        key: &TaskInstanceKey,
    ) -> Result<Option<TaskInstance>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {TASK_INSTANCE_COLUMNS} FROM task_instances
             WHERE run_id = ? AND task_id = ? AND map_index = ?"
        ))
        .bind(key.run_id.to_string())
        .bind(&key.task_id)
        .bind(key.map_index)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_write_error)?;

        row.as_ref().map(row_to_task_instance).transpose()
    }

    async fn list_task_instances(
        &mut self,
        run_id: &RunId,
    ) -> Result<Vec<TaskInstance>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {TASK_INSTANCE_COLUMNS} FROM task_instances
             WHERE run_id = ? ORDER BY task_id ASC, map_index ASC"
        ))
        .bind(run_id.to_string())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_write_error)?;

        let mut tis = Vec::with_capacity(rows.len());
        for row in &rows {
            tis.push(row_to_task_instance(row)?);
        }
        Ok(tis)
    }

    async fn insert_attempt_record(&mut self, record: &AttemptRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO attempt_records
               (id, task_instance_id, run_id, workflow_id, task_id, map_index, try_number,
                max_tries, observed_state, state, external_executor_id, start_date, end_date,
                recorded_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(record.id.to_string())
        .bind(record.task_instance_id.to_string())
        .bind(record.run_id.to_string())
        .bind(&record.workflow_id)
        .bind(&record.task_id)
        .bind(record.map_index)
        .bind(i64::from(record.try_number))
        .bind(i64::from(record.max_tries))
        .bind(record.observed_state.map(|s| s.to_string()))
        .bind(record.state.to_string())
        .bind(&record.external_executor_id)
        .bind(record.start_date.as_ref().map(format_datetime))
        .bind(record.end_date.as_ref().map(format_datetime))
        .bind(format_datetime(&record.recorded_at))
        .execute(&mut *self.tx)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn update_task_instance(&mut self, ti: &TaskInstance) -> Result<(), RepositoryError> {
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
        .execute(&mut *self.tx)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete_reschedule_markers(
        &mut self,
        task_instance_id: &Uuid,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM reschedule_markers WHERE task_instance_id = ?")
            .bind(task_instance_id.to_string())
            .execute(&mut *self.tx)
            .await
            .map_err(map_write_error)?;

        Ok(result.rows_affected())
    }

    async fn update_run(&mut self, run: &WorkflowRun) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE workflow_runs SET
                 state = ?, queued_at = ?, start_date = ?, end_date = ?,
                 last_scheduling_decision = ?, clear_number = ?
               WHERE id = ?"#,
        )
        .bind(run.state.to_string())
        .bind(run.queued_at.as_ref().map(format_datetime))
        .bind(run.start_date.as_ref().map(format_datetime))
        .bind(run.end_date.as_ref().map(format_datetime))
        .bind(run.last_scheduling_decision.as_ref().map(format_datetime))
        .bind(i64::from(run.clear_number))
        .bind(run.id.to_string())
        .execute(&mut *self.tx)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn commit(self) -> Result<(), RepositoryError> {
        self.tx.commit().await.map_err(map_write_error)
    }
}
