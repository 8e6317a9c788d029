//! Row mapping shared by the SQLite repositories.
//!
//! Ids are stored as UUID strings, timestamps as RFC 3339 text and states as
//! their snake_case names.

use chrono::{DateTime, Utc};
use rearm_types::error::RepositoryError;
use rearm_types::history::AttemptRecord;
use rearm_types::reschedule::RescheduleMarker;
use rearm_types::run::{RunId, RunState, WorkflowRun};
use rearm_types::task::{DeferredContinuation, TaskInstance, TaskState};
use sqlx::Row;
use uuid::Uuid;

pub(crate) const RUN_COLUMNS: &str = "id, workflow_id, state, queued_at, start_date, end_date, \
     last_scheduling_decision, clear_number";

pub(crate) const TASK_INSTANCE_COLUMNS: &str = "id, run_id, workflow_id, task_id, map_index, \
     state, try_number, max_tries, external_executor_id, next_method, next_kwargs, start_date, \
     end_date, updated_at";

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid, RepositoryError> {
    s.parse::<Uuid>()
        .map_err(|e| RepositoryError::Query(format!("invalid UUID: {e}")))
}

pub(crate) fn parse_run_id(s: &str) -> Result<RunId, RepositoryError> {
    s.parse::<RunId>()
        .map_err(|e| RepositoryError::Query(format!("invalid run id: {e}")))
}

pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

pub(crate) fn parse_optional_datetime(
    s: Option<&str>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    s.map(parse_datetime).transpose()
}

pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_task_state(s: &str) -> Result<TaskState, RepositoryError> {
    s.parse::<TaskState>().map_err(RepositoryError::Query)
}

fn parse_count(value: i64, column: &str) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::Query(format!("{column} out of range: {value}")))
}

/// Map a write error, turning lock contention and constraint violations into
/// [`RepositoryError::Conflict`].
pub(crate) fn map_write_error(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e {
        let message = db_err.message();
        if message.contains("UNIQUE")
            || message.contains("database is locked")
            || message.contains("database is busy")
        {
            return RepositoryError::Conflict(message.to_string());
        }
    }
    RepositoryError::Query(e.to_string())
}

// ---------------------------------------------------------------------------
// Runs
// ---------------------------------------------------------------------------

pub(crate) struct RunRow {
    id: String,
    workflow_id: String,
    state: String,
    queued_at: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    last_scheduling_decision: Option<String>,
    clear_number: i64,
}

impl RunRow {
    pub(crate) fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            workflow_id: row.try_get("workflow_id")?,
            state: row.try_get("state")?,
            queued_at: row.try_get("queued_at")?,
            start_date: row.try_get("start_date")?,
            end_date: row.try_get("end_date")?,
            last_scheduling_decision: row.try_get("last_scheduling_decision")?,
            clear_number: row.try_get("clear_number")?,
        })
    }

    pub(crate) fn into_run(self) -> Result<WorkflowRun, RepositoryError> {
        Ok(WorkflowRun {
            id: parse_run_id(&self.id)?,
            workflow_id: self.workflow_id,
            state: self
                .state
                .parse::<RunState>()
                .map_err(RepositoryError::Query)?,
            queued_at: parse_optional_datetime(self.queued_at.as_deref())?,
            start_date: parse_optional_datetime(self.start_date.as_deref())?,
            end_date: parse_optional_datetime(self.end_date.as_deref())?,
            last_scheduling_decision: parse_optional_datetime(
                self.last_scheduling_decision.as_deref(),
            )?,
            clear_number: parse_count(self.clear_number, "clear_number")?,
        })
    }
}

pub(crate) fn row_to_run(row: &sqlx::sqlite::SqliteRow) -> Result<WorkflowRun, RepositoryError> {
    RunRow::from_row(row)
        .map_err(|e| RepositoryError::Query(e.to_string()))?
        .into_run()
}

// ---------------------------------------------------------------------------
// Task instances
// ---------------------------------------------------------------------------

pub(crate) struct TaskInstanceRow {
    id: String,
    run_id: String,
    workflow_id: String,
    task_id: String,
    map_index: i32,
    state: Option<String>,
    try_number: i64,
    max_tries: i64,
    external_executor_id: Option<String>,
    next_method: Option<String>,
    next_kwargs: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    updated_at: String,
}

impl TaskInstanceRow {
    pub(crate) fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            run_id: row.try_get("run_id")?,
            workflow_id: row.try_get("workflow_id")?,
            task_id: row.try_get("task_id")?,
            map_index: row.try_get("map_index")?,
            state: row.try_get("state")?,
            try_number: row.try_get("try_number")?,
            max_tries: row.try_get("max_tries")?,
            external_executor_id: row.try_get("external_executor_id")?,
            next_method: row.try_get("next_method")?,
            next_kwargs: row.try_get("next_kwargs")?,
            start_date: row.try_get("start_date")?,
            end_date: row.try_get("end_date")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    pub(crate) fn into_task_instance(self) -> Result<TaskInstance, RepositoryError> {
        let kwargs = self
            .next_kwargs
            .as_deref()
            .map(serde_json::from_str::<serde_json::Value>)
            .transpose()
            .map_err(|e| RepositoryError::Query(format!("invalid next_kwargs JSON: {e}")))?;
        let next = self.next_method.map(|method| DeferredContinuation { method, kwargs });

        Ok(TaskInstance {
            id: parse_uuid(&self.id)?,
            run_id: parse_run_id(&self.run_id)?,
            workflow_id: self.workflow_id,
            task_id: self.task_id,
            map_index: self.map_index,
            state: self.state.as_deref().map(parse_task_state).transpose()?,
            try_number: parse_count(self.try_number, "try_number")?,
            max_tries: parse_count(self.max_tries, "max_tries")?,
            external_executor_id: self.external_executor_id,
            next,
            start_date: parse_optional_datetime(self.start_date.as_deref())?,
            end_date: parse_optional_datetime(self.end_date.as_deref())?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

pub(crate) fn row_to_task_instance(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<TaskInstance, RepositoryError> {
    TaskInstanceRow::from_row(row)
        .map_err(|e| RepositoryError::Query(e.to_string()))?
        .into_task_instance()
}

/// Split a deferred continuation into its `(next_method, next_kwargs)` columns.
pub(crate) fn next_columns(
    next: Option<&DeferredContinuation>,
) -> Result<(Option<String>, Option<String>), RepositoryError> {
    match next {
        None => Ok((None, None)),
        Some(cont) => {
            let kwargs = cont
                .kwargs
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|e| RepositoryError::Query(format!("serialize next_kwargs: {e}")))?;
            Ok((Some(cont.method.clone()), kwargs))
        }
    }
}

// ---------------------------------------------------------------------------
// Attempt records
// ---------------------------------------------------------------------------

pub(crate) struct AttemptRow {
    id: String,
    task_instance_id: String,
    run_id: String,
    workflow_id: String,
    task_id: String,
    map_index: i32,
    try_number: i64,
    max_tries: i64,
    observed_state: Option<String>,
    state: String,
    external_executor_id: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    recorded_at: String,
}

impl AttemptRow {
    pub(crate) fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            task_instance_id: row.try_get("task_instance_id")?,
            run_id: row.try_get("run_id")?,
            workflow_id: row.try_get("workflow_id")?,
            task_id: row.try_get("task_id")?,
            map_index: row.try_get("map_index")?,
            try_number: row.try_get("try_number")?,
            max_tries: row.try_get("max_tries")?,
            observed_state: row.try_get("observed_state")?,
            state: row.try_get("state")?,
            external_executor_id: row.try_get("external_executor_id")?,
            start_date: row.try_get("start_date")?,
            end_date: row.try_get("end_date")?,
            recorded_at: row.try_get("recorded_at")?,
        })
    }

    pub(crate) fn into_record(self) -> Result<AttemptRecord, RepositoryError> {
        Ok(AttemptRecord {
            id: parse_uuid(&self.id)?,
            task_instance_id: parse_uuid(&self.task_instance_id)?,
            run_id: parse_run_id(&self.run_id)?,
            workflow_id: self.workflow_id,
            task_id: self.task_id,
            map_index: self.map_index,
            try_number: parse_count(self.try_number, "try_number")?,
            max_tries: parse_count(self.max_tries, "max_tries")?,
            observed_state: self
                .observed_state
                .as_deref()
                .map(parse_task_state)
                .transpose()?,
            state: parse_task_state(&self.state)?,
            external_executor_id: self.external_executor_id,
            start_date: parse_optional_datetime(self.start_date.as_deref())?,
            end_date: parse_optional_datetime(self.end_date.as_deref())?,
            recorded_at: parse_datetime(&self.recorded_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Reschedule markers
// ---------------------------------------------------------------------------

pub(crate) fn row_to_marker(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<RescheduleMarker, RepositoryError> {
    let get = |col: &str| -> Result<String, RepositoryError> {
        row.try_get(col)
            .map_err(|e| RepositoryError::Query(e.to_string()))
    };
    let try_number: i64 = row
        .try_get("try_number")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

    Ok(RescheduleMarker {
        id: parse_uuid(&get("id")?)?,
        task_instance_id: parse_uuid(&get("task_instance_id")?)?,
        try_number: parse_count(try_number, "try_number")?,
        start_date: parse_datetime(&get("start_date")?)?,
        end_date: parse_datetime(&get("end_date")?)?,
        reschedule_date: parse_datetime(&get("reschedule_date")?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn datetime_round_trip_keeps_subsecond_precision() {
        let now = Utc::now();
        assert_eq!(parse_datetime(&format_datetime(&now)).unwrap(), now);
    }

    #[test]
    fn invalid_values_are_query_errors() {
        assert!(matches!(parse_uuid("nope"), Err(RepositoryError::Query(_))));
        assert!(matches!(parse_datetime("yesterday"), Err(RepositoryError::Query(_))));
        assert!(matches!(parse_task_state("exploded"), Err(RepositoryError::Query(_))));
        assert!(matches!(parse_count(-1, "try_number"), Err(RepositoryError::Query(_))));
    }

    #[test]
    fn next_columns_split_continuation() {
        assert_eq!(next_columns(None).unwrap(), (None, None));

        let cont = DeferredContinuation {
            method: "execute_complete".to_string(),
            kwargs: Some(json!({"event": 1})),
        };
        let (method, kwargs) = next_columns(Some(&cont)).unwrap();
        assert_eq!(method.as_deref(), Some("execute_complete"));
        assert_eq!(kwargs.as_deref(), Some(r#"{"event":1}"#));
    }
}
