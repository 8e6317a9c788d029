//! Attempt ledger writer.
//!
//! Appends the immutable record of a task instance's attempt before the
//! instance is reset. Every cleared instance gets exactly one record, whether
//! or not the reset changes anything visible.

use chrono::{DateTime, Utc};
use rearm_types::error::RepositoryError;
use rearm_types::history::AttemptRecord;
use rearm_types::task::TaskInstance;

use crate::repository::clear::ClearTransaction;

/// Write the attempt record for `ti` as it is now.
///
/// Must run before any field of `ti` is touched.
pub async fn record_attempt<T: ClearTransaction>(
    tx: &mut T,
    ti: &TaskInstance,
    recorded_at: DateTime<Utc>,
) -> Result<AttemptRecord, RepositoryError> {
    let record = AttemptRecord::snapshot(ti, recorded_at);
    tx.insert_attempt_record(&record).await?;

    tracing::debug!(
        run_id = %ti.run_id,
        task_id = %ti.task_id,
        map_index = ti.map_index,
        try_number = ti.try_number,
        state = %record.state,
        "recorded attempt"
    );

    Ok(record)
}
