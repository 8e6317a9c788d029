//! Dependent-record cleanup.
//!
//! Reschedule markers are tied to a task instance's execution history. Once
//! the instance is cleared its history restarts, so every marker goes, not
//! only the one of the latest try.

use rearm_types::error::RepositoryError;
use rearm_types::task::TaskInstance;

use crate::repository::clear::ClearTransaction;

/// Delete all reschedule markers of `ti`. Returns how many were removed.
pub async fn remove_dependents<T: ClearTransaction>(
    tx: &mut T,
    ti: &TaskInstance,
) -> Result<u64, RepositoryError> {
    let removed = tx.delete_reschedule_markers(&ti.id).await?;
    if removed > 0 {
        tracing::debug!(
            run_id = %ti.run_id,
            task_id = %ti.task_id,
            removed,
            "removed reschedule markers"
        );
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clear::memory::MemoryStore;
    use crate::repository::clear::ClearStore;
    use chrono::{Duration, Utc};
    use rearm_types::reschedule::RescheduleMarker;
    use rearm_types::run::WorkflowRun;
    use uuid::Uuid;

    fn marker(ti: &TaskInstance, try_number: u32) -> RescheduleMarker {
        let now = Utc::now();
        RescheduleMarker {
            id: Uuid::now_v7(),
            task_instance_id: ti.id,
            try_number,
            start_date: now,
            end_date: now,
            reschedule_date: now + Duration::minutes(5),
        }
    }

    #[tokio::test]
    async fn removes_markers_of_every_try() {
        let store = MemoryStore::new();
        let run = WorkflowRun::queued("etl");
        let sensor = TaskInstance::new(run.id, "etl", "sensor", 0);
        let other = TaskInstance::new(run.id, "etl", "other_sensor", 0);
        for try_number in 1..=3 {
            store.insert_marker(marker(&sensor, try_number));
        }
        store.insert_marker(marker(&other, 1));

        let mut tx = store.begin().await.unwrap();
        let removed = remove_dependents(&mut tx, &sensor).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(removed, 3);
        let state = store.snapshot();
        assert_eq!(state.markers_for(&sensor.id), 0);
        assert_eq!(state.markers_for(&other.id), 1);
    }

    #[tokio::test]
    async fn no_markers_is_not_an_error() {
        let store = MemoryStore::new();
        let run = WorkflowRun::queued("etl");
        let ti = TaskInstance::new(run.id, "etl", "extract", 0);

        let mut tx = store.begin().await.unwrap();
        assert_eq!(remove_dependents(&mut tx, &ti).await.unwrap(), 0);
    }
}
