//! Reschedule markers.
//!
//! A sensor running in reschedule mode leaves one marker per poke that asked
//! to be retried later. Markers belong to a task instance and become stale as
//! soon as the instance is cleared.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Auxiliary wait-state row scoped to one try of a task instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RescheduleMarker {
    pub id: Uuid,
    pub task_instance_id: Uuid,
    pub try_number: u32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// When the task asked to be picked up again.
    pub reschedule_date: DateTime<Utc>,
}
