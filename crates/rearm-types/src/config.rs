//! Global configuration types for rearm.
//!
//! `RearmConfig` represents the top-level `rearm.toml` that controls the
//! database pool, batch bounds, event recording and tracing export.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
///
/// Loaded from `{data_dir}/rearm.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RearmConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub clear: ClearConfig,
    #[serde(default)]
    pub observer: ObserverConfig,
    #[serde(default)]
    pub tracing: TracingConfig,
}

/// SQLite pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Seconds a connection waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
    /// Size of the read-only connection pool.
    #[serde(default = "default_max_read_connections")]
    pub max_read_connections: u32,
}

fn default_busy_timeout_secs() -> u64 {
    5
}

fn default_max_read_connections() -> u32 {
    8
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            busy_timeout_secs: default_busy_timeout_secs(),
            max_read_connections: default_max_read_connections(),
        }
    }
}

/// Clear batch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearConfig {
    /// Largest number of task instances accepted in one transaction.
    /// `0` disables the bound.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

fn default_max_batch_size() -> usize {
    10_000
}

impl Default for ClearConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
        }
    }
}

/// Selects the observer injected into the clear service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserverConfig {
    /// Publish `ClearEvent`s on a broadcast bus instead of discarding them.
    #[serde(default)]
    pub record_events: bool,
    /// Capacity of the broadcast channel when recording.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_event_capacity() -> usize {
    256
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            record_events: false,
            event_capacity: default_event_capacity(),
        }
    }
}

/// Tracing export settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TracingConfig {
    /// Bridge tracing spans to OpenTelemetry (stdout exporter).
    #[serde(default)]
    pub otel: bool,
}
