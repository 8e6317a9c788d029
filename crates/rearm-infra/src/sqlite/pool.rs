//! Database pool with split reader/writer connections in WAL mode.
//!
//! SQLite allows only one writer at a time. Clear batches run on the
//! single-connection writer pool, so their transactions are serialized and a
//! task instance read inside one cannot be updated by another batch before
//! it commits. Reads that need no transaction use the reader pool.

use rearm_types::config::DatabaseConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Split read/write pool for SQLite with WAL mode.
///
/// - `reader`: Multi-connection pool for concurrent SELECT queries.
/// - `writer`: Single-connection pool for serialized writes and clear transactions.
#[derive(Clone)]
pub struct DatabasePool {
    pub reader: SqlitePool,
    pub writer: SqlitePool,
}

impl DatabasePool {
    /// Create a pool with default settings (5s busy timeout, 8 readers).
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        Self::with_config(database_url, &DatabaseConfig::default()).await
    }

    /// Create a pool with split reader/writer connections.
    ///
    /// Runs migrations on the writer before the reader pool is opened.
    pub async fn with_config(
        database_url: &str,
        config: &DatabaseConfig,
    ) -> Result<Self, sqlx::Error> {
        let base_opts = SqliteConnectOptions::from_str(database_url)?
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(config.busy_timeout_secs))
            .create_if_missing(true);

        let read_opts = base_opts.clone().read_only(true);
        let write_opts = base_opts;

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(write_opts)
            .await?;

        sqlx::migrate!("../../migrations").run(&writer).await?;

        let reader = SqlitePoolOptions::new()
            .max_connections(config.max_read_connections.max(1))
            .connect_with(read_opts)
            .await?;

        tracing::debug!(
            busy_timeout_secs = config.busy_timeout_secs,
            readers = config.max_read_connections,
            "database pool ready"
        );

        Ok(Self { reader, writer })
    }
}

/// Database URL for `{data_dir}/rearm.db`.
pub fn database_url(data_dir: &Path) -> String {
    format!("sqlite://{}/rearm.db?mode=rwc", data_dir.display())
}
