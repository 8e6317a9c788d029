use thiserror::Error;

/// Errors from repository operations (used by trait definitions in rearm-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    /// Concurrent modification or lock contention. The whole batch must be
    /// retried by the caller.
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors returned by the clear service.
#[derive(Debug, Error)]
pub enum ClearError {
    /// The batch was rolled back. Nothing was written.
    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),

    #[error("batch of {size} task instances exceeds the limit of {max}")]
    BatchTooLarge { size: usize, max: usize },
}
