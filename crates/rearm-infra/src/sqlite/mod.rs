//! SQLite storage layer.
//!
//! Repository implementations backed by SQLite with WAL mode and split
//! read/write connection pools. Schema migrations live in the workspace
//! `migrations/` directory and are embedded at compile time.

pub mod clear;
pub mod definition;
pub mod pool;
mod rows;
pub mod task;
