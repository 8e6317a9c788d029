//! Infrastructure layer for rearm.
//!
//! Implements the repository and transaction traits defined in `rearm-core`
//! on SQLite, and loads `rearm.toml` configuration.

pub mod config;
pub mod sqlite;
