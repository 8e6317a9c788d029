//! Shared domain types for rearm.
//!
//! This crate contains the records the clear engine operates on: task
//! instances, workflow runs, attempt records, reschedule markers, workflow
//! definitions, clear events, configuration and error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod definition;
pub mod error;
pub mod event;
pub mod history;
pub mod reschedule;
pub mod run;
pub mod task;
