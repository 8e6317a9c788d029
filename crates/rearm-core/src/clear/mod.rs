//! Task instance clearing and retry accounting.
//!
//! Clearing re-arms previously executed task instances for another attempt.
//! For every instance in a batch the engine, in order:
//!
//! 1. appends an attempt record with the pre-reset snapshot (`ledger`),
//! 2. recomputes the retry budget (`retry`),
//! 3. resets state, executor handle and deferred continuation (`reset`),
//! 4. deletes the instance's reschedule markers (`dependents`),
//!
//! and finally settles the state of every implicated run (`run_state`).
//! `engine` sequences these inside a caller-owned transaction; `service`
//! is the caller that owns transaction boundaries.

pub mod dependents;
pub mod engine;
pub mod ledger;
pub mod observer;
pub mod reset;
pub mod retry;
pub mod run_state;
pub mod service;

#[cfg(test)]
pub(crate) mod memory;
