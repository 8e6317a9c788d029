//! Clear engine and repository trait definitions for rearm.
//!
//! This crate defines the "ports" (repository and transaction traits) that
//! the infrastructure layer implements, plus the engine that re-arms task
//! instances for another attempt. It depends only on `rearm-types` -- never
//! on `rearm-infra` or any database/IO crate.

pub mod clear;
pub mod repository;
