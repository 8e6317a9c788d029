//! Repository trait definitions (ports).
//!
//! These traits define the storage interface that the infrastructure layer
//! (rearm-infra) implements. The core crate never depends on any specific
//! storage technology.

pub mod clear;
pub mod definition;
pub mod task;
