//! Scenario Integration Tests
//!
//! End-to-end runs of the two-transaction counter scenario through the
//! public API, one module per behavior.

#[path = "../common/mod.rs"]
mod common;

mod initialization;
mod interleaved;
mod properties;
mod serialized;
#[cfg(feature = "sqlite")]
mod sqlite;
mod visibility;
