//! Core types and traits for tally
//!
//! This crate defines the foundational types used throughout the system:
//! - CounterName: Primary key of the shared counter row
//! - IsolationLevel: The four ANSI isolation levels
//! - Version / VersionedValue: Commit versions of counter rows
//! - Error: Error type hierarchy, with write conflicts as a typed variant
//! - Traits: Store capability contract (TransactionalStore, StoreConnection)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{ConflictKind, Error, Result};
pub use traits::{CommitOutcome, StoreConnection, TransactionalStore};
pub use types::{
    CounterName, IsolationLevel, Version, VersionedValue, DEFAULT_BASELINE, DEFAULT_COUNTER,
};
