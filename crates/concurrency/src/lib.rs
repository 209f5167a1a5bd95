//! Concurrency layer for tally
//!
//! This crate implements the isolation rules of the in-memory engine:
//! - TransactionContext: read/write set tracking, lazily taken snapshot
//! - Visibility: what each isolation level may read
//! - Conflict detection: row locks, first-updater-wins, read-set validation
//! - TransactionManager: atomic commit with version publication

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod manager;
pub mod transaction;
pub mod validation;
pub mod visibility;

pub use manager::TransactionManager;
pub use transaction::{CommitError, TransactionContext, TransactionStatus, WriteMode};
pub use validation::{check_concurrent_update, validate_read_set, ConflictType, ValidationResult};
pub use visibility::{resolve, IsolationPolicy, RepeatableReadPolicy, Visible};
