//! Visibility rules per isolation level
//!
//! | Level            | Reads see                                   | Second writer of a changed row |
//! |------------------|---------------------------------------------|--------------------------------|
//! | read uncommitted | other transactions' write intents, if any   | overwrites                     |
//! | read committed   | latest committed at statement start         | overwrites                     |
//! | repeatable read  | committed as of the first statement         | policy: abort or overwrite     |
//! | serializable     | committed as of the first statement         | aborts                         |
//!
//! Own writes are always visible to the writer; that rule lives in
//! [`TransactionContext`](crate::TransactionContext).

use serde::{Deserialize, Serialize};

use tally_core::{CounterName, IsolationLevel, Version, VersionedValue};
use tally_storage::{VersionedStore, WriteIntent};

/// What happens when a repeatable-read transaction updates a row that was
/// committed by someone else after its snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepeatableReadPolicy {
    /// Abort the second writer (PostgreSQL behavior)
    #[default]
    FirstUpdaterWins,
    /// Let the second writer overwrite (MySQL/InnoDB behavior)
    LastWriterWins,
}

/// Store-dependent knobs of the isolation rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsolationPolicy {
    /// Conflict handling under repeatable read
    pub repeatable_read: RepeatableReadPolicy,
    /// Whether read uncommitted really exposes uncommitted writes
    ///
    /// When false, read uncommitted behaves like read committed.
    pub dirty_reads: bool,
}

impl Default for IsolationPolicy {
    fn default() -> Self {
        Self {
            repeatable_read: RepeatableReadPolicy::FirstUpdaterWins,
            dirty_reads: true,
        }
    }
}

impl IsolationPolicy {
    /// Whether a write must fail when the row changed after the snapshot
    pub fn rejects_concurrent_update(&self, level: IsolationLevel) -> bool {
        match level {
            IsolationLevel::Serializable => true,
            IsolationLevel::RepeatableRead => {
                self.repeatable_read == RepeatableReadPolicy::FirstUpdaterWins
            }
            IsolationLevel::ReadUncommitted | IsolationLevel::ReadCommitted => false,
        }
    }

    /// Whether reads may return other transactions' uncommitted writes
    pub fn sees_uncommitted(&self, level: IsolationLevel) -> bool {
        self.dirty_reads && level == IsolationLevel::ReadUncommitted
    }

    /// Whether commit validates every row read against its current version
    pub fn validates_read_set(&self, level: IsolationLevel) -> bool {
        level == IsolationLevel::Serializable
    }
}

/// Result of resolving a read against the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visible {
    /// Another transaction's uncommitted write (dirty read)
    Uncommitted(WriteIntent),
    /// A committed version
    Committed(VersionedValue),
    /// No visible row
    Absent,
}

/// Resolve which value a reader sees
///
/// `snapshot` is the version the statement reads at: the transaction
/// snapshot under repeatable read and serializable, the statement start
/// version otherwise.
pub fn resolve(
    store: &VersionedStore,
    counter: &CounterName,
    level: IsolationLevel,
    snapshot: Version,
    reader_txn: u64,
    policy: &IsolationPolicy,
) -> Visible {
    if policy.sees_uncommitted(level) {
        if let Some(intent) = store.intent(counter) {
            if intent.txn_id != reader_txn {
                return Visible::Uncommitted(intent);
            }
        }
    }

    match store.get_at_version(counter, snapshot) {
        Some(vv) => Visible::Committed(vv),
        None => Visible::Absent,
    }
}
