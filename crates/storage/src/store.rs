//! VersionedStore: multi-version row storage with write intents
//!
//! Committed data lives in one [`VersionChain`] per counter. Uncommitted
//! writes live beside it as write intents: at most one per row, owned by the
//! writing transaction. An intent doubles as the row lock and as the value a
//! dirty reader sees.
//!
//! The store knows nothing about isolation levels. It answers "latest",
//! "as of version N" and "who holds the intent", and leaves the rules to the
//! concurrency layer.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::trace;

use tally_core::{CounterName, Version, VersionedValue};

use crate::chain::VersionChain;

/// An uncommitted write held by an open transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteIntent {
    /// Transaction that owns the intent
    pub txn_id: u64,
    /// Value the transaction wrote
    pub value: i64,
}

/// Multi-version row storage
///
/// Thread-safe through `DashMap` and `AtomicU64`. The visible version only
/// advances after a commit's rows are applied (see [`publish_version`]), so a
/// snapshot taken at `current_version()` never observes a half-applied commit.
///
/// [`publish_version`]: VersionedStore::publish_version
#[derive(Debug, Default)]
pub struct VersionedStore {
    rows: DashMap<CounterName, VersionChain>,
    intents: DashMap<CounterName, WriteIntent>,
    version: AtomicU64,
}

impl VersionedStore {
    /// Create an empty store at version 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest published commit version
    pub fn current_version(&self) -> Version {
        Version::new(self.version.load(Ordering::SeqCst))
    }

    /// Make every version up to `version` visible to new snapshots
    ///
    /// Callers must serialize commits; publishing is monotonic.
    pub fn publish_version(&self, version: Version) {
        self.version.fetch_max(version.as_u64(), Ordering::SeqCst);
    }

    /// Newest committed value of a row
    pub fn get_latest(&self, counter: &CounterName) -> Option<VersionedValue> {
        self.rows
            .get(counter)
            .and_then(|chain| chain.latest().copied())
    }

    /// Newest committed value of a row at or before `max_version`
    pub fn get_at_version(&self, counter: &CounterName, max_version: Version) -> Option<VersionedValue> {
        self.rows
            .get(counter)
            .and_then(|chain| chain.get_at_version(max_version).copied())
    }

    /// Version of the newest committed value, `Version::ZERO` if the row does not exist
    pub fn latest_version(&self, counter: &CounterName) -> Version {
        self.get_latest(counter)
            .map(|vv| vv.version)
            .unwrap_or(Version::ZERO)
    }

    /// Append a committed value at `version`
    ///
    /// Does not publish the version; see [`publish_version`](Self::publish_version).
    pub fn apply(&self, counter: &CounterName, value: i64, version: Version) {
        let vv = VersionedValue::new(value, version);
        match self.rows.entry(counter.clone()) {
            Entry::Occupied(mut e) => e.get_mut().push(vv),
            Entry::Vacant(e) => {
                e.insert(VersionChain::new(vv));
            }
        }
        trace!(counter = %counter, value, version = version.as_u64(), "applied row version");
    }

    /// Write and publish a value outside any transaction
    ///
    /// Used to seed data and to simulate foreign commits in tests.
    pub fn put(&self, counter: &CounterName, value: i64) -> Version {
        let version = Version::new(self.current_version().as_u64() + 1);
        self.apply(counter, value, version);
        self.publish_version(version);
        version
    }

    /// Uncommitted write currently held on a row
    pub fn intent(&self, counter: &CounterName) -> Option<WriteIntent> {
        self.intents.get(counter).map(|i| *i)
    }

    /// Take or refresh the intent on a row for `txn_id`
    ///
    /// # Errors
    /// Returns the intent of the other transaction holding the row.
    pub fn acquire_intent(
        &self,
        counter: &CounterName,
        txn_id: u64,
        value: i64,
    ) -> Result<(), WriteIntent> {
        match self.intents.entry(counter.clone()) {
            Entry::Occupied(mut e) => {
                if e.get().txn_id == txn_id {
                    e.get_mut().value = value;
                    Ok(())
                } else {
                    Err(*e.get())
                }
            }
            Entry::Vacant(e) => {
                e.insert(WriteIntent { txn_id, value });
                Ok(())
            }
        }
    }

    /// Drop every intent owned by `txn_id` on the given rows
    pub fn release_intents<'a>(&self, txn_id: u64, counters: impl IntoIterator<Item = &'a CounterName>) {
        for counter in counters {
            self.intents.remove_if(counter, |_, intent| intent.txn_id == txn_id);
        }
    }

    /// Number of rows with at least one committed version
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of versions kept for a row
    pub fn history_len(&self, counter: &CounterName) -> usize {
        self.rows.get(counter).map(|chain| chain.len()).unwrap_or(0)
    }
}
