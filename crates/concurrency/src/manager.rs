//! Transaction manager for coordinating commit operations
//!
//! ## Commit Sequence
//!
//! ```text
//! 1. take the commit lock
//! 2. mark_validating() - Active → Validating
//! 3. serializable writers only: validate_read_set() - IF conflicts: abort and return error
//! 4. allocate commit version (current + 1)
//! 5. apply every buffered write at that version
//! 6. publish the version (VISIBILITY POINT)
//! 7. release write intents, mark_committed()
//! ```
//!
//! Read-only transactions skip steps 3 to 6 and do not consume a version: they
//! are consistent at their snapshot whatever committed since.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use tally_core::{IsolationLevel, Version};
use tally_storage::VersionedStore;

use crate::transaction::{CommitError, TransactionContext};
use crate::validation::validate_read_set;
use crate::visibility::IsolationPolicy;

/// Manages transaction lifecycle and atomic commits
pub struct TransactionManager {
    /// Next transaction ID
    next_txn_id: AtomicU64,

    /// Serializes validation and version allocation
    commit_lock: Mutex<()>,

    /// Committed transactions, read-only ones included
    commits: AtomicU64,

    /// Transactions refused at commit or aborted through [`abort`](Self::abort)
    aborts: AtomicU64,
}

impl TransactionManager {
    /// Create a new transaction manager
    pub fn new() -> Self {
        TransactionManager {
            next_txn_id: AtomicU64::new(1),
            commit_lock: Mutex::new(()),
            commits: AtomicU64::new(0),
            aborts: AtomicU64::new(0),
        }
    }

    /// Allocate next transaction ID
    pub fn next_txn_id(&self) -> u64 {
        self.next_txn_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Start a transaction
    ///
    /// No snapshot is taken here; see [`TransactionContext`].
    pub fn begin(&self, isolation: IsolationLevel) -> TransactionContext {
        let txn = TransactionContext::new(self.next_txn_id(), isolation);
        debug!(txn_id = txn.txn_id, isolation = %isolation, "begin");
        txn
    }

    /// Commit a transaction atomically
    ///
    /// # Returns
    /// - `Ok(Some(version))` if writes were applied at `version`
    /// - `Ok(None)` for a read-only transaction
    /// - `Err(CommitError)` if validation fails; the transaction is aborted
    ///   and its intents released
    pub fn commit(
        &self,
        txn: &mut TransactionContext,
        store: &VersionedStore,
        policy: &IsolationPolicy,
    ) -> Result<Option<Version>, CommitError> {
        let _guard = self.commit_lock.lock();

        txn.mark_validating()?;

        if !txn.is_read_only() && policy.validates_read_set(txn.isolation) {
            let result = validate_read_set(&txn.read_set, store);
            if !result.is_valid() {
                warn!(
                    txn_id = txn.txn_id,
                    conflicts = result.conflict_count(),
                    "commit validation failed"
                );
                txn.abort(
                    store,
                    format!("validation failed: {} conflict(s)", result.conflict_count()),
                );
                self.aborts.fetch_add(1, Ordering::Relaxed);
                return Err(CommitError::ValidationFailed(result));
            }
        }

        if txn.is_read_only() {
            txn.mark_committed();
            self.commits.fetch_add(1, Ordering::Relaxed);
            debug!(txn_id = txn.txn_id, "read-only commit");
            return Ok(None);
        }

        let commit_version = Version::new(store.current_version().as_u64() + 1);
        for (counter, value) in &txn.write_set {
            store.apply(counter, *value, commit_version);
        }
        store.publish_version(commit_version);
        store.release_intents(txn.txn_id, txn.write_set.keys());
        txn.mark_committed();
        self.commits.fetch_add(1, Ordering::Relaxed);

        info!(
            txn_id = txn.txn_id,
            isolation = %txn.isolation,
            version = commit_version.as_u64(),
            writes = txn.write_set.len(),
            "commit"
        );
        Ok(Some(commit_version))
    }

    /// Explicitly abort a transaction
    ///
    /// All buffered writes are discarded and their intents released.
    pub fn abort(&self, txn: &mut TransactionContext, store: &VersionedStore, reason: String) {
        if txn.is_committed() || txn.is_aborted() {
            return;
        }
        debug!(txn_id = txn.txn_id, reason = %reason, "rollback");
        txn.abort(store, reason);
        self.aborts.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of committed transactions
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Number of transactions aborted through this manager
    pub fn abort_count(&self) -> u64 {
        self.aborts.load(Ordering::Relaxed)
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}
