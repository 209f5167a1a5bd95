//! Transaction context
//!
//! TransactionContext tracks the reads and writes of one transaction so the
//! isolation rules can be checked on every write and again at commit.
//!
//! # Read-Your-Writes Semantics
//!
//! A read first consults the transaction's own write set; only then does it
//! go to the store, where [`resolve`](crate::visibility::resolve) applies the
//! isolation level.
//!
//! # Snapshot
//!
//! The snapshot version is taken lazily, at the first statement, not when the
//! context is created. A session can therefore sit open while another session
//! commits and still read that commit, as long as it has not issued a
//! statement yet.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use tally_core::{CounterName, Error, IsolationLevel, Result, Version};
use tally_storage::VersionedStore;

use crate::validation::{check_concurrent_update, ConflictType, ValidationResult};
use crate::visibility::{resolve, IsolationPolicy, Visible};

/// Error type for commit failures
#[derive(Debug, Clone)]
pub enum CommitError {
    /// Transaction aborted due to validation conflicts
    ValidationFailed(ValidationResult),

    /// Transaction was not in correct state for commit
    ///
    /// Commit requires Active state to transition to Validating
    InvalidState(String),
}

impl std::fmt::Display for CommitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommitError::ValidationFailed(result) => {
                write!(f, "Commit failed: {} conflict(s)", result.conflict_count())
            }
            CommitError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
        }
    }
}

impl std::error::Error for CommitError {}

impl From<CommitError> for Error {
    fn from(e: CommitError) -> Self {
        match e {
            CommitError::ValidationFailed(result) => match result.conflicts.into_iter().next() {
                Some(conflict) => conflict.into(),
                None => Error::InvalidOperation("validation failed without conflicts".to_string()),
            },
            CommitError::InvalidState(msg) => Error::InvalidOperation(msg),
        }
    }
}

/// Status of a transaction in its lifecycle
///
/// State transitions:
/// - `Active` → `Validating` (begin commit)
/// - `Validating` → `Committed` (validation passed)
/// - `Validating` → `Aborted` (conflict detected)
/// - `Active` → `Aborted` (write conflict, rollback)
///
/// Terminal states (no transitions allowed):
/// - `Committed`
/// - `Aborted`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Transaction is executing, can read/write
    Active,
    /// Transaction is being validated for conflicts
    Validating,
    /// Transaction committed successfully
    Committed,
    /// Transaction was aborted
    Aborted {
        /// Human-readable reason for abort
        reason: String,
    },
}

/// Whether a write may create the row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Overwrite an existing row only
    Update,
    /// Insert the row if absent, overwrite otherwise
    Upsert,
}

/// Transaction context for one transaction on the in-memory engine
pub struct TransactionContext {
    /// Unique transaction ID
    pub txn_id: u64,
    /// Isolation level fixed at begin
    pub isolation: IsolationLevel,

    /// Version observed by the first statement
    ///
    /// Repeatable read and serializable read at this version for the rest of
    /// the transaction.
    snapshot_version: Option<Version>,

    /// Rows read from the store and the version read
    ///
    /// Version 0 means the row did not exist when read.
    pub read_set: HashMap<CounterName, Version>,

    /// Rows written with their new values (buffered until commit)
    pub write_set: BTreeMap<CounterName, i64>,

    /// Current transaction status
    pub status: TransactionStatus,

    start_time: Instant,
}

impl TransactionContext {
    /// Create a new active transaction context
    ///
    /// # Example
    ///
    /// ```
    /// use tally_concurrency::TransactionContext;
    /// use tally_core::IsolationLevel;
    ///
    /// let txn = TransactionContext::new(1, IsolationLevel::Serializable);
    /// assert!(txn.is_active());
    /// assert!(txn.snapshot_version().is_none());
    /// ```
    pub fn new(txn_id: u64, isolation: IsolationLevel) -> Self {
        TransactionContext {
            txn_id,
            isolation,
            snapshot_version: None,
            read_set: HashMap::new(),
            write_set: BTreeMap::new(),
            status: TransactionStatus::Active,
            start_time: Instant::now(),
        }
    }

    /// Snapshot version, once the first statement has run
    pub fn snapshot_version(&self) -> Option<Version> {
        self.snapshot_version
    }

    /// Version the current statement reads at
    fn statement_snapshot(&mut self, store: &VersionedStore) -> Version {
        let now = store.current_version();
        let first = *self.snapshot_version.get_or_insert(now);
        if self.isolation.uses_transaction_snapshot() {
            first
        } else {
            now
        }
    }

    // === Read Operations ===

    /// Read a counter within the transaction
    ///
    /// # Errors
    /// Returns `Error::TransactionAborted` if the transaction already failed.
    pub fn get(
        &mut self,
        store: &VersionedStore,
        counter: &CounterName,
        policy: &IsolationPolicy,
    ) -> Result<Option<i64>> {
        self.ensure_active()?;

        if let Some(value) = self.write_set.get(counter) {
            return Ok(Some(*value));
        }

        let snapshot = self.statement_snapshot(store);
        match resolve(store, counter, self.isolation, snapshot, self.txn_id, policy) {
            Visible::Uncommitted(intent) => {
                debug!(
                    txn_id = self.txn_id,
                    counter = %counter,
                    writer_txn = intent.txn_id,
                    value = intent.value,
                    "dirty read"
                );
                Ok(Some(intent.value))
            }
            Visible::Committed(vv) => {
                self.read_set.insert(counter.clone(), vv.version);
                debug!(
                    txn_id = self.txn_id,
                    counter = %counter,
                    value = vv.value,
                    version = vv.version.as_u64(),
                    "read"
                );
                Ok(Some(vv.value))
            }
            Visible::Absent => {
                self.read_set.insert(counter.clone(), Version::ZERO);
                Ok(None)
            }
        }
    }

    /// Get the version that was read for a counter (from read_set)
    pub fn get_read_version(&self, counter: &CounterName) -> Option<Version> {
        self.read_set.get(counter).copied()
    }

    // === Write Operations ===

    /// Write a counter within the transaction
    ///
    /// The value becomes a write intent in the store: it locks the row and is
    /// visible to dirty readers, but is not committed.
    ///
    /// Returns the stored value, or `None` for an [`WriteMode::Update`] of a
    /// row that does not exist.
    ///
    /// # Errors
    /// A write conflict aborts the transaction and is returned as
    /// `Error::WriteConflict`.
    pub fn put(
        &mut self,
        store: &VersionedStore,
        counter: &CounterName,
        value: i64,
        mode: WriteMode,
        policy: &IsolationPolicy,
    ) -> Result<Option<i64>> {
        self.ensure_active()?;
        let snapshot = self.statement_snapshot(store);
        let already_written = self.write_set.contains_key(counter);

        if mode == WriteMode::Update && !already_written && store.get_latest(counter).is_none() {
            return Ok(None);
        }

        if let Err(holder) = store.acquire_intent(counter, self.txn_id, value) {
            return Err(self.fail(store, ConflictType::row_locked(counter, holder)));
        }

        // Checked under the intent: a writer that held the row until now has
        // already applied its version.
        if !already_written && policy.rejects_concurrent_update(self.isolation) {
            if let Some(conflict) = check_concurrent_update(counter, snapshot, store) {
                store.release_intents(self.txn_id, std::iter::once(counter));
                return Err(self.fail(store, conflict));
            }
        }

        self.write_set.insert(counter.clone(), value);
        debug!(txn_id = self.txn_id, counter = %counter, value, "write");
        Ok(Some(value))
    }

    /// Abort on a conflict, returning the error to surface
    fn fail(&mut self, store: &VersionedStore, conflict: ConflictType) -> Error {
        let err: Error = conflict.into();
        warn!(
            txn_id = self.txn_id,
            isolation = %self.isolation,
            error = %err,
            "transaction aborted by write conflict"
        );
        self.abort(store, err.to_string());
        err
    }

    /// Release every write intent and mark the transaction aborted
    ///
    /// Buffered writes are discarded.
    pub fn abort(&mut self, store: &VersionedStore, reason: String) {
        store.release_intents(self.txn_id, self.write_set.keys());
        self.write_set.clear();
        self.status = TransactionStatus::Aborted { reason };
    }

    // === State Management ===

    /// Fail unless the transaction can accept statements
    pub fn ensure_active(&self) -> Result<()> {
        match &self.status {
            TransactionStatus::Active => Ok(()),
            TransactionStatus::Aborted { reason } => Err(Error::TransactionAborted {
                reason: reason.clone(),
            }),
            other => Err(Error::InvalidOperation(format!(
                "transaction {} is {:?}",
                self.txn_id, other
            ))),
        }
    }

    /// Transition `Active` → `Validating`
    pub fn mark_validating(&mut self) -> std::result::Result<(), CommitError> {
        match &self.status {
            TransactionStatus::Active => {
                self.status = TransactionStatus::Validating;
                Ok(())
            }
            other => Err(CommitError::InvalidState(format!(
                "cannot commit transaction {} in state {:?}",
                self.txn_id, other
            ))),
        }
    }

    /// Transition `Validating` → `Committed`
    pub fn mark_committed(&mut self) {
        debug_assert_eq!(self.status, TransactionStatus::Validating);
        self.status = TransactionStatus::Committed;
    }

    /// Check if transaction is in Active state
    pub fn is_active(&self) -> bool {
        matches!(self.status, TransactionStatus::Active)
    }

    /// Check if transaction is committed
    pub fn is_committed(&self) -> bool {
        matches!(self.status, TransactionStatus::Committed)
    }

    /// Check if transaction is aborted
    pub fn is_aborted(&self) -> bool {
        matches!(self.status, TransactionStatus::Aborted { .. })
    }

    /// Reason the transaction was aborted
    pub fn abort_reason(&self) -> Option<&str> {
        match &self.status {
            TransactionStatus::Aborted { reason } => Some(reason),
            _ => None,
        }
    }

    /// Whether the transaction has written nothing
    pub fn is_read_only(&self) -> bool {
        self.write_set.is_empty()
    }

    /// Time since the context was created
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl std::fmt::Debug for TransactionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionContext")
            .field("txn_id", &self.txn_id)
            .field("isolation", &self.isolation)
            .field("snapshot_version", &self.snapshot_version)
            .field("reads", &self.read_set.len())
            .field("writes", &self.write_set.len())
            .field("status", &self.status)
            .finish()
    }
}
