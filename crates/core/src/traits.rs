//! Store capability contract
//!
//! The scenario runner needs very little from a store: open a connection,
//! pick an isolation level, run parameterized read/upsert/update statements
//! inside an implicitly started transaction, commit or roll back, and report
//! write conflicts as [`Error::WriteConflict`](crate::Error::WriteConflict).
//!
//! Transactions begin implicitly at the first statement after the previous
//! commit or rollback, the way a client driver behaves with autocommit off.

use crate::error::Result;
use crate::types::{CounterName, IsolationLevel};

/// How a call to [`StoreConnection::commit`] ended the transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The transaction's writes are now visible to other transactions
    Committed,
    /// The transaction had already failed; its effects were discarded
    RolledBack,
}

/// A transactional store holding counter rows
pub trait TransactionalStore: Send + Sync {
    /// Connection type produced by [`connect`](TransactionalStore::connect)
    type Connection: StoreConnection;

    /// Open a new connection
    ///
    /// # Errors
    /// [`Error::Connection`](crate::Error::Connection) if the store is unreachable.
    fn connect(&self) -> Result<Self::Connection>;

    /// Short backend name for narration and logs
    fn backend_name(&self) -> &'static str;
}

/// One connection, carrying at most one open transaction at a time
pub trait StoreConnection: Send {
    /// Isolation level applied to transactions started on this connection
    ///
    /// # Errors
    /// Fails if a transaction is already open.
    fn set_isolation_level(&mut self, level: IsolationLevel) -> Result<()>;

    /// Current isolation level
    fn isolation_level(&self) -> IsolationLevel;

    /// Whether a transaction is currently open (active or failed)
    fn in_transaction(&self) -> bool;

    /// Read the counter's value as visible to the current transaction
    ///
    /// Returns `Ok(None)` if the row does not exist.
    fn read(&mut self, counter: &CounterName) -> Result<Option<i64>>;

    /// Insert the row, or overwrite it if it exists; returns the stored value
    fn upsert(&mut self, counter: &CounterName, value: i64) -> Result<i64>;

    /// Overwrite an existing row; returns the stored value
    ///
    /// Returns `Ok(None)` if no row matched.
    fn update(&mut self, counter: &CounterName, value: i64) -> Result<Option<i64>>;

    /// Commit the open transaction
    ///
    /// Committing with no open transaction succeeds as a no-op. Committing a
    /// transaction that already failed discards it and returns
    /// [`CommitOutcome::RolledBack`].
    fn commit(&mut self) -> Result<CommitOutcome>;

    /// Discard the open transaction, if any
    fn rollback(&mut self) -> Result<()>;
}
