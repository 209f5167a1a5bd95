//! Transaction session: one connection, one counter, one isolation level
//!
//! State transitions:
//! - `Idle` → `Open` (first statement)
//! - `Open` → `Idle` (commit, rollback)
//! - `Open` → `Aborted` (write conflict)
//! - `Aborted` → `Idle` (commit reports `RolledBack`, or rollback)

use std::fmt;

use tally_core::{
    CommitOutcome, Error, IsolationLevel, Result, StoreConnection, TransactionalStore,
};
use tracing::{debug, warn};

use crate::counter::Counter;

/// Which actor a session plays in a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionLabel {
    /// First incrementing transaction
    A,
    /// Second incrementing transaction
    B,
    /// Fresh session that reads the final value
    Observer,
}

impl fmt::Display for SessionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionLabel::A => "T1",
            SessionLabel::B => "T2",
            SessionLabel::Observer => "T3",
        })
    }
}

/// Transaction state as seen by the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No open transaction
    Idle,
    /// A transaction is open and accepting statements
    Open,
    /// The store aborted the transaction; it must be committed or rolled back
    Aborted,
}

/// A labelled connection operating on one counter
pub struct TransactionSession<C: StoreConnection> {
    label: SessionLabel,
    counter: Counter,
    conn: C,
    state: SessionState,
}

impl<C: StoreConnection> TransactionSession<C> {
    /// Wrap an existing connection
    pub fn new(label: SessionLabel, counter: Counter, conn: C) -> Self {
        TransactionSession {
            label,
            counter,
            conn,
            state: SessionState::Idle,
        }
    }

    /// Connect to `store` and set the isolation level before any transaction begins
    pub fn open<S>(store: &S, label: SessionLabel, isolation: IsolationLevel, counter: Counter) -> Result<Self>
    where
        S: TransactionalStore<Connection = C>,
    {
        let mut conn = store.connect()?;
        conn.set_isolation_level(isolation)?;
        debug!(session = %label, isolation = %isolation, backend = store.backend_name(), "session opened");
        Ok(Self::new(label, counter, conn))
    }

    /// Session label
    pub fn label(&self) -> SessionLabel {
        self.label
    }

    /// Current transaction state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Isolation level of the underlying connection
    pub fn isolation_level(&self) -> IsolationLevel {
        self.conn.isolation_level()
    }

    /// Upsert the counter to `baseline` and commit
    pub fn initialize(&mut self, baseline: i64) -> Result<i64> {
        let result = self.counter.initialize(&mut self.conn, baseline);
        self.state = if self.conn.in_transaction() {
            SessionState::Aborted
        } else {
            SessionState::Idle
        };
        result
    }

    /// Read the counter inside the session's transaction
    pub fn read(&mut self) -> Result<i64> {
        let result = self.counter.read(&mut self.conn);
        self.track(result)
    }

    /// Write the counter inside the session's transaction
    pub fn update(&mut self, value: i64) -> Result<i64> {
        let result = self.counter.update(&mut self.conn, value);
        self.track(result)
    }

    /// End the transaction
    ///
    /// An aborted transaction is discarded and reported as `RolledBack`. A
    /// conflict detected at commit time is returned as an error; the
    /// transaction is over either way.
    pub fn commit(&mut self) -> Result<CommitOutcome> {
        let result = self.conn.commit();
        self.state = SessionState::Idle;
        match &result {
            Ok(outcome) => debug!(session = %self.label, outcome = ?outcome, "commit"),
            Err(e) => warn!(session = %self.label, error = %e, "commit failed"),
        }
        result
    }

    /// Discard the transaction
    pub fn rollback(&mut self) -> Result<()> {
        let result = self.conn.rollback();
        self.state = SessionState::Idle;
        result
    }

    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => self.state = SessionState::Open,
            Err(e) if e.is_write_conflict() || matches!(e, Error::TransactionAborted { .. }) => {
                self.state = SessionState::Aborted;
            }
            Err(_) if !self.conn.in_transaction() => self.state = SessionState::Idle,
            Err(_) => {}
        }
        result
    }
}

impl<C: StoreConnection> fmt::Debug for TransactionSession<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionSession")
            .field("label", &self.label)
            .field("counter", self.counter.name())
            .field("isolation", &self.conn.isolation_level())
            .field("state", &self.state)
            .finish()
    }
}
