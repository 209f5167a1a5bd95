//! Connection to the in-memory database
//!
//! A connection carries at most one [`TransactionContext`]. It is created by
//! the first statement after a commit or rollback and lives until the next
//! commit or rollback, including after a conflict aborted it: statements on
//! an aborted transaction fail with `Error::TransactionAborted` until the
//! caller ends it.

use std::sync::Arc;

use tally_concurrency::{TransactionContext, WriteMode};
use tally_core::{
    CommitOutcome, CounterName, Error, IsolationLevel, Result, StoreConnection,
};
use tracing::debug;

use super::DatabaseInner;

/// A connection to a [`Database`](super::Database)
pub struct Connection {
    db: Arc<DatabaseInner>,
    isolation: IsolationLevel,
    txn: Option<TransactionContext>,
}

impl Connection {
    pub(crate) fn new(db: Arc<DatabaseInner>) -> Self {
        Connection {
            db,
            isolation: IsolationLevel::ReadCommitted,
            txn: None,
        }
    }

    /// Open transaction, starting one if needed
    fn txn(&mut self) -> &mut TransactionContext {
        let db = &self.db;
        let isolation = self.isolation;
        self.txn.get_or_insert_with(|| db.manager.begin(isolation))
    }

    /// Id of the open transaction, if any
    pub fn txn_id(&self) -> Option<u64> {
        self.txn.as_ref().map(|t| t.txn_id)
    }

    fn write(&mut self, counter: &CounterName, value: i64, mode: WriteMode) -> Result<Option<i64>> {
        let db = Arc::clone(&self.db);
        self.txn().put(&db.store, counter, value, mode, &db.policy)
    }
}

impl StoreConnection for Connection {
    fn set_isolation_level(&mut self, level: IsolationLevel) -> Result<()> {
        if self.txn.is_some() {
            return Err(Error::InvalidOperation(
                "cannot change isolation level inside an open transaction".to_string(),
            ));
        }
        self.isolation = level;
        Ok(())
    }

    fn isolation_level(&self) -> IsolationLevel {
        self.isolation
    }

    fn in_transaction(&self) -> bool {
        self.txn.is_some()
    }

    fn read(&mut self, counter: &CounterName) -> Result<Option<i64>> {
        let db = Arc::clone(&self.db);
        self.txn().get(&db.store, counter, &db.policy)
    }

    fn upsert(&mut self, counter: &CounterName, value: i64) -> Result<i64> {
        self.write(counter, value, WriteMode::Upsert)?
            .ok_or_else(|| Error::Storage(format!("upsert of '{}' stored nothing", counter)))
    }

    fn update(&mut self, counter: &CounterName, value: i64) -> Result<Option<i64>> {
        self.write(counter, value, WriteMode::Update)
    }

    fn commit(&mut self) -> Result<CommitOutcome> {
        let Some(mut txn) = self.txn.take() else {
            return Ok(CommitOutcome::Committed);
        };

        if txn.is_aborted() {
            debug!(
                txn_id = txn.txn_id,
                reason = txn.abort_reason().unwrap_or_default(),
                "commit of aborted transaction rolled back"
            );
            return Ok(CommitOutcome::RolledBack);
        }

        self.db
            .manager
            .commit(&mut txn, &self.db.store, &self.db.policy)
            .map(|_| CommitOutcome::Committed)
            .map_err(Error::from)
    }

    fn rollback(&mut self) -> Result<()> {
        if let Some(mut txn) = self.txn.take() {
            self.db
                .manager
                .abort(&mut txn, &self.db.store, "rollback".to_string());
        }
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(mut txn) = self.txn.take() {
            self.db
                .manager
                .abort(&mut txn, &self.db.store, "connection closed".to_string());
        }
    }
}
