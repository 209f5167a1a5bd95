//! Database struct: the bundled in-memory store
//!
//! `Database` owns the versioned rows, the transaction manager and the
//! isolation policy, and hands out [`Connection`]s that implement the store
//! capability contract. Cloning a `Database` shares the same data.
//!
//! Nothing is persisted. Data lives as long as the last clone.

pub mod config;
mod connection;

pub use config::{Backend, StoreConfig, CONFIG_ENV};
pub use connection::Connection;

use std::sync::Arc;

use tally_concurrency::{IsolationPolicy, TransactionManager};
use tally_core::{CounterName, Result, TransactionalStore, Version};
use tally_storage::VersionedStore;
use tracing::info;

/// State shared by a database and all of its connections
pub(crate) struct DatabaseInner {
    pub(crate) store: VersionedStore,
    pub(crate) manager: TransactionManager,
    pub(crate) policy: IsolationPolicy,
}

/// In-memory MVCC database
///
/// # Example
///
/// ```
/// use tally_core::{CounterName, StoreConnection, TransactionalStore};
/// use tally_engine::Database;
///
/// let db = Database::new();
/// let mut conn = db.connect().unwrap();
/// conn.upsert(&CounterName::default(), 1).unwrap();
/// conn.commit().unwrap();
/// assert_eq!(db.committed_value(&CounterName::default()), Some(1));
/// ```
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

impl Database {
    /// Empty database with the default isolation policy
    pub fn new() -> Self {
        Self::with_policy(IsolationPolicy::default())
    }

    /// Empty database with explicit isolation knobs
    pub fn with_policy(policy: IsolationPolicy) -> Self {
        info!(
            repeatable_read = ?policy.repeatable_read,
            dirty_reads = policy.dirty_reads,
            "opened in-memory database"
        );
        Database {
            inner: Arc::new(DatabaseInner {
                store: VersionedStore::new(),
                manager: TransactionManager::new(),
                policy,
            }),
        }
    }

    /// Empty database configured from a [`StoreConfig`]
    pub fn from_config(config: &StoreConfig) -> Self {
        Self::with_policy(config.policy())
    }

    /// Isolation knobs in effect
    pub fn policy(&self) -> IsolationPolicy {
        self.inner.policy
    }

    /// Newest committed value of a counter, outside any transaction
    pub fn committed_value(&self, counter: &CounterName) -> Option<i64> {
        self.inner.store.get_latest(counter).map(|vv| vv.value)
    }

    /// Highest published commit version
    pub fn current_version(&self) -> Version {
        self.inner.store.current_version()
    }

    /// Whether an open transaction holds an uncommitted write on the counter
    pub fn is_locked(&self, counter: &CounterName) -> bool {
        self.inner.store.intent(counter).is_some()
    }

    /// Transactions committed so far
    pub fn commit_count(&self) -> u64 {
        self.inner.manager.commit_count()
    }

    /// Transactions rolled back, or refused at commit
    pub fn abort_count(&self) -> u64 {
        self.inner.manager.abort_count()
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("policy", &self.inner.policy)
            .field("version", &self.inner.store.current_version())
            .field("rows", &self.inner.store.row_count())
            .finish()
    }
}

impl TransactionalStore for Database {
    type Connection = Connection;

    fn connect(&self) -> Result<Connection> {
        Ok(Connection::new(Arc::clone(&self.inner)))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_concurrency::RepeatableReadPolicy;
    use tally_core::StoreConnection;

    #[test]
    fn clones_share_data() {
        let db = Database::new();
        let other = db.clone();

        let mut conn = db.connect().unwrap();
        conn.upsert(&CounterName::default(), 7).unwrap();
        conn.commit().unwrap();

        assert_eq!(other.committed_value(&CounterName::default()), Some(7));
        assert_eq!(other.commit_count(), 1);
    }

    #[test]
    fn from_config_applies_policy() {
        let config = StoreConfig {
            repeatable_read: RepeatableReadPolicy::LastWriterWins,
            dirty_reads: false,
            ..StoreConfig::default()
        };
        let db = Database::from_config(&config);
        assert_eq!(db.policy().repeatable_read, RepeatableReadPolicy::LastWriterWins);
        assert!(!db.policy().dirty_reads);
    }

    #[test]
    fn backend_name_is_memory() {
        assert_eq!(Database::new().backend_name(), "memory");
        assert_eq!(Database::new().current_version(), Version::ZERO);
    }
}
