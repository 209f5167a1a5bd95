//! SQLite-backed store
//!
//! The counter lives in a `counter (name TEXT PRIMARY KEY, value INTEGER)`
//! table in a WAL-mode database file. Each connection runs deferred
//! transactions opened at the first statement, so a read-only prefix does
//! not lock anything.
//!
//! SQLite has one isolation level: every transaction is serializable. The
//! requested level is recorded for narration only. A writer whose read
//! snapshot went stale gets `SQLITE_BUSY_SNAPSHOT` immediately; with the busy
//! timeout at zero, a writer blocked by another writer gets `SQLITE_BUSY`.
//! Both surface as a [`ConflictKind::StoreBusy`] write conflict.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, ErrorCode, OptionalExtension};
use tracing::{debug, info, warn};

use tally_core::{
    CommitOutcome, ConflictKind, CounterName, Error, IsolationLevel, Result, StoreConnection,
    TransactionalStore,
};

const CREATE_TABLE: &str =
    "CREATE TABLE IF NOT EXISTS counter (name TEXT PRIMARY KEY, value INTEGER NOT NULL)";
const SELECT_VALUE: &str = "SELECT value FROM counter WHERE name = ?1";
const UPSERT_VALUE: &str = "INSERT INTO counter (name, value) VALUES (?1, ?2) \
     ON CONFLICT(name) DO UPDATE SET value = excluded.value RETURNING value";
const UPDATE_VALUE: &str = "UPDATE counter SET value = ?2 WHERE name = ?1 RETURNING value";

/// A SQLite database file holding the counter table
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    /// Open (or create) the database, switch it to WAL and create the table
    ///
    /// # Errors
    /// `Error::Connection` if the file cannot be opened or prepared.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = open_raw(&path)?;

        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "wal", |row| row.get(0))
            .map_err(|e| connection_error(&path, e))?;
        if !mode.eq_ignore_ascii_case("wal") {
            warn!(path = %path.display(), journal_mode = %mode, "WAL not available");
        }
        conn.execute(CREATE_TABLE, [])
            .map_err(|e| connection_error(&path, e))?;

        info!(path = %path.display(), journal_mode = %mode, "opened sqlite store");
        Ok(SqliteStore { path })
    }

    /// Database file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TransactionalStore for SqliteStore {
    type Connection = SqliteConnection;

    fn connect(&self) -> Result<SqliteConnection> {
        let conn = open_raw(&self.path)?;
        conn.busy_timeout(Duration::ZERO)
            .map_err(|e| connection_error(&self.path, e))?;
        Ok(SqliteConnection {
            conn,
            isolation: IsolationLevel::Serializable,
            state: TxnState::Idle,
            last_counter: None,
        })
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

fn open_raw(path: &Path) -> Result<rusqlite::Connection> {
    rusqlite::Connection::open(path).map_err(|e| connection_error(path, e))
}

fn connection_error(path: &Path, e: rusqlite::Error) -> Error {
    Error::Connection(format!("{}: {}", path.display(), e))
}

/// Map a statement failure: lock and snapshot errors are write conflicts
fn statement_error(counter: &CounterName, e: rusqlite::Error) -> Error {
    match e.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
            Error::write_conflict(counter.as_str(), ConflictKind::StoreBusy, e.to_string())
        }
        _ => Error::Storage(e.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TxnState {
    Idle,
    Open,
    Failed(String),
}

/// One SQLite connection with an implicitly started transaction
pub struct SqliteConnection {
    conn: rusqlite::Connection,
    isolation: IsolationLevel,
    state: TxnState,
    /// Row of the latest statement, named in commit-time conflicts
    last_counter: Option<CounterName>,
}

impl SqliteConnection {
    /// Begin a deferred transaction unless one is open; refuse statements after a failure
    fn begin(&mut self) -> Result<()> {
        match &self.state {
            TxnState::Open => Ok(()),
            TxnState::Failed(reason) => Err(Error::TransactionAborted {
                reason: reason.clone(),
            }),
            TxnState::Idle => {
                self.conn
                    .execute_batch("BEGIN DEFERRED")
                    .map_err(|e| Error::Storage(e.to_string()))?;
                self.state = TxnState::Open;
                Ok(())
            }
        }
    }

    /// Run one statement inside the transaction; any error fails the transaction
    fn statement<T>(
        &mut self,
        counter: &CounterName,
        f: impl FnOnce(&rusqlite::Connection) -> rusqlite::Result<T>,
    ) -> Result<T> {
        self.begin()?;
        self.last_counter = Some(counter.clone());
        f(&self.conn).map_err(|e| {
            let err = statement_error(counter, e);
            warn!(counter = %counter, error = %err, "statement failed, transaction aborted");
            self.state = TxnState::Failed(err.to_string());
            err
        })
    }

    /// Map a failed COMMIT and roll the transaction back
    fn commit_failed(&mut self, e: rusqlite::Error) -> Error {
        let counter = self.last_counter.clone().unwrap_or_default();
        let err = statement_error(&counter, e);
        if let Err(rb) = self.end("ROLLBACK") {
            warn!(error = %rb, "rollback after failed commit");
        }
        err
    }

    fn end(&mut self, sql: &str) -> rusqlite::Result<()> {
        self.state = TxnState::Idle;
        self.last_counter = None;
        if self.conn.is_autocommit() {
            return Ok(());
        }
        self.conn.execute_batch(sql)
    }
}

impl StoreConnection for SqliteConnection {
    fn set_isolation_level(&mut self, level: IsolationLevel) -> Result<()> {
        if self.state != TxnState::Idle {
            return Err(Error::InvalidOperation(
                "cannot change isolation level inside an open transaction".to_string(),
            ));
        }
        if level != IsolationLevel::Serializable {
            debug!(requested = %level, "sqlite runs every transaction as serializable");
        }
        self.isolation = level;
        Ok(())
    }

    fn isolation_level(&self) -> IsolationLevel {
        self.isolation
    }

    fn in_transaction(&self) -> bool {
        self.state != TxnState::Idle
    }

    fn read(&mut self, counter: &CounterName) -> Result<Option<i64>> {
        self.statement(counter, |conn| {
            conn.query_row(SELECT_VALUE, params![counter.as_str()], |row| row.get(0))
                .optional()
        })
    }

    fn upsert(&mut self, counter: &CounterName, value: i64) -> Result<i64> {
        self.statement(counter, |conn| {
            conn.query_row(UPSERT_VALUE, params![counter.as_str(), value], |row| row.get(0))
        })
    }

    fn update(&mut self, counter: &CounterName, value: i64) -> Result<Option<i64>> {
        self.statement(counter, |conn| {
            conn.query_row(UPDATE_VALUE, params![counter.as_str(), value], |row| row.get(0))
                .optional()
        })
    }

    fn commit(&mut self) -> Result<CommitOutcome> {
        match std::mem::replace(&mut self.state, TxnState::Idle) {
            TxnState::Idle => Ok(CommitOutcome::Committed),
            TxnState::Failed(reason) => {
                debug!(reason = %reason, "commit of failed transaction rolled back");
                self.end("ROLLBACK")
                    .map_err(|e| Error::Storage(e.to_string()))?;
                Ok(CommitOutcome::RolledBack)
            }
            TxnState::Open => match self.conn.execute_batch("COMMIT") {
                Ok(()) => Ok(CommitOutcome::Committed),
                Err(e) => Err(self.commit_failed(e)),
            },
        }
    }

    fn rollback(&mut self) -> Result<()> {
        self.end("ROLLBACK")
            .map_err(|e| Error::Storage(e.to_string()))
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        if let Err(e) = self.end("ROLLBACK") {
            debug!(error = %e, "rollback on close");
        }
    }
}
