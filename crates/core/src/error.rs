//! Error types for tally
//!
//! One error enum is shared by every crate. Write conflicts are an ordinary
//! variant so callers can branch on them with `is_write_conflict()` instead of
//! unwinding.

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type alias for tally operations
pub type Result<T> = std::result::Result<T, Error>;

/// Why a store refused a write or a commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictKind {
    /// The row was committed by another transaction after this transaction's snapshot
    ConcurrentUpdate,
    /// A row read by this transaction changed before it could commit
    StaleRead,
    /// Another open transaction holds an uncommitted write on the row
    RowLocked,
    /// The external store reported it was busy or its snapshot went stale
    StoreBusy,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConflictKind::ConcurrentUpdate => "could not serialize access due to concurrent update",
            ConflictKind::StaleRead => "could not serialize access due to read/write dependencies",
            ConflictKind::RowLocked => "row is locked by another open transaction",
            ConflictKind::StoreBusy => "store is busy",
        };
        f.write_str(s)
    }
}

/// Error types for tally
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid isolation token, flag combination or config file
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Store could not be reached when opening a connection
    #[error("connection failed: {0}")]
    Connection(String),

    /// Store refused a write or commit to uphold the isolation guarantee
    #[error("write conflict on counter '{counter}': {kind}{}", detail_suffix(.detail))]
    WriteConflict {
        /// Counter the conflict was detected on
        counter: String,
        /// Conflict classification
        kind: ConflictKind,
        /// Store-specific detail, may be empty
        detail: String,
    },

    /// Counter row does not exist (store not initialized)
    #[error("counter not found: {0}")]
    CounterNotFound(String),

    /// Statement issued inside a transaction that already failed
    #[error("current transaction is aborted, commands ignored until end of transaction block: {reason}")]
    TransactionAborted {
        /// Why the transaction was aborted
        reason: String,
    },

    /// Invalid operation or state
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Storage layer error
    #[error("storage error: {0}")]
    Storage(String),

    /// I/O error (config files, database files)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

fn detail_suffix(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!(" ({})", detail)
    }
}

impl Error {
    /// Build a write-conflict error
    pub fn write_conflict(
        counter: impl Into<String>,
        kind: ConflictKind,
        detail: impl Into<String>,
    ) -> Self {
        Error::WriteConflict {
            counter: counter.into(),
            kind,
            detail: detail.into(),
        }
    }

    /// Whether this is the conflict class scenarios are designed to provoke
    pub fn is_write_conflict(&self) -> bool {
        matches!(self, Error::WriteConflict { .. })
    }

    /// Conflict classification, if this is a write conflict
    pub fn conflict_kind(&self) -> Option<ConflictKind> {
        match self {
            Error::WriteConflict { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether the error was raised before any store interaction
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_conflict_display() {
        let err = Error::write_conflict("a", ConflictKind::ConcurrentUpdate, "");
        let msg = err.to_string();
        assert!(msg.contains("write conflict on counter 'a'"));
        assert!(msg.contains("concurrent update"));
        assert!(!msg.contains("()"));
    }

    #[test]
    fn test_write_conflict_display_with_detail() {
        let err = Error::write_conflict("a", ConflictKind::RowLocked, "held by txn 4");
        assert!(err.to_string().ends_with("(held by txn 4)"));
    }

    #[test]
    fn test_is_write_conflict() {
        let err = Error::write_conflict("a", ConflictKind::StaleRead, "");
        assert!(err.is_write_conflict());
        assert_eq!(err.conflict_kind(), Some(ConflictKind::StaleRead));

        let err = Error::CounterNotFound("a".to_string());
        assert!(!err.is_write_conflict());
        assert_eq!(err.conflict_kind(), None);
    }

    #[test]
    fn test_transaction_aborted_display() {
        let err = Error::TransactionAborted {
            reason: "conflict".to_string(),
        };
        assert!(err.to_string().contains("current transaction is aborted"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_config());
    }
}
