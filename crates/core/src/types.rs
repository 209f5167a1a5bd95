//! Core value types: counter names, isolation levels, versions
//!
//! These types are shared by every layer. They carry no behavior beyond
//! parsing, ordering and display; visibility rules live in the concurrency
//! crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Name of the single well-known counter row used by scenarios.
pub const DEFAULT_COUNTER: &str = "a";

/// Baseline the counter is reset to before every scenario run.
pub const DEFAULT_BASELINE: i64 = 1;

/// Primary key of a counter row
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CounterName(String);

impl CounterName {
    /// Create a counter name
    pub fn new(name: impl Into<String>) -> Self {
        CounterName(name.into())
    }

    /// Borrow the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CounterName {
    fn default() -> Self {
        CounterName::new(DEFAULT_COUNTER)
    }
}

impl fmt::Display for CounterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transaction isolation level, applied to both sessions of a run.
///
/// Parsed from the short tokens used on the command line (`ru`, `rc`, `rr`,
/// `s`) as well as the spelled-out forms (`read-committed`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IsolationLevel {
    /// Dirty reads allowed: uncommitted writes of other transactions are visible
    ReadUncommitted,
    /// Each statement sees data committed before the statement began
    ReadCommitted,
    /// Every statement sees data committed before the transaction's first statement
    RepeatableRead,
    /// Outcome must match some serial order of the committed transactions
    Serializable,
}

impl IsolationLevel {
    /// All levels, weakest first
    pub const ALL: [IsolationLevel; 4] = [
        IsolationLevel::ReadUncommitted,
        IsolationLevel::ReadCommitted,
        IsolationLevel::RepeatableRead,
        IsolationLevel::Serializable,
    ];

    /// Command-line token for this level
    pub fn token(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "ru",
            IsolationLevel::ReadCommitted => "rc",
            IsolationLevel::RepeatableRead => "rr",
            IsolationLevel::Serializable => "s",
        }
    }

    /// SQL spelling, e.g. `READ COMMITTED`
    pub fn sql_name(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }

    /// Whether reads are served from a snapshot fixed at the first statement
    pub fn uses_transaction_snapshot(&self) -> bool {
        matches!(
            self,
            IsolationLevel::RepeatableRead | IsolationLevel::Serializable
        )
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

impl FromStr for IsolationLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "ru" | "read-uncommitted" => Ok(IsolationLevel::ReadUncommitted),
            "rc" | "read-committed" => Ok(IsolationLevel::ReadCommitted),
            "rr" | "repeatable-read" => Ok(IsolationLevel::RepeatableRead),
            "s" | "serializable" => Ok(IsolationLevel::Serializable),
            other => Err(Error::Config(format!(
                "unknown isolation level '{}', expected one of ru, rc, rr, s",
                other
            ))),
        }
    }
}

/// Commit version of a row
///
/// Versions come from a single global counter: every committing transaction
/// that writes allocates exactly one. Version 0 means "no such row".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Version(u64);

impl Version {
    /// The version of a row that does not exist
    pub const ZERO: Version = Version(0);

    /// Wrap a raw version number
    pub const fn new(v: u64) -> Self {
        Version(v)
    }

    /// Raw version number
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A committed counter value together with the version that wrote it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionedValue {
    /// Counter value
    pub value: i64,
    /// Commit version that produced `value`
    pub version: Version,
}

impl VersionedValue {
    /// Create a versioned value
    pub fn new(value: i64, version: Version) -> Self {
        Self { value, version }
    }
}
