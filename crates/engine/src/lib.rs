//! Scenario engine for tally
//!
//! This crate ties the lower layers together:
//! - Database: the in-memory MVCC store and its connections
//! - StoreConfig: backend and isolation knobs from `tally.toml`
//! - Counter / TransactionSession: the statements one actor issues
//! - Scenario: the serialized and interleaved runs, and their report
//! - SqliteStore (feature `sqlite`): the same contract over a SQLite file

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod counter;
pub mod database;
pub mod scenario;
pub mod session;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use counter::Counter;
pub use database::{Backend, Connection, Database, StoreConfig, CONFIG_ENV};
pub use scenario::{
    ConflictReport, ConflictStage, Mode, Outcome, Scenario, ScenarioConfig, ScenarioReport,
    ScenarioStep, StepAction,
};
pub use session::{SessionLabel, SessionState, TransactionSession};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteConnection, SqliteStore};

pub use tally_concurrency::{IsolationPolicy, RepeatableReadPolicy};
