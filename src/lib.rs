//! tally - two transactions, one counter
//!
//! tally runs two transactions that each read a shared counter, add one and
//! commit, either one after the other or interleaved, at a chosen isolation
//! level. Depending on the level and the store, the second increment is
//! applied, silently lost, or refused with a write conflict.
//!
//! # Quick Start
//!
//! ```
//! use tally::{Database, IsolationLevel, Mode, Outcome, Scenario, ScenarioConfig};
//!
//! let db = Database::new();
//! let config = ScenarioConfig::new(IsolationLevel::Serializable, Mode::Interleaved);
//! let report = Scenario::new(&db, config).run()?;
//!
//! assert_eq!(report.final_value, 2);
//! assert_eq!(report.outcome(), Outcome::ConflictDetected);
//! # Ok::<(), tally::Error>(())
//! ```
//!
//! # Architecture
//!
//! Any store implementing [`TransactionalStore`] can host the scenario. The
//! bundled [`Database`] is an in-memory MVCC engine; with the `sqlite` feature,
//! `SqliteStore` runs the same scenario against a SQLite file.

pub use tally_core::*;
pub use tally_engine::*;
