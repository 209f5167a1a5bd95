//! Shared test utilities for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

pub use tally::{
    CommitOutcome, ConflictKind, ConflictStage, Counter, CounterName, Database, Error,
    IsolationLevel, IsolationPolicy, Mode, Outcome, RepeatableReadPolicy, Scenario,
    ScenarioConfig, ScenarioReport, SessionLabel, SessionState, StepAction, StoreConfig,
    StoreConnection, TransactionSession, TransactionalStore,
};

/// The two weak levels, where the second writer overwrites blindly.
pub const WEAK_LEVELS: [IsolationLevel; 2] = [
    IsolationLevel::ReadUncommitted,
    IsolationLevel::ReadCommitted,
];

/// Database whose repeatable read lets the second writer overwrite.
pub fn last_writer_wins_db() -> Database {
    Database::with_policy(IsolationPolicy {
        repeatable_read: RepeatableReadPolicy::LastWriterWins,
        dirty_reads: true,
    })
}

/// Run one scenario on `store`, panicking on error.
pub fn run_on<S: TransactionalStore>(store: &S, config: ScenarioConfig) -> ScenarioReport {
    Scenario::new(store, config.clone())
        .run()
        .unwrap_or_else(|e| panic!("scenario {:?} failed: {}", config, e))
}

/// Run one scenario on a fresh in-memory database.
pub fn run(isolation: IsolationLevel, mode: Mode) -> ScenarioReport {
    run_on(&Database::new(), ScenarioConfig::new(isolation, mode))
}

/// Open a labelled session on `db` at `isolation`.
pub fn session(
    db: &Database,
    label: SessionLabel,
    isolation: IsolationLevel,
) -> TransactionSession<tally::Connection> {
    TransactionSession::open(db, label, isolation, Counter::default())
        .expect("session should open")
}

/// Values observed by `label`'s reads, in order.
pub fn reads_of(report: &ScenarioReport, label: SessionLabel) -> Vec<i64> {
    report
        .steps_of(label)
        .filter(|s| s.action == StepAction::Read)
        .filter_map(|s| s.value)
        .collect()
}
