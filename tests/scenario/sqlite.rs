//! Scenario against the SQLite backend
//!
//! SQLite runs every transaction as serializable, so the requested level
//! does not change the interleaved outcome: T2's write finds its snapshot
//! stale and is refused.

use tally::SqliteStore;
use tempfile::TempDir;

use crate::common::*;

fn store(dir: &TempDir) -> SqliteStore {
    SqliteStore::open(dir.path().join("tally.db")).unwrap()
}

#[test]
fn serialized_adds_two() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    for level in IsolationLevel::ALL {
        let report = run_on(&store, ScenarioConfig::new(level, Mode::Serialized));
        assert_eq!(report.backend, "sqlite");
        assert_eq!(report.final_value, 3, "level {}", level);
        assert!(report.conflict.is_none());
    }
}

#[test]
fn interleaved_refuses_second_write() {
    let dir = TempDir::new().unwrap();
    let store = store(&dir);
    for level in IsolationLevel::ALL {
        let report = run_on(&store, ScenarioConfig::new(level, Mode::Interleaved));
        let conflict = report.conflict.as_ref().expect("T2 must conflict");
        assert_eq!(conflict.kind, ConflictKind::StoreBusy);
        assert_eq!(report.final_value, 2, "level {}", level);
        assert_eq!(report.outcome(), Outcome::ConflictDetected);
    }
}

#[test]
fn data_survives_reopen() {
    let dir = TempDir::new().unwrap();
    run_on(
        &store(&dir),
        ScenarioConfig::new(IsolationLevel::Serializable, Mode::Serialized).with_baseline(10),
    );

    let reopened = store(&dir);
    let mut conn = reopened.connect().unwrap();
    assert_eq!(Counter::default().read(&mut conn).unwrap(), 12);
}
