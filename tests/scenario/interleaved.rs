//! Interleaved execution
//!
//! Both transactions read before either writes. What happens to T2's
//! increment depends on the level:
//!
//! | level            | T2's increment                      |
//! |------------------|-------------------------------------|
//! | read uncommitted | overwrites T1's (lost update)       |
//! | read committed   | overwrites T1's (lost update)       |
//! | repeatable read  | refused, or overwrites (per policy) |
//! | serializable     | refused                             |

use crate::common::*;

#[test]
fn serializable_refuses_second_increment() {
    let report = run(IsolationLevel::Serializable, Mode::Interleaved);

    let conflict = report.conflict.as_ref().expect("T2 must conflict");
    assert_eq!(conflict.session, SessionLabel::B);
    assert!(matches!(
        conflict.kind,
        ConflictKind::ConcurrentUpdate | ConflictKind::StaleRead
    ));
    assert_eq!(report.final_value, report.initial_value + 1);
    assert_eq!(report.outcome(), Outcome::ConflictDetected);
}

#[test]
fn baseline_one_serializable_walkthrough() {
    let report = run(IsolationLevel::Serializable, Mode::Interleaved);

    assert_eq!(report.initial_value, 1);
    // T1 reads 1, writes 2, commits
    assert_eq!(reads_of(&report, SessionLabel::A), vec![1, 1]);
    let a_steps: Vec<_> = report.steps_of(SessionLabel::A).copied().collect();
    assert!(a_steps.contains(&tally::ScenarioStep {
        session: SessionLabel::A,
        action: StepAction::Update { requested: 2 },
        value: Some(2),
    }));
    // T2 reads 1, its write is refused and its commit rolls back
    assert_eq!(reads_of(&report, SessionLabel::B), vec![1]);
    let b_last = report.steps_of(SessionLabel::B).last().unwrap();
    assert_eq!(b_last.action, StepAction::Commit(CommitOutcome::RolledBack));
    assert_eq!(report.conflict.as_ref().unwrap().stage, ConflictStage::Update);
    assert_eq!(report.final_value, 2);
}

#[test]
fn weak_levels_lose_an_update() {
    for level in WEAK_LEVELS {
        let report = run(level, Mode::Interleaved);
        assert!(report.conflict.is_none(), "level {}", level);
        assert_eq!(report.final_value, report.initial_value + 1, "level {}", level);
        assert_eq!(report.outcome(), Outcome::LostUpdate);
        // T2 computed its value from the pre-T1 read
        assert_eq!(reads_of(&report, SessionLabel::B), vec![1]);
    }
}

#[test]
fn repeatable_read_first_updater_wins() {
    let report = run(IsolationLevel::RepeatableRead, Mode::Interleaved);
    let conflict = report.conflict.as_ref().unwrap();
    assert_eq!(conflict.kind, ConflictKind::ConcurrentUpdate);
    assert_eq!(report.final_value, 2);
}

#[test]
fn repeatable_read_last_writer_wins() {
    let report = run_on(
        &last_writer_wins_db(),
        ScenarioConfig::new(IsolationLevel::RepeatableRead, Mode::Interleaved),
    );
    assert!(report.conflict.is_none());
    assert_eq!(report.outcome(), Outcome::LostUpdate);
}

#[test]
fn conflict_message_names_counter() {
    let report = run(IsolationLevel::Serializable, Mode::Interleaved);
    let message = &report.conflict.as_ref().unwrap().message;
    assert!(message.contains("write conflict on counter 'a'"));
}

#[test]
fn store_is_left_unlocked() {
    for level in IsolationLevel::ALL {
        let db = Database::new();
        run_on(&db, ScenarioConfig::new(level, Mode::Interleaved));
        assert!(!db.is_locked(&CounterName::default()), "level {}", level);
    }
}

#[test]
fn serializable_commit_time_conflict_is_caught() {
    // T2 writes another row after reading a stale counter: the write passes,
    // the commit fails read-set validation
    let db = Database::new();
    let mut a = session(&db, SessionLabel::A, IsolationLevel::Serializable);
    let mut b = db.connect().unwrap();
    b.set_isolation_level(IsolationLevel::Serializable).unwrap();

    a.initialize(1).unwrap();
    let v1 = a.read().unwrap();
    b.read(&CounterName::default()).unwrap();
    a.update(v1 + 1).unwrap();
    a.commit().unwrap();

    b.upsert(&CounterName::new("audit"), 1).unwrap();
    let err = b.commit().unwrap_err();
    assert_eq!(err.conflict_kind(), Some(ConflictKind::StaleRead));
    assert_eq!(db.committed_value(&CounterName::new("audit")), None);
}
