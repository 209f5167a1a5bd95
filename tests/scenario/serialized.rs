//! Serialized execution
//!
//! T1 finishes before T2 starts, so every level must apply both increments.

use crate::common::*;

#[test]
fn every_level_applies_both_increments() {
    for level in IsolationLevel::ALL {
        let report = run(level, Mode::Serialized);
        assert_eq!(report.final_value, report.initial_value + 2, "level {}", level);
        assert!(report.conflict.is_none(), "level {}", level);
        assert_eq!(report.outcome(), Outcome::Consistent);
    }
}

#[test]
fn last_writer_wins_policy_does_not_matter_when_serialized() {
    let report = run_on(
        &last_writer_wins_db(),
        ScenarioConfig::new(IsolationLevel::RepeatableRead, Mode::Serialized),
    );
    assert_eq!(report.outcome(), Outcome::Consistent);
}

#[test]
fn second_transaction_reads_first_commit() {
    let report = run(IsolationLevel::Serializable, Mode::Serialized);

    // Narration read, then T1's own read
    assert_eq!(reads_of(&report, SessionLabel::A), vec![1, 1]);
    assert_eq!(reads_of(&report, SessionLabel::B), vec![2]);
    assert_eq!(reads_of(&report, SessionLabel::Observer), vec![3]);
}

#[test]
fn step_order_is_fixed() {
    let report = run(IsolationLevel::RepeatableRead, Mode::Serialized);
    let order: Vec<_> = report
        .steps
        .iter()
        .map(|s| (s.session, s.action))
        .collect();

    assert_eq!(
        order,
        vec![
            (SessionLabel::A, StepAction::Initialize),
            (SessionLabel::A, StepAction::Read),
            (SessionLabel::A, StepAction::Read),
            (SessionLabel::A, StepAction::Update { requested: 2 }),
            (SessionLabel::A, StepAction::Commit(CommitOutcome::Committed)),
            (SessionLabel::B, StepAction::Read),
            (SessionLabel::B, StepAction::Update { requested: 3 }),
            (SessionLabel::B, StepAction::Commit(CommitOutcome::Committed)),
            (SessionLabel::Observer, StepAction::Read),
            (SessionLabel::Observer, StepAction::Commit(CommitOutcome::Committed)),
        ]
    );
}

#[test]
fn conflict_outside_second_update_is_fatal() {
    let db = Database::new();
    let mut seed = db.connect().unwrap();
    Counter::default().initialize(&mut seed, 1).unwrap();

    // A third party holds the row lock for the whole run
    let mut intruder = session(&db, SessionLabel::Observer, IsolationLevel::ReadCommitted);
    intruder.update(100).unwrap();

    let err = Scenario::new(&db, ScenarioConfig::new(IsolationLevel::ReadCommitted, Mode::Serialized))
        .run()
        .unwrap_err();
    assert_eq!(err.conflict_kind(), Some(ConflictKind::RowLocked));

    intruder.rollback().unwrap();
    assert_eq!(db.committed_value(&CounterName::default()), Some(1));
    assert!(!db.is_locked(&CounterName::default()));
}
