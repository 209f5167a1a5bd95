//! Counter initialization
//!
//! Initialization is an upsert committed on its own: running it again
//! resets the row rather than failing or adding to it.

use crate::common::*;

#[test]
fn initialize_twice_leaves_baseline() {
    let db = Database::new();
    let mut conn = db.connect().unwrap();
    let counter = Counter::default();

    counter.initialize(&mut conn, 1).unwrap();
    counter.initialize(&mut conn, 1).unwrap();

    assert_eq!(counter.read(&mut conn).unwrap(), 1);
    assert_eq!(db.committed_value(counter.name()), Some(1));
}

#[test]
fn initialize_overwrites_previous_run() {
    let db = Database::new();
    run_on(&db, ScenarioConfig::new(IsolationLevel::ReadCommitted, Mode::Serialized));
    assert_eq!(db.committed_value(&CounterName::default()), Some(3));

    let report = run_on(&db, ScenarioConfig::new(IsolationLevel::Serializable, Mode::Interleaved));
    assert_eq!(report.initial_value, 1);
    assert_eq!(report.final_value, 2);
}

#[test]
fn initialization_is_committed_before_either_transaction() {
    let report = run(IsolationLevel::Serializable, Mode::Interleaved);

    assert_eq!(report.steps[0].session, SessionLabel::A);
    assert_eq!(report.steps[0].action, StepAction::Initialize);
    assert_eq!(report.steps[0].value, Some(1));
    // Narration read right after
    assert_eq!(report.steps[1].action, StepAction::Read);
    assert_eq!(report.initial_value, 1);
}

#[test]
fn custom_baseline_and_counter() {
    let config = ScenarioConfig::new(IsolationLevel::ReadCommitted, Mode::Serialized)
        .with_baseline(-5)
        .with_counter(CounterName::new("visits"));
    let db = Database::new();
    let report = run_on(&db, config);

    assert_eq!(report.initial_value, -5);
    assert_eq!(report.final_value, -3);
    assert_eq!(db.committed_value(&CounterName::new("visits")), Some(-3));
    assert_eq!(db.committed_value(&CounterName::default()), None);
}

#[test]
fn read_before_initialization_is_not_found() {
    let db = Database::new();
    let mut a = session(&db, SessionLabel::A, IsolationLevel::ReadCommitted);
    assert!(matches!(a.read(), Err(Error::CounterNotFound(name)) if name == "a"));
}
