//! Read visibility inside a session
//!
//! - Repeated reads without an own write or a concurrent commit agree
//! - Snapshot levels keep agreeing across a concurrent commit
//! - Read committed sees the commit
//! - Read uncommitted sees the uncommitted write

use crate::common::*;

fn seeded() -> Database {
    let db = Database::new();
    let mut conn = db.connect().unwrap();
    Counter::default().initialize(&mut conn, 1).unwrap();
    db
}

#[test]
fn consecutive_reads_agree_at_every_level() {
    for level in IsolationLevel::ALL {
        let db = seeded();
        let mut a = session(&db, SessionLabel::A, level);
        assert_eq!(a.read().unwrap(), a.read().unwrap(), "level {}", level);
    }
}

#[test]
fn snapshot_levels_ignore_concurrent_commit() {
    for level in [IsolationLevel::RepeatableRead, IsolationLevel::Serializable] {
        let db = seeded();
        let mut a = session(&db, SessionLabel::A, level);
        let mut b = session(&db, SessionLabel::B, level);

        let first = a.read().unwrap();
        b.update(50).unwrap();
        b.commit().unwrap();

        assert_eq!(a.read().unwrap(), first, "level {}", level);
        a.commit().unwrap();
        assert_eq!(a.read().unwrap(), 50, "level {}", level);
    }
}

#[test]
fn read_committed_sees_concurrent_commit() {
    let db = seeded();
    let mut a = session(&db, SessionLabel::A, IsolationLevel::ReadCommitted);
    let mut b = session(&db, SessionLabel::B, IsolationLevel::ReadCommitted);

    assert_eq!(a.read().unwrap(), 1);
    b.update(50).unwrap();
    assert_eq!(a.read().unwrap(), 1);
    b.commit().unwrap();
    assert_eq!(a.read().unwrap(), 50);
}

#[test]
fn read_uncommitted_sees_dirty_value() {
    let db = seeded();
    let mut a = session(&db, SessionLabel::A, IsolationLevel::ReadUncommitted);
    let mut b = session(&db, SessionLabel::B, IsolationLevel::ReadUncommitted);

    b.update(50).unwrap();
    assert_eq!(a.read().unwrap(), 50);
    b.rollback().unwrap();
    assert_eq!(a.read().unwrap(), 1);
}

#[test]
fn dirty_reads_can_be_disabled() {
    let db = Database::from_config(&StoreConfig {
        dirty_reads: false,
        ..StoreConfig::default()
    });
    let mut conn = db.connect().unwrap();
    Counter::default().initialize(&mut conn, 1).unwrap();

    let mut a = session(&db, SessionLabel::A, IsolationLevel::ReadUncommitted);
    let mut b = session(&db, SessionLabel::B, IsolationLevel::ReadUncommitted);
    b.update(50).unwrap();
    assert_eq!(a.read().unwrap(), 1);
}

#[test]
fn own_write_is_visible() {
    for level in IsolationLevel::ALL {
        let db = seeded();
        let mut a = session(&db, SessionLabel::A, level);
        a.read().unwrap();
        a.update(7).unwrap();
        assert_eq!(a.read().unwrap(), 7, "level {}", level);
        assert_eq!(a.state(), SessionState::Open);
    }
}

#[test]
fn snapshot_starts_at_first_statement_not_at_connect() {
    let db = seeded();
    let mut a = session(&db, SessionLabel::A, IsolationLevel::Serializable);
    let mut b = session(&db, SessionLabel::B, IsolationLevel::Serializable);

    // a is connected but idle while b commits
    b.update(9).unwrap();
    b.commit().unwrap();
    assert_eq!(a.read().unwrap(), 9);
}
