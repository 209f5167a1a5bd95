//! Property-based scenario tests

use proptest::prelude::*;

use crate::common::*;

fn any_level() -> impl Strategy<Value = IsolationLevel> {
    prop::sample::select(IsolationLevel::ALL.to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn serialized_always_adds_two(level in any_level(), baseline in -1_000_000i64..1_000_000) {
        let config = ScenarioConfig::new(level, Mode::Serialized).with_baseline(baseline);
        let report = run_on(&Database::new(), config);

        prop_assert_eq!(report.initial_value, baseline);
        prop_assert_eq!(report.final_value, baseline + 2);
        prop_assert!(report.conflict.is_none());
    }

    #[test]
    fn interleaved_adds_one(level in any_level(), baseline in -1_000_000i64..1_000_000) {
        let config = ScenarioConfig::new(level, Mode::Interleaved).with_baseline(baseline);
        let report = run_on(&Database::new(), config);

        // Lost or refused, the second increment never lands
        prop_assert_eq!(report.final_value, baseline + 1);
        prop_assert_eq!(report.conflict.is_some(), level.uses_transaction_snapshot());
    }

    #[test]
    fn initialization_is_idempotent(baseline in any::<i64>(), repeats in 1usize..4) {
        let db = Database::new();
        let mut conn = db.connect().unwrap();
        let counter = Counter::default();
        for _ in 0..repeats {
            counter.initialize(&mut conn, baseline).unwrap();
        }
        prop_assert_eq!(counter.read(&mut conn).unwrap(), baseline);
    }
}
