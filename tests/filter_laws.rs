mod common;

use std::collections::BTreeSet;

use common::record;
use proptest::prelude::*;
use round_analytics::{
    config::EngineConfig,
    filter::{self, Constraint, FilterSet},
    record::Record,
};

const DEPARTMENTS: [&str; 4] = ["CS", "EE", "ME", "경영"];
const YEARS: [&str; 4] = ["1", "2", "3", "4"];
const LEVELS: [&str; 5] = ["A", "B", "C", "D", "E"];

fn record_strategy() -> impl Strategy<Value = Record> {
    (
        prop::sample::select(DEPARTMENTS.to_vec()),
        prop::sample::select(YEARS.to_vec()),
        prop::sample::select(LEVELS.to_vec()),
        0u32..=100,
        any::<bool>(),
    )
        .prop_map(|(department, year, level, score, pass)| {
            record(department, year, level, f64::from(score), pass)
        })
}

fn subset_of(values: &'static [&'static str]) -> impl Strategy<Value = BTreeSet<String>> {
    prop::sample::subsequence(values.to_vec(), 0..=values.len())
        .prop_map(|picked| picked.into_iter().map(str::to_string).collect())
}

#[test]
fn unknown_column_falls_back_to_unfiltered_rows() {
    let records = vec![record("CS", "1", "A", 90.0, true)];
    let filters = FilterSet::new().with("campus", Constraint::Exact("north".to_string()));
    let config = EngineConfig::default();
    assert!(filter::apply(&records, &filters, &config).is_err());
    assert_eq!(filter::apply_or_unfiltered(&records, &filters, &config), records);
}

#[test]
fn numeric_columns_compare_by_value() {
    let records = vec![record("CS", "1", "A", 80.0, true), record("CS", "1", "B", 79.5, true)];
    let filters = FilterSet::parse(&["총점=80.0".to_string()]).expect("parse");
    let filtered = filter::apply(&records, &filters, &EngineConfig::default()).expect("apply");
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].level, "A");
}

proptest! {
    #[test]
    fn inactive_constraints_are_identity(
        records in proptest::collection::vec(record_strategy(), 0..40)
    ) {
        let filters = FilterSet::new()
            .with("학과", Constraint::OneOf(BTreeSet::new()))
            .with("학년", Constraint::Exact(String::new()))
            .with("level", Constraint::NoConstraint);
        let filtered = filter::apply(&records, &filters, &EngineConfig::default()).expect("apply");
        prop_assert_eq!(filtered, records);
    }

    #[test]
    fn disjoint_filters_compose(
        records in proptest::collection::vec(record_strategy(), 0..40),
        departments in subset_of(&DEPARTMENTS),
        years in subset_of(&YEARS),
    ) {
        let config = EngineConfig::default();
        let first = FilterSet::new().with("학과", Constraint::OneOf(departments));
        let second = FilterSet::new().with("학년", Constraint::OneOf(years));
        let sequential = filter::apply(
            &filter::apply(&records, &first, &config).expect("first"),
            &second,
            &config,
        )
        .expect("second");
        let combined = filter::apply(&records, &first.merge(second), &config).expect("combined");
        prop_assert_eq!(sequential, combined);
    }

    #[test]
    fn filtered_rows_keep_relative_order(
        records in proptest::collection::vec(record_strategy(), 0..40),
        levels in subset_of(&LEVELS),
    ) {
        let filters = FilterSet::new().with("level", Constraint::OneOf(levels.clone()));
        let filtered = filter::apply(&records, &filters, &EngineConfig::default()).expect("apply");
        let expected = records
            .iter()
            .filter(|r| levels.is_empty() || levels.contains(&r.level))
            .cloned()
            .collect::<Vec<_>>();
        prop_assert_eq!(filtered, expected);
    }
}
