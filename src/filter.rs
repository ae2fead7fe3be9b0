use std::collections::BTreeSet;

use anyhow::{Result, anyhow};
use log::warn;

use crate::{
    config::EngineConfig,
    error::{EngineError, EngineResult},
    record::{Column, Record},
};

/// Constraint on a single column.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Constraint {
    #[default]
    NoConstraint,
    Exact(String),
    OneOf(BTreeSet<String>),
}

impl Constraint {
    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Constraint::OneOf(values.into_iter().map(Into::into).collect())
    }

    /// An empty scalar or empty set places no constraint on the column.
    pub fn is_active(&self) -> bool {
        match self {
            Constraint::NoConstraint => false,
            Constraint::Exact(value) => !value.is_empty(),
            Constraint::OneOf(values) => !values.is_empty(),
        }
    }

    fn admits(&self, record: &Record, column: Column) -> bool {
        match self {
            Constraint::NoConstraint => true,
            Constraint::Exact(value) => value.is_empty() || record.matches(column, value),
            Constraint::OneOf(values) => {
                values.is_empty() || values.iter().any(|value| record.matches(column, value))
            }
        }
    }
}

/// Column name to constraint, applied as a conjunction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    entries: Vec<(String, Constraint)>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the constraint for `column`, replacing any previous one.
    pub fn with(mut self, column: impl Into<String>, constraint: Constraint) -> Self {
        self.insert(column, constraint);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, constraint: Constraint) {
        let column = column.into();
        match self.entries.iter_mut().find(|(name, _)| *name == column) {
            Some(entry) => entry.1 = constraint,
            None => self.entries.push((column, constraint)),
        }
    }

    /// Union of two filter sets; `other` wins on a shared column.
    pub fn merge(mut self, other: FilterSet) -> Self {
        for (column, constraint) in other.entries {
            self.insert(column, constraint);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|(_, constraint)| !constraint.is_active())
    }

    pub fn entries(&self) -> &[(String, Constraint)] {
        &self.entries
    }

    /// Parses `column=value` and `column=a|b|c` expressions.
    pub fn parse(filters: &[String]) -> Result<Self> {
        let mut set = FilterSet::new();
        for filter in filters {
            let (column, constraint) = parse_filter(filter)?;
            set.insert(column, constraint);
        }
        Ok(set)
    }
}

fn parse_filter(filter: &str) -> Result<(String, Constraint)> {
    let trimmed = filter.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Empty filter expression"));
    }
    let Some((left, right)) = trimmed.split_once('=') else {
        return Err(anyhow!("Failed to parse filter expression '{trimmed}'"));
    };
    let column = left.trim();
    if column.is_empty() {
        return Err(anyhow!("Filter expression '{trimmed}' has no column"));
    }
    let right = unquote(right.trim());
    let constraint = if right.is_empty() {
        Constraint::NoConstraint
    } else if right.contains('|') {
        Constraint::one_of(
            right
                .split('|')
                .map(|value| unquote(value.trim()))
                .filter(|value| !value.is_empty()),
        )
    } else {
        Constraint::Exact(right.to_string())
    };
    Ok((column.to_string(), constraint))
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2 {
        let bytes = value.as_bytes();
        if (bytes[0] == b'"' && bytes[value.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[value.len() - 1] == b'\'')
        {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Returns the rows satisfying every active constraint, order preserved.
///
/// Fails with [`EngineError::FilterColumn`] when an active constraint names
/// a column the dataset does not have.
pub fn apply(
    records: &[Record],
    filters: &FilterSet,
    config: &EngineConfig,
) -> EngineResult<Vec<Record>> {
    let mut resolved = Vec::new();
    for (name, constraint) in &filters.entries {
        if !constraint.is_active() {
            continue;
        }
        let column = config
            .column_for_header(name)
            .ok_or_else(|| EngineError::FilterColumn(name.clone()))?;
        resolved.push((column, constraint));
    }
    if resolved.is_empty() {
        return Ok(records.to_vec());
    }
    Ok(records
        .iter()
        .filter(|record| {
            resolved
                .iter()
                .all(|(column, constraint)| constraint.admits(record, *column))
        })
        .cloned()
        .collect())
}

/// [`apply`], falling back to the unfiltered rows with a warning on error.
pub fn apply_or_unfiltered(
    records: &[Record],
    filters: &FilterSet,
    config: &EngineConfig,
) -> Vec<Record> {
    match apply(records, filters, config) {
        Ok(filtered) => filtered,
        Err(err) => {
            warn!("Filtering failed ({err}); returning {} unfiltered row(s)", records.len());
            records.to_vec()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::PassStatus;

    fn record(dept: &str, year: &str, level: &str, pass: bool) -> Record {
        Record {
            round: 1,
            sequence: 1,
            subject: "Python".to_string(),
            email: format!("{dept}{year}{level}@x"),
            pass_fail: if pass {
                PassStatus::pass("합격")
            } else {
                PassStatus::fail("불합격")
            },
            score: 50.0,
            level: level.to_string(),
            department: dept.to_string(),
            year: year.to_string(),
            student_number: "1".to_string(),
        }
    }

    fn dataset() -> Vec<Record> {
        vec![
            record("CS", "1", "A", true),
            record("EE", "2", "B", true),
            record("CS", "2", "C", false),
            record("ME", "3", "A", false),
        ]
    }

    #[test]
    fn parse_supports_exact_and_set_constraints() {
        let set = FilterSet::parse(&[
            "학과=CS|EE".to_string(),
            "year = '2'".to_string(),
            "level=".to_string(),
        ])
        .expect("parse");
        assert_eq!(
            set.entries(),
            &[
                ("학과".to_string(), Constraint::one_of(["CS", "EE"])),
                ("year".to_string(), Constraint::Exact("2".to_string())),
                ("level".to_string(), Constraint::NoConstraint),
            ]
        );
        assert!(FilterSet::parse(&["no equals sign".to_string()]).is_err());
        assert!(FilterSet::parse(&["=x".to_string()]).is_err());
    }

    #[test]
    fn constraints_are_conjunctive_and_order_preserving() {
        let filters = FilterSet::new()
            .with("학과", Constraint::one_of(["CS", "EE"]))
            .with("학년", Constraint::Exact("2".to_string()));
        let filtered = apply(&dataset(), &filters, &EngineConfig::default()).expect("apply");
        let depts = filtered.iter().map(|r| r.department.as_str()).collect::<Vec<_>>();
        assert_eq!(depts, vec!["EE", "CS"]);
    }

    #[test]
    fn empty_constraints_are_identity() {
        let filters = FilterSet::new()
            .with("학과", Constraint::OneOf(BTreeSet::new()))
            .with("level", Constraint::Exact(String::new()))
            .with("nonexistent", Constraint::NoConstraint);
        assert!(filters.is_empty());
        let data = dataset();
        assert_eq!(apply(&data, &filters, &EngineConfig::default()).unwrap(), data);
    }

    #[test]
    fn pass_label_filters_by_literal_text() {
        let filters = FilterSet::new().with("합격여부", Constraint::Exact("합격".to_string()));
        let filtered = apply(&dataset(), &filters, &EngineConfig::default()).unwrap();
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|r| r.pass_fail.is_pass()));
    }

    #[test]
    fn unknown_column_errors_or_falls_back() {
        let filters = FilterSet::new().with("campus", Constraint::Exact("north".to_string()));
        let data = dataset();
        assert!(matches!(
            apply(&data, &filters, &EngineConfig::default()),
            Err(EngineError::FilterColumn(name)) if name == "campus"
        ));
        assert_eq!(
            apply_or_unfiltered(&data, &filters, &EngineConfig::default()),
            data
        );
    }
}
