//! Cross-round identity resolution and per-student trajectories.
//!
//! A student is recognized across rounds by email, or by email plus student
//! number when [`IdentityMode::EmailAndNumber`] is configured. Attempts count
//! rounds, not rows: several subjects in one round are one attempt.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use serde::{Deserialize, Serialize};

use crate::{
    record::{PassStatus, Record},
    store::RoundStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityMode {
    #[default]
    Email,
    EmailAndNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StudentIdentity {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_number: Option<String>,
}

impl StudentIdentity {
    pub fn email(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            student_number: None,
        }
    }

    pub fn with_number(email: impl Into<String>, student_number: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            student_number: Some(student_number.into()),
        }
    }

    pub fn of(record: &Record, mode: IdentityMode) -> Self {
        match mode {
            IdentityMode::Email => Self::email(record.email.as_str()),
            IdentityMode::EmailAndNumber => {
                Self::with_number(record.email.as_str(), record.student_number.as_str())
            }
        }
    }
}

impl fmt::Display for StudentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.student_number {
            Some(number) => write!(f, "{} ({number})", self.email),
            None => f.write_str(&self.email),
        }
    }
}

/// Number of distinct rounds each identity appears in.
pub fn attempt_counts(store: &RoundStore) -> BTreeMap<StudentIdentity, usize> {
    let mode = store.config().identity;
    let mut counts = BTreeMap::new();
    for round in store.rounds() {
        let present = round
            .records
            .iter()
            .map(|record| StudentIdentity::of(record, mode))
            .collect::<BTreeSet<_>>();
        for identity in present {
            *counts.entry(identity).or_insert(0) += 1;
        }
    }
    counts
}

/// A student seen in at least the requested number of rounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepeatTester {
    pub identity: StudentIdentity,
    pub department: String,
    pub student_number: String,
    pub attempts: usize,
    pub latest_round: u32,
}

/// Identities with at least `min_attempts` attempts, most attempts first
/// (ties by identity). Department and student number come from the highest
/// round the identity appears in, last row winning within that round.
pub fn repeat_testers(store: &RoundStore, min_attempts: usize) -> Vec<RepeatTester> {
    let mode = store.config().identity;
    let counts = attempt_counts(store);
    let mut latest: BTreeMap<StudentIdentity, (u32, &Record)> = BTreeMap::new();
    for round in store.rounds() {
        for record in &round.records {
            latest.insert(StudentIdentity::of(record, mode), (round.number, record));
        }
    }
    let mut testers = counts
        .into_iter()
        .filter(|(_, attempts)| *attempts >= min_attempts)
        .filter_map(|(identity, attempts)| {
            let (round, record) = latest.get(&identity)?;
            Some(RepeatTester {
                department: record.department.clone(),
                student_number: record.student_number.clone(),
                attempts,
                latest_round: *round,
                identity,
            })
        })
        .collect::<Vec<_>>();
    testers.sort_by(|a, b| {
        b.attempts
            .cmp(&a.attempts)
            .then_with(|| a.identity.cmp(&b.identity))
    });
    testers
}

/// [`repeat_testers`] with the configured threshold.
pub fn configured_repeat_testers(store: &RoundStore) -> Vec<RepeatTester> {
    repeat_testers(store, store.config().repeat_threshold)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrajectoryPoint {
    pub round: u32,
    pub subject: String,
    pub score: f64,
    pub pass_fail: PassStatus,
    pub level: String,
}

/// One point per round the identity appears in, ascending by round; absent
/// rounds are skipped. With several rows in a round the last one is used.
pub fn trajectory(store: &RoundStore, identity: &StudentIdentity) -> Vec<TrajectoryPoint> {
    let mode = match identity.student_number {
        Some(_) => IdentityMode::EmailAndNumber,
        None => IdentityMode::Email,
    };
    store
        .rounds()
        .filter_map(|round| {
            round
                .records
                .iter()
                .rev()
                .find(|record| StudentIdentity::of(record, mode) == *identity)
                .map(|record| TrajectoryPoint {
                    round: round.number,
                    subject: record.subject.clone(),
                    score: record.score,
                    pass_fail: record.pass_fail.clone(),
                    level: record.level.clone(),
                })
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrajectorySummary {
    pub attempts: usize,
    pub mean_score: f64,
    pub max_score: f64,
    pub min_score: f64,
    pub passes: usize,
}

pub fn summarize(points: &[TrajectoryPoint]) -> TrajectorySummary {
    if points.is_empty() {
        return TrajectorySummary::default();
    }
    let scores = points.iter().map(|point| point.score);
    TrajectorySummary {
        attempts: points.len(),
        mean_score: scores.clone().sum::<f64>() / points.len() as f64,
        max_score: scores.clone().fold(f64::NEG_INFINITY, f64::max),
        min_score: scores.fold(f64::INFINITY, f64::min),
        passes: points.iter().filter(|point| point.pass_fail.is_pass()).count(),
    }
}

pub fn trajectory_summary(store: &RoundStore, identity: &StudentIdentity) -> TrajectorySummary {
    summarize(&trajectory(store, identity))
}
