//! Cross-round and two-key aggregations.

use std::collections::BTreeMap;

use itertools::Itertools;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::{
    config::EngineConfig,
    record::Record,
    stats::rate,
    store::RoundStore,
};

/// Placeholder value of [`RadarMetrics::improvement`]. There is no
/// longitudinal metric behind it yet.
pub const IMPROVEMENT_PLACEHOLDER: f64 = 0.5;

/// Whether rounds without rows for a department appear in per-round summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyRoundPolicy {
    /// Every stored round gets a row, zero-filled when the department is absent.
    #[default]
    Report,
    /// Only rounds with at least one row are listed.
    Omit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundSummary {
    pub round: u32,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Percentage in `0..=100`.
    pub pass_rate: f64,
}

/// Per-round attempt and pass counts for one department, ascending by round.
pub fn department_round_summary(store: &RoundStore, department: &str) -> Vec<RoundSummary> {
    let policy = store.config().empty_rounds;
    let mut counts: BTreeMap<u32, (usize, usize)> = match policy {
        EmptyRoundPolicy::Report => store
            .round_numbers()
            .into_iter()
            .map(|round| (round, (0, 0)))
            .collect(),
        EmptyRoundPolicy::Omit => BTreeMap::new(),
    };
    for record in store.restrict_to_department(department) {
        let entry = counts.entry(record.round).or_insert((0, 0));
        entry.0 += 1;
        if record.pass_fail.is_pass() {
            entry.1 += 1;
        }
    }
    if counts.values().all(|(total, _)| *total == 0) {
        warn!("Department '{department}' has no rows in any loaded round");
    }
    counts
        .into_iter()
        .map(|(round, (total, passed))| RoundSummary {
            round,
            total,
            passed,
            failed: total - passed,
            pass_rate: rate(passed, total),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotCell {
    pub department: String,
    pub year: String,
    pub count: usize,
    pub mean_score: f64,
}

/// Mean score by department and academic year. Combinations without rows
/// have no cell: absence means no data, not a zero mean.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GradePivot {
    pub cells: Vec<PivotCell>,
}

impl GradePivot {
    pub fn get(&self, department: &str, year: &str) -> Option<f64> {
        self.cells
            .binary_search_by(|cell| {
                (cell.department.as_str(), cell.year.as_str()).cmp(&(department, year))
            })
            .ok()
            .map(|index| self.cells[index].mean_score)
    }

    pub fn departments(&self) -> Vec<&str> {
        self.cells
            .iter()
            .map(|cell| cell.department.as_str())
            .dedup()
            .collect()
    }

    pub fn years(&self) -> Vec<&str> {
        self.cells
            .iter()
            .map(|cell| cell.year.as_str())
            .sorted()
            .dedup()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

pub fn grade_level_pivot(records: &[Record]) -> GradePivot {
    if records.is_empty() {
        warn!("Grade pivot requested over an empty dataset");
    }
    let mut sums: BTreeMap<(&str, &str), (usize, f64)> = BTreeMap::new();
    for record in records {
        let entry = sums
            .entry((record.department.as_str(), record.year.as_str()))
            .or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += record.score;
    }
    GradePivot {
        cells: sums
            .into_iter()
            .map(|((department, year), (count, sum))| PivotCell {
                department: department.to_string(),
                year: year.to_string(),
                count,
                mean_score: sum / count as f64,
            })
            .collect(),
    }
}

/// Five radar indicators. Shares lie in `0..=1`; the mean score is the raw
/// mean divided by 100 and follows whatever range the scores have.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RadarMetrics {
    pub department: Option<String>,
    pub mean_score: f64,
    pub pass_rate: f64,
    pub top_tier_share: f64,
    pub population_share: f64,
    /// Always [`IMPROVEMENT_PLACEHOLDER`].
    pub improvement: f64,
}

impl RadarMetrics {
    pub fn axes(&self) -> [(&'static str, f64); 5] {
        [
            ("mean_score", self.mean_score),
            ("pass_rate", self.pass_rate),
            ("top_tier_share", self.top_tier_share),
            ("population_share", self.population_share),
            ("improvement", self.improvement),
        ]
    }
}

/// Radar indicators for `department`, or for the whole dataset when `None`.
/// The population share compares the subset against all of `records`.
pub fn performance_radar_metrics(
    records: &[Record],
    department: Option<&str>,
    config: &EngineConfig,
) -> RadarMetrics {
    let subset = records
        .iter()
        .filter(|record| department.is_none_or(|name| record.department == name))
        .collect::<Vec<_>>();
    if subset.is_empty() {
        warn!(
            "Radar metrics requested over an empty dataset{}",
            department
                .map(|name| format!(" for department '{name}'"))
                .unwrap_or_default()
        );
    }
    let share = |part: usize| rate(part, subset.len()) / 100.0;
    let mean = if subset.is_empty() {
        0.0
    } else {
        subset.iter().map(|record| record.score).sum::<f64>() / subset.len() as f64
    };
    RadarMetrics {
        department: department.map(str::to_string),
        mean_score: mean / 100.0,
        pass_rate: share(subset.iter().filter(|r| r.pass_fail.is_pass()).count()),
        top_tier_share: share(
            subset
                .iter()
                .filter(|record| config.is_top_tier(&record.level))
                .count(),
        ),
        population_share: rate(subset.len(), records.len()) / 100.0,
        improvement: IMPROVEMENT_PLACEHOLDER,
    }
}

/// Row counts per department across every stored round.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParticipationMatrix {
    pub rounds: Vec<u32>,
    /// Department to counts aligned with `rounds`.
    pub counts: BTreeMap<String, Vec<usize>>,
}

pub fn participation_matrix(store: &RoundStore) -> ParticipationMatrix {
    let rounds = store.round_numbers();
    let mut counts: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (column, round) in store.rounds().enumerate() {
        for record in &round.records {
            counts
                .entry(record.department.clone())
                .or_insert_with(|| vec![0; rounds.len()])[column] += 1;
        }
    }
    ParticipationMatrix { rounds, counts }
}
