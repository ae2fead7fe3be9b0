//! Descriptive statistics over a dataset view.
//!
//! Every function here is total: an empty input yields zero-valued or empty
//! results (with a warning in the log) instead of an error. Standard
//! deviation uses population semantics (divide by `n`), and the median
//! averages the middle pair for even counts.

use std::collections::BTreeMap;

use itertools::Itertools;
use log::warn;
use serde::Serialize;

use crate::{
    frequency::{FrequencyTable, frequencies},
    record::{Column, Record},
};

/// Decile means average `ceil(n / DECILE_DIVISOR)` rows.
const DECILE_DIVISOR: usize = 10;
const MAX_HISTOGRAM_BINS: usize = 1_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BasicStats {
    pub total_count: usize,
    pub pass_count: usize,
    /// Percentage in `0..=100`.
    pub pass_rate: f64,
    pub mean_score: f64,
    pub by_department: FrequencyTable,
    pub by_year: FrequencyTable,
    pub by_level: FrequencyTable,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AdvancedStats {
    pub count: usize,
    pub std_dev: f64,
    pub median: f64,
    pub max: f64,
    pub min: f64,
    pub top_decile_mean: f64,
    pub bottom_decile_mean: f64,
}

/// Score and pass accumulation shared by the per-dataset and per-group paths.
#[derive(Debug, Clone, Default)]
struct ScoreStats {
    values: Vec<f64>,
    sum: f64,
    passes: usize,
}

impl ScoreStats {
    fn from_records<'a>(records: impl IntoIterator<Item = &'a Record>) -> Self {
        let mut stats = ScoreStats::default();
        for record in records {
            stats.add(record);
        }
        stats
    }

    fn add(&mut self, record: &Record) {
        self.values.push(record.score);
        self.sum += record.score;
        if record.pass_fail.is_pass() {
            self.passes += 1;
        }
    }

    fn count(&self) -> usize {
        self.values.len()
    }

    fn mean(&self) -> f64 {
        if self.values.is_empty() {
            0.0
        } else {
            self.sum / self.values.len() as f64
        }
    }

    fn pass_rate(&self) -> f64 {
        rate(self.passes, self.values.len())
    }

    fn sorted(&self) -> Vec<f64> {
        let mut sorted = self.values.clone();
        sorted.sort_by(f64::total_cmp);
        sorted
    }

    fn std_dev(&self) -> f64 {
        let n = self.values.len();
        if n == 0 {
            return 0.0;
        }
        let mean = self.mean();
        let variance = self
            .values
            .iter()
            .map(|value| (value - mean) * (value - mean))
            .sum::<f64>()
            / n as f64;
        variance.max(0.0).sqrt()
    }
}

/// `part / whole × 100`, zero when `whole` is zero.
pub fn rate(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Number of rows averaged by each decile mean: `ceil(max(1, 0.1·n))`,
/// never more than `n`.
pub fn decile_count(n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    n.div_ceil(DECILE_DIVISOR).clamp(1, n)
}

pub fn basic_stats(records: &[Record]) -> BasicStats {
    if records.is_empty() {
        warn!("Basic statistics requested over an empty dataset");
    }
    let scores = ScoreStats::from_records(records);
    let mut tables = frequencies(records, &[Column::Department, Column::Year, Column::Level])
        .into_iter();
    BasicStats {
        total_count: scores.count(),
        pass_count: scores.passes,
        pass_rate: scores.pass_rate(),
        mean_score: scores.mean(),
        by_department: tables.next().unwrap_or_default(),
        by_year: tables.next().unwrap_or_default(),
        by_level: tables.next().unwrap_or_default(),
    }
}

pub fn advanced_stats(records: &[Record]) -> AdvancedStats {
    if records.is_empty() {
        warn!("Advanced statistics requested over an empty dataset");
        return AdvancedStats::default();
    }
    let scores = ScoreStats::from_records(records);
    let sorted = scores.sorted();
    let n = sorted.len();
    let k = decile_count(n);
    AdvancedStats {
        count: n,
        std_dev: scores.std_dev(),
        median: quantile(&sorted, 0.5),
        max: sorted[n - 1],
        min: sorted[0],
        top_decile_mean: mean(&sorted[n - k..]),
        bottom_decile_mean: mean(&sorted[..k]),
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Linear-interpolated quantile of already sorted values.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let position = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = position.floor() as usize;
            let upper = position.ceil() as usize;
            let weight = position - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * weight
        }
    }
}

/// Per-key count, mean score, and pass rate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub key: String,
    pub count: usize,
    pub pass_count: usize,
    pub pass_rate: f64,
    pub mean_score: f64,
}

/// Groups rows by `column`, keys ascending.
pub fn group_summaries(records: &[Record], column: Column) -> Vec<GroupSummary> {
    let mut groups: BTreeMap<String, ScoreStats> = BTreeMap::new();
    for record in records {
        groups
            .entry(record.text(column).into_owned())
            .or_default()
            .add(record);
    }
    groups
        .into_iter()
        .map(|(key, stats)| GroupSummary {
            key,
            count: stats.count(),
            pass_count: stats.passes,
            pass_rate: stats.pass_rate(),
            mean_score: stats.mean(),
        })
        .collect()
}

/// Five-number score summary of one department.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxSummary {
    pub key: String,
    pub count: usize,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

pub fn department_box_summaries(records: &[Record]) -> Vec<BoxSummary> {
    records
        .iter()
        .map(|record| (record.department.as_str(), record.score))
        .into_group_map()
        .into_iter()
        .sorted_by(|a, b| a.0.cmp(&b.0))
        .map(|(key, mut scores)| {
            scores.sort_by(f64::total_cmp);
            BoxSummary {
                key: key.to_string(),
                count: scores.len(),
                min: scores[0],
                q1: quantile(&scores, 0.25),
                median: quantile(&scores, 0.5),
                q3: quantile(&scores, 0.75),
                max: scores[scores.len() - 1],
            }
        })
        .collect()
}

/// Score bin split by outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub passed: usize,
    pub not_passed: usize,
}

/// Fixed-width score histogram.
///
/// Bins start at the largest multiple of `bin_width` not above the minimum
/// score. A non-positive width yields no bins; a width that would produce
/// more than a thousand bins, including one overflowing the score range, is
/// widened to fit exactly that many.
pub fn score_histogram(records: &[Record], bin_width: f64) -> Vec<HistogramBin> {
    if records.is_empty() || !(bin_width.is_finite() && bin_width > 0.0) {
        return Vec::new();
    }
    let (min, max) = records
        .iter()
        .map(|record| record.score)
        .minmax()
        .into_option()
        .unwrap_or((0.0, 0.0));
    let start = Some((min / bin_width).floor() * bin_width)
        .filter(|start| start.is_finite())
        .unwrap_or(min);
    let span = ((max - start) / bin_width).floor();
    let (width, bins) = if min == max {
        (bin_width, 1)
    } else if span.is_finite() && span < (MAX_HISTOGRAM_BINS - 1) as f64 {
        (bin_width, span as usize + 1)
    } else {
        // Divided separately so a range wider than f64::MAX stays finite.
        let divisor = (MAX_HISTOGRAM_BINS - 1) as f64;
        (max / divisor - start / divisor, MAX_HISTOGRAM_BINS)
    };
    let mut histogram = (0..bins)
        .map(|idx| HistogramBin {
            lower: start + idx as f64 * width,
            upper: start + (idx + 1) as f64 * width,
            passed: 0,
            not_passed: 0,
        })
        .collect::<Vec<_>>();
    for record in records {
        let idx = (((record.score - start) / width).floor() as usize).min(bins - 1);
        let bin = &mut histogram[idx];
        if record.pass_fail.is_pass() {
            bin.passed += 1;
        } else {
            bin.not_passed += 1;
        }
    }
    histogram
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::PassStatus;

    fn record(dept: &str, score: f64, pass: bool) -> Record {
        Record {
            round: 1,
            sequence: 1,
            subject: "Python".to_string(),
            email: format!("{dept}{score}@x"),
            pass_fail: if pass {
                PassStatus::pass("합격")
            } else {
                PassStatus::fail("불합격")
            },
            score,
            level: if score >= 80.0 { "A" } else { "C" }.to_string(),
            department: dept.to_string(),
            year: "2".to_string(),
            student_number: "1".to_string(),
        }
    }

    #[test]
    fn basic_stats_count_rates_and_maps() {
        let records = vec![
            record("CS", 90.0, true),
            record("CS", 40.0, false),
            record("EE", 80.0, true),
            record("EE", 30.0, false),
        ];
        let stats = basic_stats(&records);
        assert_eq!(stats.total_count, 4);
        assert_eq!(stats.pass_count, 2);
        assert_eq!(stats.pass_rate, 50.0);
        assert_eq!(stats.mean_score, 60.0);
        assert_eq!(stats.by_department.get("CS"), 2);
        assert_eq!(stats.by_year.get("2"), 4);
        assert_eq!(stats.by_level.get("A"), 2);
    }

    #[test]
    fn empty_dataset_is_zero_valued() {
        let basic = basic_stats(&[]);
        assert_eq!(basic.total_count, 0);
        assert_eq!(basic.pass_rate, 0.0);
        assert_eq!(basic.mean_score, 0.0);
        assert!(basic.by_department.is_empty());
        assert_eq!(advanced_stats(&[]), AdvancedStats::default());
        assert!(group_summaries(&[], Column::Department).is_empty());
        assert!(score_histogram(&[], 10.0).is_empty());
    }

    #[test]
    fn advanced_stats_use_population_deviation() {
        let records = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]
            .iter()
            .map(|score| record("CS", *score, false))
            .collect::<Vec<_>>();
        let stats = advanced_stats(&records);
        assert_eq!(stats.count, 8);
        assert!((stats.std_dev - 2.0).abs() < 1e-12);
        assert_eq!(stats.median, 4.5);
        assert_eq!(stats.max, 9.0);
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.top_decile_mean, 9.0);
        assert_eq!(stats.bottom_decile_mean, 2.0);
    }

    #[test]
    fn decile_count_is_clamped() {
        assert_eq!(decile_count(0), 0);
        assert_eq!(decile_count(1), 1);
        assert_eq!(decile_count(9), 1);
        assert_eq!(decile_count(10), 1);
        assert_eq!(decile_count(11), 2);
        assert_eq!(decile_count(25), 3);
        assert_eq!(decile_count(30), 3);
    }

    #[test]
    fn single_row_deciles_equal_the_score() {
        let stats = advanced_stats(&[record("CS", 73.0, true)]);
        assert_eq!(stats.top_decile_mean, 73.0);
        assert_eq!(stats.bottom_decile_mean, 73.0);
        assert_eq!(stats.std_dev, 0.0);
    }

    #[test]
    fn deciles_average_the_extremes() {
        let records = (1..=20)
            .map(|score| record("CS", f64::from(score), false))
            .collect::<Vec<_>>();
        let stats = advanced_stats(&records);
        assert_eq!(stats.top_decile_mean, 19.5);
        assert_eq!(stats.bottom_decile_mean, 1.5);
    }

    #[test]
    fn group_summaries_are_sorted_by_key() {
        let records = vec![
            record("EE", 50.0, false),
            record("CS", 90.0, true),
            record("CS", 70.0, false),
        ];
        let groups = group_summaries(&records, Column::Department);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, "CS");
        assert_eq!(groups[0].mean_score, 80.0);
        assert_eq!(groups[0].pass_rate, 50.0);
        assert_eq!(groups[1].key, "EE");
        assert_eq!(groups[1].pass_count, 0);
    }

    #[test]
    fn box_summaries_interpolate_quartiles() {
        let records = [10.0, 20.0, 30.0, 40.0, 50.0]
            .iter()
            .map(|score| record("CS", *score, false))
            .chain([record("EE", 60.0, true)])
            .collect::<Vec<_>>();
        let boxes = department_box_summaries(&records);
        assert_eq!(boxes.len(), 2);
        let cs = &boxes[0];
        assert_eq!((cs.min, cs.q1, cs.median, cs.q3, cs.max), (10.0, 20.0, 30.0, 40.0, 50.0));
        assert_eq!(boxes[1].q1, 60.0);
    }

    #[test]
    fn histogram_bins_split_by_outcome() {
        let records = vec![
            record("CS", 5.0, false),
            record("CS", 15.0, true),
            record("CS", 19.9, false),
            record("CS", 30.0, true),
        ];
        let bins = score_histogram(&records, 10.0);
        assert_eq!(bins.len(), 4);
        assert_eq!(bins[0].lower, 0.0);
        assert_eq!((bins[1].passed, bins[1].not_passed), (1, 1));
        assert_eq!((bins[2].passed, bins[2].not_passed), (0, 0));
        assert_eq!(bins[3].lower, 30.0);
        assert_eq!(bins[3].passed, 1);
        assert!(score_histogram(&records, 0.0).is_empty());
    }

    #[test]
    fn histogram_caps_bins_for_wide_ranges_and_tiny_widths() {
        let wide = vec![record("CS", 0.0, false), record("CS", 1e300, true)];
        let bins = score_histogram(&wide, 1.0);
        assert_eq!(bins.len(), MAX_HISTOGRAM_BINS);
        assert_eq!(bins[0].not_passed, 1);
        assert_eq!(bins.iter().map(|bin| bin.passed).sum::<usize>(), 1);
        assert!(bins[..MAX_HISTOGRAM_BINS - 2].iter().skip(1).all(|bin| bin.passed == 0));

        let narrow = vec![record("CS", 0.0, false), record("CS", 100.0, true)];
        let bins = score_histogram(&narrow, 1e-300);
        assert_eq!(bins.len(), MAX_HISTOGRAM_BINS);
        assert_eq!(bins.iter().map(|bin| bin.passed + bin.not_passed).sum::<usize>(), 2);

        let extreme = vec![record("CS", -f64::MAX, false), record("CS", f64::MAX, true)];
        let bins = score_histogram(&extreme, 1.0);
        assert_eq!(bins.len(), MAX_HISTOGRAM_BINS);
        assert_eq!(bins[0].lower, -f64::MAX);
        assert_eq!(bins.iter().map(|bin| bin.passed + bin.not_passed).sum::<usize>(), 2);
    }

    #[test]
    fn histogram_of_identical_scores_has_one_bin() {
        let same = vec![record("CS", 42.0, true), record("EE", 42.0, false)];
        let bins = score_histogram(&same, 1e-300);
        assert_eq!(bins.len(), 1);
        assert_eq!((bins[0].passed, bins[0].not_passed), (1, 1));
    }
}
