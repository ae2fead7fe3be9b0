//! Typed result rows and the logical column vocabulary.
//!
//! A [`Record`] is one student's result for one subject in one round. Every
//! textual attribute is always a string (never absent); numeric attributes
//! carry their fill values once normalized.

use std::{borrow::Cow, fmt};

use serde::{Deserialize, Serialize};

/// Text stored for an absent textual attribute.
pub const MISSING_TEXT: &str = "nan";
/// Academic-year used when the source leaves it blank.
pub const DEFAULT_YEAR: &str = "1";
/// Score used when the source value is absent or unparsable.
pub const DEFAULT_SCORE: f64 = 0.0;
/// Sequence number used when the source value is absent or unparsable.
pub const DEFAULT_SEQUENCE: i64 = 1;

/// Logical columns of the normalized schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Sequence,
    Subject,
    Email,
    PassFail,
    Score,
    Level,
    Department,
    Year,
    StudentNumber,
    Round,
}

impl Column {
    /// Columns every round source must provide.
    pub const REQUIRED: [Column; 9] = [
        Column::Sequence,
        Column::Subject,
        Column::Email,
        Column::PassFail,
        Column::Score,
        Column::Level,
        Column::Department,
        Column::Year,
        Column::StudentNumber,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Column::Sequence => "no",
            Column::Subject => "subject",
            Column::Email => "email",
            Column::PassFail => "pass_fail",
            Column::Score => "score",
            Column::Level => "level",
            Column::Department => "department",
            Column::Year => "year",
            Column::StudentNumber => "student_number",
            Column::Round => "round",
        }
    }

    /// Header label used by the original result exports.
    pub fn default_label(&self) -> &'static str {
        match self {
            Column::Sequence => "No.",
            Column::Subject => "시험과목",
            Column::Email => "이메일",
            Column::PassFail => "합격여부",
            Column::Score => "총점",
            Column::Level => "등급(Lv.)",
            Column::Department => "학과",
            Column::Year => "학년",
            Column::StudentNumber => "학번",
            Column::Round => "회차",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Column::Sequence | Column::Score | Column::Round)
    }

    /// Resolves a logical name, alias, or default header label.
    pub fn from_name(name: &str) -> Option<Column> {
        let trimmed = name.trim();
        let normalized = normalize_column_name(trimmed);
        [Column::Round]
            .into_iter()
            .chain(Column::REQUIRED)
            .find(|column| {
                column.default_label() == trimmed
                    || column.name() == normalized
                    || column.aliases().contains(&normalized.as_str())
            })
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Column::Sequence => &["no_", "seq", "sequence"],
            Column::Subject => &["test_subject"],
            Column::Email => &["student_email", "e_mail"],
            Column::PassFail => &["pass", "passed", "result", "status"],
            Column::Score => &["total", "total_score"],
            Column::Level => &["grade", "tier", "level_lv__"],
            Column::Department => &["dept", "major"],
            Column::Year => &["academic_year", "grade_year"],
            Column::StudentNumber => &["student_no", "student_id"],
            Column::Round => &["round_number"],
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lower-cases a header and replaces anything outside `[a-z0-9]` with `_`.
pub fn normalize_column_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' => c,
            _ => '_',
        })
        .collect::<String>()
        .to_ascii_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pass,
    Fail,
    /// Label matched neither configured pass nor fail label.
    Unknown,
}

/// Pass/fail as supplied by the source.
///
/// The literal label is kept for display; arithmetic only ever looks at
/// [`PassStatus::is_pass`]. The outcome is never derived from the score.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PassStatus {
    pub outcome: Outcome,
    pub label: String,
}

impl PassStatus {
    pub fn from_label(label: &str, pass_label: &str, fail_label: &str) -> Self {
        let trimmed = label.trim();
        let outcome = if trimmed == pass_label {
            Outcome::Pass
        } else if trimmed == fail_label {
            Outcome::Fail
        } else {
            Outcome::Unknown
        };
        Self {
            outcome,
            label: label.to_string(),
        }
    }

    pub fn pass(label: &str) -> Self {
        Self {
            outcome: Outcome::Pass,
            label: label.to_string(),
        }
    }

    pub fn fail(label: &str) -> Self {
        Self {
            outcome: Outcome::Fail,
            label: label.to_string(),
        }
    }

    pub fn is_pass(&self) -> bool {
        self.outcome == Outcome::Pass
    }

    /// 0/1 indicator for rate computations.
    pub fn indicator(&self) -> f64 {
        if self.is_pass() { 1.0 } else { 0.0 }
    }
}

impl fmt::Display for PassStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// One normalized result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub round: u32,
    pub sequence: i64,
    pub subject: String,
    pub email: String,
    pub pass_fail: PassStatus,
    pub score: f64,
    pub level: String,
    pub department: String,
    pub year: String,
    pub student_number: String,
}

impl Record {
    /// Canonical text of a column, used for grouping and equality filters.
    pub fn text(&self, column: Column) -> Cow<'_, str> {
        match column {
            Column::Sequence => Cow::Owned(self.sequence.to_string()),
            Column::Subject => Cow::Borrowed(&self.subject),
            Column::Email => Cow::Borrowed(&self.email),
            Column::PassFail => Cow::Borrowed(&self.pass_fail.label),
            Column::Score => Cow::Owned(format_number(self.score)),
            Column::Level => Cow::Borrowed(&self.level),
            Column::Department => Cow::Borrowed(&self.department),
            Column::Year => Cow::Borrowed(&self.year),
            Column::StudentNumber => Cow::Borrowed(&self.student_number),
            Column::Round => Cow::Owned(self.round.to_string()),
        }
    }

    /// Exact-equality test of one column against a constraint value.
    ///
    /// Numeric columns compare numerically so `80` and `80.0` agree; every
    /// other column, academic-year included, compares as text.
    pub fn matches(&self, column: Column, value: &str) -> bool {
        match column {
            Column::Score => parse_f64(value).is_some_and(|v| v == self.score),
            Column::Sequence => parse_f64(value).is_some_and(|v| v == self.sequence as f64),
            Column::Round => parse_f64(value).is_some_and(|v| v == f64::from(self.round)),
            _ => self.text(column) == value,
        }
    }
}

fn parse_f64(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Renders integral values without a fraction, others with up to four digits.
pub fn format_number(value: f64) -> String {
    let rendered = if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.4}")
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    };
    if rendered == "-0" {
        "0".to_string()
    } else {
        rendered
    }
}
