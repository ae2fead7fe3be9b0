//! Schema normalization: raw round tables to typed [`Record`]s.
//!
//! ## Responsibilities
//!
//! - Header resolution against configured labels and built-in aliases
//! - Required-column verification, reporting every missing column at once
//! - Per-cell coercion with fill values instead of row rejection
//!
//! A bad cell never drops its row. Numeric columns fall back to
//! [`DEFAULT_SEQUENCE`] / [`DEFAULT_SCORE`], academic-year to
//! [`DEFAULT_YEAR`], and the remaining text columns to [`MISSING_TEXT`].

use std::collections::BTreeMap;

use log::debug;
use serde::Serialize;

use crate::{
    config::EngineConfig,
    error::{EngineError, EngineResult},
    record::{
        Column, DEFAULT_SCORE, DEFAULT_SEQUENCE, DEFAULT_YEAR, MISSING_TEXT, PassStatus, Record,
    },
    source::{EMPTY_CELL, RawCell, RawTable},
};

/// Largest magnitude rendered as an integer when stringifying numeric cells.
const INTEGRAL_RENDER_LIMIT: f64 = 1e15;

/// Positions of the required columns within a source table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    positions: BTreeMap<Column, usize>,
}

impl ColumnMapping {
    /// Resolves every required column, failing with the full list of
    /// missing labels.
    pub fn resolve(headers: &[String], config: &EngineConfig) -> EngineResult<Self> {
        let mut positions = BTreeMap::new();
        for (idx, header) in headers.iter().enumerate() {
            if let Some(column) = config.column_for_header(header)
                && column != Column::Round
            {
                positions.entry(column).or_insert(idx);
            }
        }
        let missing = Column::REQUIRED
            .iter()
            .filter(|column| !positions.contains_key(*column))
            .map(|column| config.label(*column).to_string())
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(EngineError::Schema { missing });
        }
        Ok(Self { positions })
    }

    pub fn position(&self, column: Column) -> Option<usize> {
        self.positions.get(&column).copied()
    }
}

/// Fill counts gathered while normalizing one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeReport {
    pub rows: usize,
    pub filled: BTreeMap<Column, usize>,
}

impl NormalizeReport {
    fn record_fill(&mut self, column: Column) {
        *self.filled.entry(column).or_insert(0) += 1;
    }

    pub fn total_fills(&self) -> usize {
        self.filled.values().sum()
    }
}

/// Coerces `table` into records stamped with `round`.
pub fn normalize(
    table: &RawTable,
    round: u32,
    config: &EngineConfig,
) -> EngineResult<(Vec<Record>, NormalizeReport)> {
    let mapping = ColumnMapping::resolve(&table.headers, config)?;
    let mut report = NormalizeReport::default();
    let mut records = Vec::with_capacity(table.row_count());

    for row in 0..table.row_count() {
        let cell = |column: Column| {
            mapping
                .position(column)
                .map_or(&EMPTY_CELL, |idx| table.cell(row, idx))
        };

        let sequence = coerce_sequence(cell(Column::Sequence)).unwrap_or_else(|| {
            report.record_fill(Column::Sequence);
            DEFAULT_SEQUENCE
        });
        let score = coerce_score(cell(Column::Score)).unwrap_or_else(|| {
            report.record_fill(Column::Score);
            DEFAULT_SCORE
        });
        let year = coerce_text(cell(Column::Year)).unwrap_or_else(|| {
            report.record_fill(Column::Year);
            DEFAULT_YEAR.to_string()
        });
        let mut text = |column: Column| -> String {
            coerce_text(cell(column)).unwrap_or_else(|| {
                report.record_fill(column);
                MISSING_TEXT.to_string()
            })
        };
        let subject = text(Column::Subject);
        let email = text(Column::Email);
        let pass_label = text(Column::PassFail);
        let level = text(Column::Level);
        let department = text(Column::Department);
        let student_number = text(Column::StudentNumber);

        records.push(Record {
            round,
            sequence,
            subject,
            email,
            pass_fail: PassStatus::from_label(&pass_label, &config.pass_label, &config.fail_label),
            score,
            level,
            department,
            year,
            student_number,
        });
    }

    report.rows = records.len();
    if report.total_fills() > 0 {
        debug!(
            "Round {round}: filled {} cell(s) with defaults across {} row(s): {:?}",
            report.total_fills(),
            report.rows,
            report.filled
        );
    }
    Ok((records, report))
}

/// Parses a score; `None` when absent, unparsable, or non-finite.
pub fn coerce_score(cell: &RawCell) -> Option<f64> {
    match cell {
        RawCell::Empty => None,
        RawCell::Number(value) => Some(*value).filter(|v| v.is_finite()),
        RawCell::Text(text) => parse_numeric_text(text),
    }
}

/// Parses a positive sequence number; integral floats such as `3.0` are
/// accepted. Zero and negative values count as unparseable.
pub fn coerce_sequence(cell: &RawCell) -> Option<i64> {
    coerce_score(cell)
        .filter(|value| {
            value.fract() == 0.0 && *value >= 1.0 && *value < INTEGRAL_RENDER_LIMIT
        })
        .map(|value| value as i64)
}

/// Stringifies any non-empty cell.
pub fn coerce_text(cell: &RawCell) -> Option<String> {
    match cell {
        RawCell::Empty => None,
        RawCell::Text(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        RawCell::Number(value) if value.is_nan() => None,
        RawCell::Number(value) => Some(render_number(*value)),
    }
}

fn parse_numeric_text(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let cleaned = if trimmed.contains(',') {
        trimmed.replace(',', "")
    } else {
        trimmed.to_string()
    };
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Integral values render without a fraction so spreadsheet codes such as
/// `2.0` compare equal to a text `2`.
fn render_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < INTEGRAL_RENDER_LIMIT {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}
