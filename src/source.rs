//! Raw round sources: format detection, decoding, and delimited parsing.
//!
//! The engine never opens files itself. Callers hand over the bytes of a
//! round source (plus its name, used for format and round detection) or an
//! already parsed [`RawTable`], for example from a spreadsheet reader.
//!
//! - **Format**: extension based (`.csv` → comma, `.tsv` → tab). Spreadsheet
//!   extensions are recognized but must arrive pre-parsed.
//! - **Encoding**: any `encoding_rs` label, defaulting to UTF-8; a BOM always
//!   wins over the requested encoding.
//! - **Round number**: extracted from the source name with a configurable
//!   pattern, e.g. `부산대학교 PCC_3회 응시 결과.csv` → 3.

use std::path::Path;

use encoding_rs::{Encoding, UTF_8};
use regex::Regex;
use serde::Serialize;

use crate::error::{EngineError, EngineResult};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

/// Shared empty cell returned for out-of-range lookups.
pub static EMPTY_CELL: RawCell = RawCell::Empty;

/// One cell of a parsed source, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RawCell {
    Empty,
    Text(String),
    Number(f64),
}

impl RawCell {
    pub fn text(value: &str) -> Self {
        if value.trim().is_empty() {
            RawCell::Empty
        } else {
            RawCell::Text(value.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RawCell::Empty => true,
            RawCell::Text(text) => text.trim().is_empty(),
            RawCell::Number(value) => value.is_nan(),
        }
    }
}

impl From<&str> for RawCell {
    fn from(value: &str) -> Self {
        RawCell::text(value)
    }
}

impl From<f64> for RawCell {
    fn from(value: f64) -> Self {
        RawCell::Number(value)
    }
}

/// A parsed but untyped table: header labels plus rows of cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<RawCell>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<RawCell>>) -> Self {
        Self { headers, rows }
    }

    /// Builds a table from string cells; blank strings become [`RawCell::Empty`].
    pub fn from_text_rows<S: AsRef<str>>(headers: &[S], rows: &[Vec<S>]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.as_ref().to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|cell| RawCell::text(cell.as_ref())).collect())
                .collect(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn cell(&self, row: usize, column: usize) -> &RawCell {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .unwrap_or(&EMPTY_CELL)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Tsv,
    Spreadsheet,
}

impl SourceFormat {
    pub fn from_name(name: &str) -> EngineResult<Self> {
        let extension = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("csv") => Ok(SourceFormat::Csv),
            Some("tsv") => Ok(SourceFormat::Tsv),
            Some("xlsx" | "xls") => Ok(SourceFormat::Spreadsheet),
            _ => Err(EngineError::UnsupportedFormat(name.to_string())),
        }
    }

    pub fn delimiter(&self) -> Option<u8> {
        match self {
            SourceFormat::Csv => Some(DEFAULT_CSV_DELIMITER),
            SourceFormat::Tsv => Some(DEFAULT_TSV_DELIMITER),
            SourceFormat::Spreadsheet => None,
        }
    }
}

pub fn resolve_encoding(label: Option<&str>) -> EngineResult<&'static Encoding> {
    match label {
        Some(value) => Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| EngineError::Decode(format!("unknown encoding '{value}'"))),
        None => Ok(UTF_8),
    }
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> EngineResult<String> {
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(EngineError::Decode(format!(
            "invalid byte sequence for encoding {}",
            used.name()
        )))
    } else {
        Ok(text.into_owned())
    }
}

/// Parses delimited text into a [`RawTable`].
///
/// Rows shorter than the header are padded with empty cells; extra trailing
/// cells are dropped.
pub fn parse_delimited(
    bytes: &[u8],
    delimiter: u8,
    encoding: &'static Encoding,
) -> EngineResult<RawTable> {
    let text = decode_bytes(bytes, encoding)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect::<Vec<_>>();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        let mut cells = record
            .iter()
            .take(headers.len())
            .map(RawCell::text)
            .collect::<Vec<_>>();
        cells.resize(headers.len(), RawCell::Empty);
        rows.push(cells);
    }
    Ok(RawTable { headers, rows })
}

/// Detects the format from `name` and parses `bytes` accordingly.
pub fn parse_source(
    name: &str,
    bytes: &[u8],
    encoding: &'static Encoding,
) -> EngineResult<RawTable> {
    let format = SourceFormat::from_name(name)?;
    match format.delimiter() {
        Some(delimiter) => parse_delimited(bytes, delimiter, encoding),
        None => Err(EngineError::UnsupportedFormat(format!(
            "{name} (spreadsheet sources must be supplied as a parsed table)"
        ))),
    }
}

/// Extracts a round number from a source name using the first capture group
/// of `pattern` that participates in the match.
pub fn round_from_name(name: &str, pattern: &Regex) -> EngineResult<u32> {
    let file_name = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(name);
    pattern
        .captures(file_name)
        .and_then(|caps| caps.iter().skip(1).flatten().next())
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|round| *round > 0)
        .ok_or_else(|| EngineError::RoundNumber(name.to_string()))
}
