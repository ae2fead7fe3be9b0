//! Engine error types.
//!
//! Load-side failures (schema, format, decoding) abort the load of a single
//! round source; read-side failures (unknown filter column) are returned so
//! the caller can pick a fallback instead of the engine swallowing them.

use thiserror::Error;

/// Errors produced by the analytics engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// One or more required columns are absent from a source table.
    #[error("missing required column(s): {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    /// The source type could not be recognized or has no decoder.
    #[error("unsupported source format: {0}")]
    UnsupportedFormat(String),

    /// A filter referenced a column the dataset does not have.
    #[error("column '{0}' not found for filter")]
    FilterColumn(String),

    /// The delimited text could not be parsed.
    #[error("malformed delimited data: {0}")]
    Csv(#[from] csv::Error),

    /// Source bytes could not be decoded with the requested encoding.
    #[error("failed to decode source: {0}")]
    Decode(String),

    /// The round number could not be derived for a source.
    #[error("cannot determine round number for '{0}'")]
    RoundNumber(String),

    /// Every round source failed to load.
    #[error("no round could be loaded ({skipped} source(s) skipped)")]
    NoRoundsLoaded { skipped: usize },

    /// The engine configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    /// Returns `true` when the failure is confined to a single source and
    /// other rounds may still load.
    pub fn is_source_local(&self) -> bool {
        matches!(
            self,
            EngineError::Schema { .. }
                | EngineError::UnsupportedFormat(_)
                | EngineError::Csv(_)
                | EngineError::Decode(_)
                | EngineError::RoundNumber(_)
        )
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
