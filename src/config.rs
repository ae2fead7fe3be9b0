//! Engine configuration, persisted as YAML.
//!
//! Every field has a default matching the original result exports, so an
//! empty document (or no file at all) yields a usable configuration.

use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    aggregate::EmptyRoundPolicy,
    error::{EngineError, EngineResult},
    identity::IdentityMode,
    record::Column,
};

pub const DEFAULT_PASS_LABEL: &str = "합격";
pub const DEFAULT_FAIL_LABEL: &str = "불합격";
pub const DEFAULT_ROUND_PATTERN: &str = r"(?i)(?:(\d+)\s*회|round[ _-]?(\d+))";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Header label overrides per logical column.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub columns: BTreeMap<Column, String>,
    pub pass_label: String,
    pub fail_label: String,
    pub top_tier_levels: Vec<String>,
    pub repeat_threshold: usize,
    pub identity: IdentityMode,
    pub round_pattern: String,
    pub empty_rounds: EmptyRoundPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            columns: BTreeMap::new(),
            pass_label: DEFAULT_PASS_LABEL.to_string(),
            fail_label: DEFAULT_FAIL_LABEL.to_string(),
            top_tier_levels: vec!["A".to_string(), "B".to_string()],
            repeat_threshold: 2,
            identity: IdentityMode::default(),
            round_pattern: DEFAULT_ROUND_PATTERN.to_string(),
            empty_rounds: EmptyRoundPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let reader = BufReader::new(file);
        let config: EngineConfig =
            serde_yaml::from_reader(reader).context("Parsing config YAML")?;
        config
            .validate()
            .with_context(|| format!("Validating config {path:?}"))?;
        Ok(config)
    }

    pub fn from_yaml_str(input: &str) -> EngineResult<Self> {
        let config: EngineConfig =
            serde_yaml::from_str(input).map_err(|err| EngineError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Serializing config to YAML string")
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.pass_label.trim().is_empty() || self.fail_label.trim().is_empty() {
            return Err(EngineError::Config(
                "pass_label and fail_label must be non-empty".to_string(),
            ));
        }
        if self.pass_label == self.fail_label {
            return Err(EngineError::Config(format!(
                "pass_label and fail_label are both '{}'",
                self.pass_label
            )));
        }
        if self.repeat_threshold == 0 {
            return Err(EngineError::Config(
                "repeat_threshold must be at least 1".to_string(),
            ));
        }
        if let Some(column) = self
            .columns
            .iter()
            .find(|(_, label)| label.trim().is_empty())
            .map(|(column, _)| column)
        {
            return Err(EngineError::Config(format!(
                "empty header label for column '{column}'"
            )));
        }
        let regex = self.round_regex()?;
        if regex.captures_len() < 2 {
            return Err(EngineError::Config(format!(
                "round_pattern '{}' needs a capture group",
                self.round_pattern
            )));
        }
        Ok(())
    }

    pub fn round_regex(&self) -> EngineResult<Regex> {
        Regex::new(&self.round_pattern)
            .map_err(|err| EngineError::Config(format!("round_pattern: {err}")))
    }

    /// Header label expected for a column.
    pub fn label(&self, column: Column) -> &str {
        self.columns
            .get(&column)
            .map(String::as_str)
            .unwrap_or_else(|| column.default_label())
    }

    /// Maps a source header to a logical column.
    ///
    /// Configured labels win over built-in labels and aliases.
    pub fn column_for_header(&self, header: &str) -> Option<Column> {
        let trimmed = header.trim();
        self.columns
            .iter()
            .find(|(_, label)| label.trim() == trimmed)
            .map(|(column, _)| *column)
            .or_else(|| Column::from_name(trimmed))
    }

    pub fn is_top_tier(&self, level: &str) -> bool {
        self.top_tier_levels.iter().any(|tier| tier == level)
    }
}
