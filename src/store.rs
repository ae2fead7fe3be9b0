//! In-memory store of normalized rounds, keyed by round number.
//!
//! The store is the only mutable state in the engine. It is built once
//! (construct, then one [`RoundStore::load`] per round) and afterwards read
//! by the pure analytics functions. Loading is not internally synchronized:
//! callers serialize writes, and two loads of the same round key leave the
//! last one in place.

use std::collections::BTreeMap;

use encoding_rs::Encoding;
use log::{info, warn};
use serde::Serialize;

use crate::{
    config::EngineConfig,
    error::{EngineError, EngineResult},
    record::Record,
    schema::{self, NormalizeReport},
    source::{self, RawTable},
};

/// Records of one test round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Round {
    pub number: u32,
    pub source: Option<String>,
    pub records: Vec<Record>,
}

impl Round {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Content of a round source handed over by the loader.
#[derive(Debug, Clone)]
pub enum SourcePayload {
    /// Undecoded delimited text; the format follows the source name.
    Bytes(Vec<u8>),
    /// A table parsed elsewhere, e.g. from a spreadsheet.
    Table(RawTable),
}

#[derive(Debug, Clone)]
pub struct RoundSource {
    pub name: String,
    /// Explicit round number; derived from `name` when absent.
    pub round: Option<u32>,
    pub payload: SourcePayload,
}

impl RoundSource {
    pub fn bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            round: None,
            payload: SourcePayload::Bytes(bytes),
        }
    }

    pub fn table(name: impl Into<String>, round: u32, table: RawTable) -> Self {
        Self {
            name: name.into(),
            round: Some(round),
            payload: SourcePayload::Table(table),
        }
    }

    pub fn with_round(mut self, round: u32) -> Self {
        self.round = Some(round);
        self
    }
}

/// Outcome of a multi-source load.
#[derive(Debug, Default)]
pub struct LoadSummary {
    pub loaded: Vec<u32>,
    pub skipped: Vec<(String, EngineError)>,
}

#[derive(Debug, Clone, Default)]
pub struct RoundStore {
    config: EngineConfig,
    rounds: BTreeMap<u32, Round>,
}

impl RoundStore {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            rounds: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Normalizes `table` and stores it under `round`, replacing any prior
    /// entry. On failure the store is left untouched.
    pub fn load(&mut self, round: u32, table: &RawTable) -> EngineResult<NormalizeReport> {
        self.load_named(round, None, table)
    }

    fn load_named(
        &mut self,
        round: u32,
        source: Option<&str>,
        table: &RawTable,
    ) -> EngineResult<NormalizeReport> {
        let (records, report) = schema::normalize(table, round, &self.config)?;
        let replaced = self
            .rounds
            .insert(
                round,
                Round {
                    number: round,
                    source: source.map(str::to_string),
                    records,
                },
            )
            .is_some();
        info!(
            "Loaded round {round}{} with {} row(s){}",
            source.map(|s| format!(" from '{s}'")).unwrap_or_default(),
            report.rows,
            if replaced { " (replaced)" } else { "" }
        );
        Ok(report)
    }

    /// Parses and loads one source, deriving the round number from its name
    /// when not given explicitly. Returns the round number loaded.
    pub fn load_source(
        &mut self,
        source: &RoundSource,
        encoding: &'static Encoding,
    ) -> EngineResult<u32> {
        let round = match source.round {
            Some(round) if round > 0 => round,
            Some(_) => return Err(EngineError::RoundNumber(source.name.clone())),
            None => source::round_from_name(&source.name, &self.config.round_regex()?)?,
        };
        match &source.payload {
            SourcePayload::Bytes(bytes) => {
                let table = source::parse_source(&source.name, bytes, encoding)?;
                self.load_named(round, Some(&source.name), &table)?;
            }
            SourcePayload::Table(table) => {
                self.load_named(round, Some(&source.name), table)?;
            }
        }
        Ok(round)
    }

    /// Loads every source, skipping source-local failures with a warning.
    /// Fails when no source loaded or the configuration itself is unusable.
    pub fn load_all(
        &mut self,
        sources: &[RoundSource],
        encoding: &'static Encoding,
    ) -> EngineResult<LoadSummary> {
        let mut summary = LoadSummary::default();
        for source in sources {
            match self.load_source(source, encoding) {
                Ok(round) => summary.loaded.push(round),
                Err(err) if !err.is_source_local() => return Err(err),
                Err(err) => {
                    warn!("Skipping round source '{}': {err}", source.name);
                    summary.skipped.push((source.name.clone(), err));
                }
            }
        }
        if summary.loaded.is_empty() {
            return Err(EngineError::NoRoundsLoaded {
                skipped: summary.skipped.len(),
            });
        }
        Ok(summary)
    }

    pub fn get(&self, round: u32) -> Option<&Round> {
        self.rounds.get(&round)
    }

    /// Rounds in ascending round-number order.
    pub fn rounds(&self) -> impl Iterator<Item = &Round> {
        self.rounds.values()
    }

    pub fn round_numbers(&self) -> Vec<u32> {
        self.rounds.keys().copied().collect()
    }

    pub fn latest(&self) -> Option<&Round> {
        self.rounds.values().next_back()
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    /// Union of all rounds, each record carrying its round number.
    pub fn all_records(&self) -> Vec<Record> {
        self.rounds
            .values()
            .flat_map(|round| round.records.iter().cloned())
            .collect()
    }

    /// Records from every round whose department equals `department`.
    pub fn restrict_to_department(&self, department: &str) -> Vec<Record> {
        self.rounds
            .values()
            .flat_map(|round| round.records.iter())
            .filter(|record| record.department == department)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::UTF_8;

    const HEADER: &str = "No.,시험과목,이메일,합격여부,총점,등급(Lv.),학과,학년,학번\n";

    fn csv(rows: &[&str]) -> Vec<u8> {
        let mut text = HEADER.to_string();
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        text.into_bytes()
    }

    #[test]
    fn load_overwrites_same_round() {
        let mut store = RoundStore::default();
        store
            .load_source(
                &RoundSource::bytes("PCC_1회.csv", csv(&["1,C,a@x,합격,80,B,CS,2,1"])),
                UTF_8,
            )
            .expect("first load");
        store
            .load_source(
                &RoundSource::bytes(
                    "PCC_1회 재업로드.csv",
                    csv(&["1,C,a@x,합격,80,B,CS,2,1", "2,C,b@x,불합격,20,E,EE,1,2"]),
                ),
                UTF_8,
            )
            .expect("second load");
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(1).map(Round::len), Some(2));
        assert_eq!(
            store.get(1).and_then(|round| round.source.as_deref()),
            Some("PCC_1회 재업로드.csv")
        );
    }

    #[test]
    fn failed_load_leaves_store_unchanged() {
        let mut store = RoundStore::default();
        store
            .load_source(
                &RoundSource::bytes("round1.csv", csv(&["1,C,a@x,합격,80,B,CS,2,1"])),
                UTF_8,
            )
            .expect("load");
        let bad = RoundSource::bytes("round2.csv", b"email,score\na@x,10\n".to_vec());
        assert!(matches!(
            store.load_source(&bad, UTF_8),
            Err(EngineError::Schema { .. })
        ));
        assert_eq!(store.round_numbers(), vec![1]);
    }

    #[test]
    fn load_all_skips_failures_and_orders_rounds() {
        let mut store = RoundStore::default();
        let sources = vec![
            RoundSource::bytes("round3.csv", csv(&["1,C,a@x,합격,90,A,CS,2,1"])),
            RoundSource::bytes("round1.csv", csv(&["1,C,a@x,불합격,40,D,CS,2,1"])),
            RoundSource::bytes("round2.xlsx", Vec::new()),
            RoundSource::bytes("notes.csv", csv(&[])),
        ];
        let summary = store.load_all(&sources, UTF_8).expect("partial load");
        assert_eq!(summary.loaded, vec![3, 1]);
        assert_eq!(summary.skipped.len(), 2);
        assert_eq!(store.round_numbers(), vec![1, 3]);
        assert_eq!(store.latest().map(|round| round.number), Some(3));
    }

    #[test]
    fn load_all_fails_when_nothing_loads() {
        let mut store = RoundStore::default();
        let sources = vec![RoundSource::bytes("round1.json", Vec::new())];
        assert!(matches!(
            store.load_all(&sources, UTF_8),
            Err(EngineError::NoRoundsLoaded { skipped: 1 })
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn invalid_round_pattern_aborts_load_all() {
        let config = EngineConfig {
            round_pattern: "(".to_string(),
            ..EngineConfig::default()
        };
        let mut store = RoundStore::new(config);
        let sources = vec![RoundSource::bytes("round1.csv", csv(&["1,C,a@x,합격,80,B,CS,2,1"]))];
        assert!(matches!(
            store.load_all(&sources, UTF_8),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn restrict_to_department_spans_rounds() {
        let mut store = RoundStore::default();
        let table = |rows: &[&str]| {
            source::parse_delimited(&csv(rows), b',', UTF_8).expect("parse")
        };
        store
            .load(2, &table(&["1,C,a@x,합격,90,A,CS,2,1", "2,C,b@x,합격,70,B,EE,2,2"]))
            .unwrap();
        store.load(1, &table(&["1,C,a@x,불합격,40,D,CS,2,1"])).unwrap();
        let cs = store.restrict_to_department("CS");
        assert_eq!(cs.iter().map(|r| r.round).collect::<Vec<_>>(), vec![1, 2]);
        assert!(store.restrict_to_department("ME").is_empty());
        assert_eq!(store.all_records().len(), 3);
    }

    #[test]
    fn explicit_round_overrides_name_and_zero_is_rejected() {
        let mut store = RoundStore::default();
        let source = RoundSource::bytes("export.csv", csv(&["1,C,a@x,합격,90,A,CS,2,1"]));
        assert!(matches!(
            store.load_source(&source, UTF_8),
            Err(EngineError::RoundNumber(_))
        ));
        assert_eq!(store.load_source(&source.clone().with_round(5), UTF_8).unwrap(), 5);
        assert!(store.load_source(&source.with_round(0), UTF_8).is_err());
    }
}
