use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::record::{Column, Record};

/// Value counts for one column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FrequencyTable {
    pub column: Option<Column>,
    pub total: usize,
    pub counts: BTreeMap<String, usize>,
}

impl FrequencyTable {
    pub fn get(&self, value: &str) -> usize {
        self.counts.get(value).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Entries ordered by count descending, then value ascending; `top == 0`
    /// keeps everything.
    pub fn ranked(&self, top: usize) -> Vec<(String, usize)> {
        let mut items = self
            .counts
            .iter()
            .map(|(value, count)| (value.clone(), *count))
            .collect::<Vec<_>>();
        items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        if top > 0 && items.len() > top {
            items.truncate(top);
        }
        items
    }

    pub fn render_rows(&self, top: usize) -> Vec<Vec<String>> {
        if self.total == 0 {
            return Vec::new();
        }
        let name = self
            .column
            .map(|column| column.name().to_string())
            .unwrap_or_default();
        self.ranked(top)
            .into_iter()
            .map(|(value, count)| {
                let percent = (count as f64 / self.total as f64) * 100.0;
                vec![
                    name.clone(),
                    value,
                    count.to_string(),
                    format!("{percent:.2}%"),
                ]
            })
            .collect()
    }
}

struct FrequencyAccumulator {
    columns: Vec<Column>,
    tables: HashMap<Column, FrequencyTable>,
}

impl FrequencyAccumulator {
    fn new(columns: &[Column]) -> Self {
        let tables = columns
            .iter()
            .map(|column| {
                (
                    *column,
                    FrequencyTable {
                        column: Some(*column),
                        ..FrequencyTable::default()
                    },
                )
            })
            .collect();
        Self {
            columns: columns.to_vec(),
            tables,
        }
    }

    fn ingest(&mut self, record: &Record) {
        for column in &self.columns {
            if let Some(table) = self.tables.get_mut(column) {
                table.total += 1;
                *table
                    .counts
                    .entry(record.text(*column).into_owned())
                    .or_insert(0) += 1;
            }
        }
    }

    fn finish(mut self) -> Vec<FrequencyTable> {
        self.columns
            .iter()
            .filter_map(|column| self.tables.remove(column))
            .collect()
    }
}

/// Counts values of every requested column in a single pass.
pub fn frequencies(records: &[Record], columns: &[Column]) -> Vec<FrequencyTable> {
    let mut accumulator = FrequencyAccumulator::new(columns);
    for record in records {
        accumulator.ingest(record);
    }
    accumulator.finish()
}

pub fn frequency(records: &[Record], column: Column) -> FrequencyTable {
    frequencies(records, &[column]).pop().unwrap_or_default()
}
