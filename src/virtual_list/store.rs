//! Index-addressable record store.
//!
//! Positions are dense and zero-based. Pages are appended at the next open
//! positions as they arrive; a position that holds a record keeps it until the
//! whole store is discarded. Each discard bumps the generation so results from
//! an older filter set can be recognized and dropped.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ops::Range;

/// One transaction as returned by the fetch endpoint.
///
/// Only the id is interpreted; every other field is passed through untouched
/// to the row renderer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: u64,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl TransactionRecord {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            fields: Map::new(),
        }
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Default)]
pub struct RecordStore {
    records: Vec<TransactionRecord>,
    total_count: usize,
    generation: u64,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record at `index`, if its page has arrived
    pub fn get(&self, index: usize) -> Option<&TransactionRecord> {
        self.records.get(index)
    }

    /// Number of positions that hold a record
    pub fn loaded_count(&self) -> usize {
        self.records.len()
    }

    /// Number of positions the list spans (loaded or not)
    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_loaded(&self, index: usize) -> bool {
        index < self.records.len()
    }

    /// Appends a page and updates the reported total.
    ///
    /// The total never drops below the number of loaded positions. Returns the
    /// range of positions the page now occupies.
    pub fn append(&mut self, records: Vec<TransactionRecord>, reported_total: usize) -> Range<usize> {
        let start = self.records.len();
        self.records.extend(records);
        let end = self.records.len();
        self.total_count = reported_total.max(end);
        start..end
    }

    /// Marks the list as complete: no positions beyond the loaded ones.
    pub fn seal(&mut self) {
        self.total_count = self.records.len();
    }

    /// Discards every record and starts a new generation.
    pub fn reset(&mut self) -> u64 {
        self.records.clear();
        self.total_count = 0;
        self.generation += 1;
        self.generation
    }
}
