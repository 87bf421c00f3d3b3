use std::collections::BTreeMap;

use crate::model::{DuplicateKey, Record, RecordRef, Source};
use crate::normalize::{canonical_key, KeySpec};

/// Per-source lookup from canonical key to rows, with explicit consumption
/// state. Rows are positions in the source's input collection; buckets keep
/// them in insertion order so the first unconsumed row always wins.
/// [`KeyIndex::reference`] maps a position back to the record's own row.
///
/// Built fresh for every run and dropped afterwards.
#[derive(Debug, Clone)]
pub struct KeyIndex {
    source: Source,
    refs: Vec<RecordRef>,
    /// Canonical key per row; empty for invalid rows.
    keys: Vec<String>,
    buckets: BTreeMap<String, Vec<usize>>,
    consumed: Vec<bool>,
}

impl KeyIndex {
    pub fn build(source: Source, records: &[Record], spec: &KeySpec) -> Self {
        let keys: Vec<String> = records.iter().map(|r| canonical_key(r, spec)).collect();
        let refs: Vec<RecordRef> = records
            .iter()
            .map(|r| RecordRef { source, row: r.row })
            .collect();

        let mut buckets: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (row, key) in keys.iter().enumerate() {
            if key.is_empty() {
                tracing::debug!(%source, row = refs[row].row, "record has no identity fields, excluded");
                continue;
            }
            buckets.entry(key.clone()).or_default().push(row);
        }

        Self {
            source,
            refs,
            consumed: vec![false; keys.len()],
            keys,
            buckets,
        }
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn key(&self, row: usize) -> &str {
        &self.keys[row]
    }

    pub fn is_valid(&self, row: usize) -> bool {
        !self.keys[row].is_empty()
    }

    pub fn is_consumed(&self, row: usize) -> bool {
        self.consumed[row]
    }

    /// Mark a row as used. Returns `false` if it was already consumed.
    pub fn consume(&mut self, row: usize) -> bool {
        if self.consumed[row] {
            return false;
        }
        self.consumed[row] = true;
        true
    }

    /// First unconsumed row carrying exactly `key`.
    pub fn lookup_exact(&self, key: &str) -> Option<usize> {
        self.buckets
            .get(key)?
            .iter()
            .copied()
            .find(|&row| !self.consumed[row])
    }

    /// Valid, unconsumed rows in input order.
    pub fn unconsumed(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.keys.len()).filter(|&row| self.is_valid(row) && !self.consumed[row])
    }

    /// Every row not consumed, valid or not, in input order.
    pub fn remaining(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.keys.len()).filter(|&row| !self.consumed[row])
    }

    pub fn invalid_rows(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.keys.len()).filter(|&row| !self.is_valid(row))
    }

    /// Report identity of the record at position `row`.
    pub fn reference(&self, row: usize) -> RecordRef {
        self.refs[row]
    }

    /// Buckets with more than one row, in key order.
    pub fn duplicates(&self) -> Vec<DuplicateKey> {
        self.buckets
            .iter()
            .filter(|(_, rows)| rows.len() > 1)
            .map(|(key, rows)| DuplicateKey {
                source: self.source,
                key: key.clone(),
                rows: rows.iter().map(|&row| self.refs[row].row).collect(),
            })
            .collect()
    }
}
