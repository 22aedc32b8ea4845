//! Per-batch lookup structures.

use std::collections::hash_map;
use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::models::{normalize_lot_number, ProductSnapshot};

/// Map from batch key to resolved entity, built once per batch.
///
/// Read-only after the loader hands it over; a key that is absent did not
/// resolve (or sat in a chunk whose fetch failed).
#[derive(Debug, Clone, PartialEq)]
pub struct LookupTable<T> {
    entries: HashMap<String, T>,
}

impl<T> Default for LookupTable<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T> LookupTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, String, T> {
        self.entries.iter()
    }

    /// Insert unless the key is already present. Returns whether it was inserted.
    pub(crate) fn insert_first(&mut self, key: String, value: T) -> bool {
        match self.entries.entry(key) {
            hash_map::Entry::Occupied(_) => false,
            hash_map::Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }
}

impl<T> FromIterator<(String, T)> for LookupTable<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        let mut table = LookupTable::new();
        for (key, value) in iter {
            table.insert_first(key, value);
        }
        table
    }
}

/// Outcome of one load phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Distinct keys (or key pairs) requested
    pub unique_keys: usize,
    /// Fetches sent to the store
    pub chunks_issued: usize,
    /// Fetches that returned an error
    pub chunks_failed: usize,
    /// Chunks never sent because the load budget ran out
    pub chunks_skipped: usize,
    /// Entities that made it into the lookup structure
    pub resolved: usize,
}

impl LoadReport {
    /// Whether every chunk was fetched successfully.
    pub fn is_complete(&self) -> bool {
        self.chunks_failed == 0 && self.chunks_skipped == 0
    }

    /// Fold another phase's counters into this one.
    pub fn absorb(&mut self, other: &LoadReport) {
        self.unique_keys += other.unique_keys;
        self.chunks_issued += other.chunks_issued;
        self.chunks_failed += other.chunks_failed;
        self.chunks_skipped += other.chunks_skipped;
        self.resolved += other.resolved;
    }
}

/// Everything the rules need to evaluate a reception batch.
#[derive(Debug, Clone, Default)]
pub struct ReceptionLookups {
    /// Products referenced by the batch
    pub products: LookupTable<ProductSnapshot>,
    /// `(product_id, normalized lot number)` pairs already in stock
    pub existing_lots: HashSet<(String, String)>,
    /// Combined load report of both fetch phases
    pub report: LoadReport,
}

impl ReceptionLookups {
    /// Whether `lot_number` is already stocked for `product_id`.
    pub fn has_lot(&self, product_id: &str, lot_number: &str) -> bool {
        self.existing_lots
            .contains(&(product_id.to_string(), normalize_lot_number(lot_number)))
    }
}
