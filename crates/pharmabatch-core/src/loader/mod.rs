//! Chunked batch loading.
//!
//! Keys are deduplicated, split into chunks of at most
//! [`LoaderConfig::chunk_size`], and each chunk is fetched with exactly one
//! store call. Chunks run one after the other in key order, so the resulting
//! table is deterministic for a given key set.
//!
//! A chunk that fails is logged and contributes nothing: records whose keys
//! were in it later surface as "not found" instead of aborting the batch.
//! The same applies to chunks that are never sent because the load budget
//! ran out.

mod lookup;

pub use lookup::*;

use std::collections::{BTreeSet, HashSet};
use std::time::Instant;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::{LoaderConfig, MAX_CHUNK_SIZE};
use crate::models::{normalize_lot_number, ReceptionLine};
use crate::store::{Entity, EntityStore, StoreResult, LOTS_TABLE, PRODUCTS_TABLE};

/// Batch loader over an injected store.
pub struct BatchLoader<S> {
    store: S,
    config: LoaderConfig,
}

impl<S: EntityStore> BatchLoader<S> {
    /// Create a loader. The chunk size is clamped to `1..=MAX_CHUNK_SIZE`.
    pub fn new(store: S, mut config: LoaderConfig) -> Self {
        config.chunk_size = config.chunk_size.clamp(1, MAX_CHUNK_SIZE);
        Self { store, config }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Number of fetches needed for `unique` distinct keys.
    pub fn chunk_count(&self, unique: usize) -> usize {
        unique.div_ceil(self.config.chunk_size)
    }

    /// Resolve `keys` from `table` into a lookup table of raw entities.
    ///
    /// One entity per key; if the store returns several for the same key the
    /// first one is kept.
    pub fn load_entities<I, K>(&self, table: &str, keys: I) -> (LookupTable<Entity>, LoadReport)
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.load_entities_until(table, keys, self.deadline())
    }

    /// Resolve `keys` and decode each payload as `T`.
    ///
    /// A payload that fails to decode is logged and left out, so it reads as
    /// "not found" downstream.
    pub fn load_typed<T, I, K>(&self, table: &str, keys: I) -> (LookupTable<T>, LoadReport)
    where
        T: DeserializeOwned,
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.load_typed_until(table, keys, self.deadline())
    }

    /// Resolve which `(key, sub_key)` pairs exist in `table`.
    pub fn load_existing_pairs<I>(
        &self,
        table: &str,
        pairs: I,
    ) -> (HashSet<(String, String)>, LoadReport)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.load_existing_pairs_until(table, pairs, self.deadline())
    }

    /// Load products and existing lots for a reception batch.
    ///
    /// Both phases share one load budget. Lot numbers in the returned set
    /// are normalized.
    pub fn load_reception_lookups(&self, lines: &[ReceptionLine]) -> ReceptionLookups {
        let deadline = self.deadline();

        let (products, mut report) = self.load_typed_until(
            PRODUCTS_TABLE,
            lines.iter().map(|l| l.product_id.clone()),
            deadline,
        );

        let pairs = lines.iter().filter_map(|l| {
            l.trimmed_lot_number()
                .map(|lot| (l.product_id.clone(), lot.to_string()))
        });
        let (lots, lot_report) = self.load_existing_pairs_until(LOTS_TABLE, pairs, deadline);
        report.absorb(&lot_report);

        let existing_lots = lots
            .into_iter()
            .map(|(product, lot)| (product, normalize_lot_number(&lot)))
            .collect();

        ReceptionLookups {
            products,
            existing_lots,
            report,
        }
    }

    fn deadline(&self) -> Instant {
        Instant::now() + self.config.load_timeout()
    }

    fn load_entities_until<I, K>(
        &self,
        table: &str,
        keys: I,
        deadline: Instant,
    ) -> (LookupTable<Entity>, LoadReport)
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let unique: BTreeSet<String> = keys.into_iter().map(Into::into).collect();
        let unique: Vec<String> = unique.into_iter().collect();

        let (entities, mut report) = self.run_chunks(table, &unique, deadline, |chunk| {
            self.store.fetch_by_keys(table, chunk)
        });

        let mut lookups = LookupTable::new();
        for entity in entities {
            let key = entity.key.clone();
            if !lookups.insert_first(key.clone(), entity) {
                debug!(table, key = %key, "duplicate entity for key, keeping first");
            }
        }
        report.resolved = lookups.len();
        (lookups, report)
    }

    fn load_typed_until<T, I, K>(
        &self,
        table: &str,
        keys: I,
        deadline: Instant,
    ) -> (LookupTable<T>, LoadReport)
    where
        T: DeserializeOwned,
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let (entities, mut report) = self.load_entities_until(table, keys, deadline);

        let mut lookups = LookupTable::new();
        for (key, entity) in entities.iter() {
            match serde_json::from_value::<T>(entity.payload.clone()) {
                Ok(value) => {
                    lookups.insert_first(key.clone(), value);
                }
                Err(e) => warn!(table, key = %key, error = %e, "undecodable entity payload"),
            }
        }
        report.resolved = lookups.len();
        (lookups, report)
    }

    fn load_existing_pairs_until<I>(
        &self,
        table: &str,
        pairs: I,
        deadline: Instant,
    ) -> (HashSet<(String, String)>, LoadReport)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let unique: BTreeSet<(String, String)> = pairs.into_iter().collect();
        let unique: Vec<(String, String)> = unique.into_iter().collect();

        let (entities, mut report) = self.run_chunks(table, &unique, deadline, |chunk| {
            self.store.fetch_by_key_pair(table, chunk)
        });

        let found: HashSet<(String, String)> = entities
            .into_iter()
            .filter_map(|e| e.sub_key.map(|sub| (e.key, sub)))
            .collect();
        report.resolved = found.len();
        (found, report)
    }

    /// Fetch `items` chunk by chunk, stopping early once `deadline` passes.
    fn run_chunks<K, F>(
        &self,
        table: &str,
        items: &[K],
        deadline: Instant,
        mut fetch: F,
    ) -> (Vec<Entity>, LoadReport)
    where
        F: FnMut(&[K]) -> StoreResult<Vec<Entity>>,
    {
        let mut report = LoadReport {
            unique_keys: items.len(),
            ..Default::default()
        };
        let mut entities = Vec::new();
        let total = self.chunk_count(items.len());

        for (index, chunk) in items.chunks(self.config.chunk_size).enumerate() {
            if Instant::now() >= deadline {
                report.chunks_skipped = total - index;
                warn!(
                    table,
                    skipped = report.chunks_skipped,
                    timeout_ms = self.config.load_timeout_ms,
                    "load budget exhausted, remaining chunks treated as failed"
                );
                break;
            }

            report.chunks_issued += 1;
            match fetch(chunk) {
                Ok(mut found) => {
                    debug!(table, chunk = index, keys = chunk.len(), found = found.len(), "chunk fetched");
                    entities.append(&mut found);
                }
                Err(e) => {
                    report.chunks_failed += 1;
                    warn!(table, chunk = index, keys = chunk.len(), error = %e, "chunk fetch failed, continuing without it");
                }
            }
        }

        (entities, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LotSnapshot, ProductSnapshot};
    use crate::store::{MemoryStore, StoreError};
    use std::cell::RefCell;

    /// Wraps a store, recording every call and failing on demand.
    struct SpyStore {
        inner: MemoryStore,
        calls: RefCell<Vec<Vec<String>>>,
        fail_on: Option<&'static str>,
    }

    impl SpyStore {
        fn new(inner: MemoryStore) -> Self {
            Self {
                inner,
                calls: RefCell::new(Vec::new()),
                fail_on: None,
            }
        }
    }

    impl EntityStore for SpyStore {
        fn fetch_by_keys(&self, table: &str, keys: &[String]) -> StoreResult<Vec<Entity>> {
            self.calls.borrow_mut().push(keys.to_vec());
            if let Some(poison) = self.fail_on {
                if keys.iter().any(|k| k == poison) {
                    return Err(StoreError::Unavailable("connection reset".into()));
                }
            }
            self.inner.fetch_by_keys(table, keys)
        }

        fn fetch_by_key_pair(
            &self,
            table: &str,
            pairs: &[(String, String)],
        ) -> StoreResult<Vec<Entity>> {
            self.calls
                .borrow_mut()
                .push(pairs.iter().map(|(k, s)| format!("{k}/{s}")).collect());
            self.inner.fetch_by_key_pair(table, pairs)
        }
    }

    fn store_with(ids: &[&str]) -> MemoryStore {
        let mut store = MemoryStore::new();
        for id in ids {
            store
                .insert_product(&ProductSnapshot::new(id.to_string(), id.to_string(), "misc".into()))
                .unwrap();
        }
        store
    }

    fn config(chunk_size: usize) -> LoaderConfig {
        LoaderConfig {
            chunk_size,
            ..Default::default()
        }
    }

    #[test]
    fn test_duplicates_collapse_into_one_fetch() {
        let spy = SpyStore::new(store_with(&["A", "B"]));
        let loader = BatchLoader::new(&spy, config(2));

        let (table, report) = loader.load_entities(PRODUCTS_TABLE, ["A", "B", "A"]);

        assert_eq!(*spy.calls.borrow(), vec![vec!["A".to_string(), "B".to_string()]]);
        assert_eq!(report.chunks_issued, 1);
        assert_eq!(report.unique_keys, 2);
        assert!(table.contains_key("A"));
        assert!(table.contains_key("B"));
    }

    #[test]
    fn test_chunk_count() {
        let loader = BatchLoader::new(MemoryStore::new(), config(500));
        assert_eq!(loader.chunk_count(0), 0);
        assert_eq!(loader.chunk_count(1), 1);
        assert_eq!(loader.chunk_count(500), 1);
        assert_eq!(loader.chunk_count(501), 2);
    }

    #[test]
    fn test_oversized_chunk_is_clamped() {
        let loader = BatchLoader::new(MemoryStore::new(), config(2000));
        assert_eq!(loader.config().chunk_size, MAX_CHUNK_SIZE);
        assert_eq!(loader.chunk_count(1201), 3);
    }

    #[test]
    fn test_empty_key_list_issues_nothing() {
        let spy = SpyStore::new(MemoryStore::new());
        let loader = BatchLoader::new(&spy, config(10));

        let (table, report) = loader.load_entities(PRODUCTS_TABLE, Vec::<String>::new());

        assert!(table.is_empty());
        assert_eq!(report.chunks_issued, 0);
        assert!(spy.calls.borrow().is_empty());
    }

    #[test]
    fn test_failed_chunk_is_contained() {
        let mut spy = SpyStore::new(store_with(&["A", "B", "C", "D"]));
        spy.fail_on = Some("C");
        let loader = BatchLoader::new(&spy, config(2));

        let (table, report) = loader.load_entities(PRODUCTS_TABLE, ["A", "B", "C", "D"]);

        assert_eq!(report.chunks_issued, 2);
        assert_eq!(report.chunks_failed, 1);
        assert!(table.contains_key("A"));
        assert!(table.contains_key("B"));
        assert!(!table.contains_key("C"));
        assert!(!table.contains_key("D"));
    }

    #[test]
    fn test_exhausted_budget_skips_chunks() {
        let spy = SpyStore::new(store_with(&["A", "B", "C"]));
        let loader = BatchLoader::new(
            &spy,
            LoaderConfig {
                chunk_size: 1,
                load_timeout_ms: 0,
            },
        );

        let (table, report) = loader.load_entities(PRODUCTS_TABLE, ["A", "B", "C"]);

        assert!(table.is_empty());
        assert_eq!(report.chunks_skipped, 3);
        assert_eq!(report.chunks_issued, 0);
        assert!(spy.calls.borrow().is_empty());
    }

    #[test]
    fn test_undecodable_payload_reads_as_missing() {
        let mut store = store_with(&["A"]);
        store.insert(
            PRODUCTS_TABLE,
            Entity {
                key: "B".into(),
                sub_key: None,
                payload: serde_json::json!({ "unexpected": true }),
            },
        );
        let loader = BatchLoader::new(&store, config(10));

        let (table, report): (LookupTable<ProductSnapshot>, _) =
            loader.load_typed(PRODUCTS_TABLE, ["A", "B"]);

        assert!(table.contains_key("A"));
        assert!(!table.contains_key("B"));
        assert_eq!(report.resolved, 1);
    }

    #[test]
    fn test_reception_lookups() {
        let mut store = store_with(&["P1", "P2"]);
        store
            .insert_lot(&LotSnapshot::new("P1".into(), "lot-7".into()))
            .unwrap();
        let spy = SpyStore::new(store);
        let loader = BatchLoader::new(&spy, config(500));

        let mut first = ReceptionLine::new("P1".into(), 5);
        first.lot_number = Some(" lot-7 ".into());
        let mut second = ReceptionLine::new("P2".into(), 5);
        second.lot_number = Some("X1".into());
        let third = ReceptionLine::new("P1".into(), 1);

        let lookups = loader.load_reception_lookups(&[first, second, third]);

        // one product fetch + one lot pair fetch
        assert_eq!(spy.calls.borrow().len(), 2);
        assert_eq!(lookups.products.len(), 2);
        assert!(lookups.has_lot("P1", "LOT7"));
        assert!(!lookups.has_lot("P2", "X1"));
        assert!(lookups.report.is_complete());
    }
}
