//! In-process entity store.

use std::collections::{HashMap, HashSet};

use super::{Entity, EntityStore, StoreError, StoreResult, LOTS_TABLE, PRODUCTS_TABLE};
use crate::models::{normalize_lot_number, LotSnapshot, ProductSnapshot};

/// Map-backed store, handy for tests and for embedding pre-fetched data.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    tables: HashMap<String, Vec<Entity>>,
}

impl MemoryStore {
    /// Create a store with empty product and lot tables.
    pub fn new() -> Self {
        let mut tables = HashMap::new();
        tables.insert(PRODUCTS_TABLE.to_string(), Vec::new());
        tables.insert(LOTS_TABLE.to_string(), Vec::new());
        Self { tables }
    }

    /// Insert an entity, creating the table if needed.
    pub fn insert(&mut self, table: &str, entity: Entity) {
        self.tables.entry(table.to_string()).or_default().push(entity);
    }

    pub fn insert_product(&mut self, product: &ProductSnapshot) -> Result<(), serde_json::Error> {
        let entity = Entity::from_snapshot(product.id.clone(), None, product)?;
        self.insert(PRODUCTS_TABLE, entity);
        Ok(())
    }

    pub fn insert_lot(&mut self, lot: &LotSnapshot) -> Result<(), serde_json::Error> {
        let entity =
            Entity::from_snapshot(lot.product_id.clone(), Some(lot.lot_number.clone()), lot)?;
        self.insert(LOTS_TABLE, entity);
        Ok(())
    }

    fn table(&self, table: &str) -> StoreResult<&[Entity]> {
        self.tables
            .get(table)
            .map(Vec::as_slice)
            .ok_or_else(|| StoreError::UnknownTable(table.to_string()))
    }
}

impl EntityStore for MemoryStore {
    fn fetch_by_keys(&self, table: &str, keys: &[String]) -> StoreResult<Vec<Entity>> {
        let wanted: HashSet<&str> = keys.iter().map(String::as_str).collect();
        Ok(self
            .table(table)?
            .iter()
            .filter(|e| wanted.contains(e.key.as_str()))
            .cloned()
            .collect())
    }

    fn fetch_by_key_pair(
        &self,
        table: &str,
        pairs: &[(String, String)],
    ) -> StoreResult<Vec<Entity>> {
        let wanted: HashSet<(&str, String)> = pairs
            .iter()
            .map(|(k, s)| (k.as_str(), normalize_lot_number(s)))
            .collect();
        Ok(self
            .table(table)?
            .iter()
            .filter(|e| match &e.sub_key {
                Some(sub) => wanted.contains(&(e.key.as_str(), normalize_lot_number(sub))),
                None => false,
            })
            .cloned()
            .collect())
    }
}
