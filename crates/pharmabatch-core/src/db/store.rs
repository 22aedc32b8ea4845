//! [`EntityStore`] implementation over SQLite.

use super::{Database, DbError};
use crate::store::{Entity, EntityStore, StoreError, StoreResult, LOTS_TABLE, PRODUCTS_TABLE};

impl EntityStore for Database {
    fn fetch_by_keys(&self, table: &str, keys: &[String]) -> StoreResult<Vec<Entity>> {
        match table {
            PRODUCTS_TABLE => self
                .get_products(keys)?
                .iter()
                .map(|p| Entity::from_snapshot(p.id.clone(), None, p))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| StoreError::Database(DbError::Json(e))),
            LOTS_TABLE => self
                .get_lots_for_products(keys)?
                .iter()
                .map(|l| Entity::from_snapshot(l.product_id.clone(), Some(l.lot_number.clone()), l))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| StoreError::Database(DbError::Json(e))),
            other => Err(StoreError::UnknownTable(other.to_string())),
        }
    }

    fn fetch_by_key_pair(
        &self,
        table: &str,
        pairs: &[(String, String)],
    ) -> StoreResult<Vec<Entity>> {
        match table {
            LOTS_TABLE => self
                .get_lots_by_pairs(pairs)?
                .iter()
                .map(|l| Entity::from_snapshot(l.product_id.clone(), Some(l.lot_number.clone()), l))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| StoreError::Database(DbError::Json(e))),
            other => Err(StoreError::UnknownTable(other.to_string())),
        }
    }
}
