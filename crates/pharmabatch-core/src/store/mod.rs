//! Storage port used by the batch loader.
//!
//! The pipeline never talks to a concrete backend directly; it goes through
//! [`EntityStore`], which exposes the two batched reads it needs. The SQLite
//! [`Database`](crate::db::Database) and the in-process [`MemoryStore`] both
//! implement it.

mod memory;

pub use memory::*;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Table holding product snapshots, keyed by product id.
pub const PRODUCTS_TABLE: &str = "products";

/// Table holding lot snapshots, keyed by product id with the lot number as sub-key.
pub const LOTS_TABLE: &str = "lots";

/// Store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] crate::db::DbError),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A row returned by the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    /// Primary key (the batch key)
    pub key: String,
    /// Secondary key for composite entities (e.g., lot number under a product)
    pub sub_key: Option<String>,
    /// Full row content
    pub payload: serde_json::Value,
}

impl Entity {
    /// Build an entity from any serializable snapshot.
    pub fn from_snapshot<T: Serialize>(
        key: impl Into<String>,
        sub_key: Option<String>,
        snapshot: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            key: key.into(),
            sub_key,
            payload: serde_json::to_value(snapshot)?,
        })
    }
}

/// Batched key/value entity store.
///
/// Implementations must accept up to the configured chunk size of keys per
/// call. Keys that do not resolve are simply missing from the result.
pub trait EntityStore {
    /// Fetch every entity of `table` whose key is in `keys`.
    fn fetch_by_keys(&self, table: &str, keys: &[String]) -> StoreResult<Vec<Entity>>;

    /// Fetch every entity of `table` whose `(key, sub_key)` is in `pairs`.
    ///
    /// Lot numbers are matched in normalized form (see
    /// [`normalize_lot_number`](crate::models::normalize_lot_number)).
    fn fetch_by_key_pair(&self, table: &str, pairs: &[(String, String)])
        -> StoreResult<Vec<Entity>>;
}

impl<S: EntityStore + ?Sized> EntityStore for &S {
    fn fetch_by_keys(&self, table: &str, keys: &[String]) -> StoreResult<Vec<Entity>> {
        (**self).fetch_by_keys(table, keys)
    }

    fn fetch_by_key_pair(
        &self,
        table: &str,
        pairs: &[(String, String)],
    ) -> StoreResult<Vec<Entity>> {
        (**self).fetch_by_key_pair(table, pairs)
    }
}
