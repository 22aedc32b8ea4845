//! Product and lot snapshots resolved by the batch loader.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A product as known to the pharmacy catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductSnapshot {
    /// Product identifier - the batch key for reception lines
    pub id: String,
    /// Commercial name
    pub name: String,
    /// Therapeutic or commercial category (e.g., "analgesics")
    pub category: String,
    /// Usual supplier, if recorded
    #[serde(default)]
    pub supplier: Option<String>,
    /// Reference purchase price per unit
    #[serde(default)]
    pub unit_price: Option<f64>,
    /// Whether the product can still be stocked
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl ProductSnapshot {
    /// Create an active product with required fields.
    pub fn new(id: String, name: String, category: String) -> Self {
        Self {
            id,
            name,
            category,
            supplier: None,
            unit_price: None,
            active: true,
        }
    }
}

/// A stocked lot of a product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LotSnapshot {
    /// Owning product
    pub product_id: String,
    /// Manufacturer lot number
    pub lot_number: String,
    /// Expiry date (`date_peremption` on the paperwork)
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    /// Units currently in stock
    #[serde(default)]
    pub quantity: i64,
}

impl LotSnapshot {
    /// Create a lot with no expiry and empty stock.
    pub fn new(product_id: String, lot_number: String) -> Self {
        Self {
            product_id,
            lot_number,
            expiry_date: None,
            quantity: 0,
        }
    }
}

/// Canonical form of a lot number for duplicate detection.
///
/// Trims, uppercases and drops separators so `"lot-123 "` and `"LOT123"`
/// compare equal.
pub fn normalize_lot_number(lot_number: &str) -> String {
    lot_number
        .trim()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_uppercase())
        .collect()
}
