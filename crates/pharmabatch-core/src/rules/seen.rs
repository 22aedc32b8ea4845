//! Lots already seen while walking a batch.

use std::collections::HashMap;

use strsim::normalized_levenshtein;

use crate::models::normalize_lot_number;

/// Lot numbers already entered, grouped by product.
#[derive(Debug, Clone, Default)]
pub struct SeenLots {
    by_product: HashMap<String, Vec<(String, String)>>, // (normalized, as entered)
}

impl SeenLots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `lot_number` for `product_id`.
    pub fn insert(&mut self, product_id: &str, lot_number: &str) {
        self.by_product
            .entry(product_id.to_string())
            .or_default()
            .push((normalize_lot_number(lot_number), lot_number.trim().to_string()));
    }

    /// The first remembered lot of `product_id` that looks like `lot_number`.
    ///
    /// Lots match when their normalized forms are equal or their normalized
    /// Levenshtein similarity reaches `threshold`.
    pub fn find_similar(&self, product_id: &str, lot_number: &str, threshold: f64) -> Option<&str> {
        let wanted = normalize_lot_number(lot_number);
        self.by_product
            .get(product_id)?
            .iter()
            .find(|(normalized, _)| {
                *normalized == wanted || normalized_levenshtein(normalized, &wanted) >= threshold
            })
            .map(|(_, entered)| entered.as_str())
    }
}
