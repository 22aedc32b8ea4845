//! Lot database operations.

use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, OptionalExtension};

use super::{placeholders, Database, DbError, DbResult};
use crate::models::{normalize_lot_number, LotSnapshot};

const LOT_COLUMNS: &str = "product_id, lot_number, expiry_date, quantity";

impl Database {
    /// Insert or update a lot.
    pub fn upsert_lot(&self, lot: &LotSnapshot) -> DbResult<()> {
        let expiry = lot.expiry_date.map(|d| d.format("%Y-%m-%d").to_string());
        self.conn.execute(
            r#"
            INSERT INTO lots (product_id, lot_number, lot_key, expiry_date, quantity, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'))
            ON CONFLICT(product_id, lot_number) DO UPDATE SET
                expiry_date = excluded.expiry_date,
                quantity = excluded.quantity,
                updated_at = datetime('now')
            "#,
            params![
                lot.product_id,
                lot.lot_number,
                normalize_lot_number(&lot.lot_number),
                expiry,
                lot.quantity
            ],
        )?;
        Ok(())
    }

    /// Get a lot by its composite key.
    pub fn get_lot(&self, product_id: &str, lot_number: &str) -> DbResult<Option<LotSnapshot>> {
        let sql = format!("SELECT {LOT_COLUMNS} FROM lots WHERE product_id = ? AND lot_number = ?");
        self.conn
            .query_row(&sql, [product_id, lot_number], lot_row)
            .optional()?
            .map(LotSnapshot::try_from)
            .transpose()
    }

    /// Get every lot belonging to one of `product_ids`.
    pub fn get_lots_for_products(&self, product_ids: &[String]) -> DbResult<Vec<LotSnapshot>> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {LOT_COLUMNS} FROM lots WHERE product_id IN ({}) ORDER BY product_id, lot_number",
            placeholders(product_ids.len())
        );
        self.query_lots(&sql, product_ids.iter().map(String::as_str))
    }

    /// Get every lot whose `(product_id, lot_number)` is in `pairs`, in one query.
    ///
    /// Lot numbers are compared in normalized form, so `"ab-12"` finds `"AB12"`.
    pub fn get_lots_by_pairs(&self, pairs: &[(String, String)]) -> DbResult<Vec<LotSnapshot>> {
        if pairs.is_empty() {
            return Ok(Vec::new());
        }
        let values = vec!["(?, ?)"; pairs.len()].join(", ");
        let sql = format!(
            "SELECT {LOT_COLUMNS} FROM lots WHERE (product_id, lot_key) IN (VALUES {values})"
        );
        self.query_lots(
            &sql,
            pairs
                .iter()
                .flat_map(|(product, lot)| [product.clone(), normalize_lot_number(lot)]),
        )
    }

    /// Lots expiring on or before `date`, soonest first.
    pub fn list_lots_expiring_before(&self, date: NaiveDate) -> DbResult<Vec<LotSnapshot>> {
        let sql = format!(
            "SELECT {LOT_COLUMNS} FROM lots WHERE expiry_date IS NOT NULL AND expiry_date <= ? ORDER BY expiry_date"
        );
        self.query_lots(&sql, [date.format("%Y-%m-%d").to_string()])
    }

    fn query_lots<I>(&self, sql: &str, params: I) -> DbResult<Vec<LotSnapshot>>
    where
        I: IntoIterator,
        I::Item: rusqlite::ToSql,
    {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(params), lot_row)?;

        let mut lots = Vec::new();
        for row in rows {
            lots.push(LotSnapshot::try_from(row?)?);
        }
        Ok(lots)
    }
}

/// Intermediate row struct for database mapping.
struct LotRow {
    product_id: String,
    lot_number: String,
    expiry_date: Option<String>,
    quantity: i64,
}

fn lot_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<LotRow> {
    Ok(LotRow {
        product_id: row.get(0)?,
        lot_number: row.get(1)?,
        expiry_date: row.get(2)?,
        quantity: row.get(3)?,
    })
}

impl TryFrom<LotRow> for LotSnapshot {
    type Error = DbError;

    fn try_from(row: LotRow) -> Result<Self, Self::Error> {
        let expiry_date = row
            .expiry_date
            .map(|s| {
                NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                    .map_err(|e| DbError::InvalidValue(format!("expiry_date '{}': {}", s, e)))
            })
            .transpose()?;

        Ok(LotSnapshot {
            product_id: row.product_id,
            lot_number: row.lot_number,
            expiry_date,
            quantity: row.quantity,
        })
    }
}
