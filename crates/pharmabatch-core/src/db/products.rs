//! Product database operations.

use rusqlite::{params, params_from_iter, OptionalExtension, Row};

use super::{placeholders, Database, DbResult};
use crate::models::ProductSnapshot;

const PRODUCT_COLUMNS: &str = "id, name, category, supplier, unit_price, active";

impl Database {
    /// Insert or update a product.
    pub fn upsert_product(&self, product: &ProductSnapshot) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO products (id, name, category, supplier, unit_price, active, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                category = excluded.category,
                supplier = excluded.supplier,
                unit_price = excluded.unit_price,
                active = excluded.active,
                updated_at = datetime('now')
            "#,
            params![
                product.id,
                product.name,
                product.category,
                product.supplier,
                product.unit_price,
                product.active,
            ],
        )?;
        Ok(())
    }

    /// Get a product by id.
    pub fn get_product(&self, id: &str) -> DbResult<Option<ProductSnapshot>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?");
        Ok(self
            .conn
            .query_row(&sql, [id], product_from_row)
            .optional()?)
    }

    /// Get every product whose id is in `ids`, in one query.
    pub fn get_products(&self, ids: &[String]) -> DbResult<Vec<ProductSnapshot>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id IN ({})",
            placeholders(ids.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(ids.iter()), product_from_row)?;

        let mut products = Vec::new();
        for row in rows {
            products.push(row?);
        }
        Ok(products)
    }

    /// List products ordered by name.
    pub fn list_products(&self, active_only: bool) -> DbResult<Vec<ProductSnapshot>> {
        let sql = if active_only {
            format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE active = 1 ORDER BY name")
        } else {
            format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name")
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], product_from_row)?;

        let mut products = Vec::new();
        for row in rows {
            products.push(row?);
        }
        Ok(products)
    }

    /// Mark a product as no longer stocked.
    pub fn deactivate_product(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE products SET active = 0, updated_at = datetime('now') WHERE id = ?",
            [id],
        )?;
        Ok(rows_affected > 0)
    }
}

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<ProductSnapshot> {
    Ok(ProductSnapshot {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        supplier: row.get(3)?,
        unit_price: row.get(4)?,
        active: row.get(5)?,
    })
}
