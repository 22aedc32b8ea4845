//! SQLite schema definition.

/// Database schema for the reception pipeline's reference data.
pub const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Products
-- ============================================================================

CREATE TABLE IF NOT EXISTS products (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    category TEXT NOT NULL DEFAULT '',
    supplier TEXT,
    unit_price REAL,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_products_category ON products(category);
CREATE INDEX IF NOT EXISTS idx_products_supplier ON products(supplier);

-- ============================================================================
-- Lots
-- ============================================================================

CREATE TABLE IF NOT EXISTS lots (
    product_id TEXT NOT NULL REFERENCES products(id),
    lot_number TEXT NOT NULL,
    lot_key TEXT NOT NULL,                       -- normalized lot number
    expiry_date TEXT,                            -- YYYY-MM-DD
    quantity INTEGER NOT NULL DEFAULT 0 CHECK (quantity >= 0),
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (product_id, lot_number)
);

CREATE INDEX IF NOT EXISTS idx_lots_key ON lots(product_id, lot_key);
CREATE INDEX IF NOT EXISTS idx_lots_expiry ON lots(expiry_date);
"#;
