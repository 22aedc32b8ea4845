//! PharmaBatch Core Library
//!
//! Batch validation and aggregation for pharmacy stock reception.
//!
//! # Architecture
//!
//! ```text
//!   Reception lines (N)
//!          │
//!          ▼
//!   ┌──────────────────────────────┐
//!   │         Batch Loader         │   dedupe keys → chunks of ≤ chunk_size
//!   │  products: fetch_by_keys     │   one fetch per chunk, in order
//!   │  lots:     fetch_by_key_pair │   failed chunk → logged, left empty
//!   └──────────────┬───────────────┘
//!                  │ ReceptionLookups (read-only)
//!                  ▼
//!   ┌──────────────────────────────┐
//!   │        Rule Evaluator        │   pure, once per line
//!   │ existence → range → lot →    │   errors / warnings / suggestions
//!   │ expiry → variance → status   │
//!   └──────────────┬───────────────┘
//!                  │ BatchValidation
//!                  ▼
//!   ┌──────────────────────────────┐
//!   │      Aggregate Reporter      │   buckets, period deltas, tables
//!   └──────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`store`]: Storage port (`EntityStore`) and in-memory store
//! - [`db`]: SQLite store for products and lots
//! - [`loader`]: Chunked batch loader and lookup tables
//! - [`rules`]: Rule evaluator for reception lines
//! - [`report`]: Aggregation, period comparison and export tables
//! - [`service`]: Reception validation orchestration
//! - [`config`]: Tunables, loadable from TOML

pub mod config;
pub mod db;
pub mod loader;
pub mod models;
pub mod report;
pub mod rules;
pub mod service;
pub mod store;

// Re-export commonly used types
pub use config::{ConfigError, LoaderConfig, PipelineConfig, RuleConfig};
pub use db::Database;
pub use loader::{BatchLoader, LoadReport, LookupTable, ReceptionLookups};
pub use models::{
    ConformityStatus, EvaluatedLine, Finding, LotSnapshot, ProductSnapshot, ReceptionLine,
    RuleFamily, Severity,
};
pub use report::{
    aggregate, percent_change, summarize, AggregateBucket, PercentChange, PeriodComparison,
    ReportTable, SummaryMetrics,
};
pub use rules::{BatchValidation, RuleEvaluator};
pub use service::ReceptionValidationService;
pub use store::{Entity, EntityStore, MemoryStore, StoreError};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum PharmaBatchError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<db::DbError> for PharmaBatchError {
    fn from(e: db::DbError) -> Self {
        PharmaBatchError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for PharmaBatchError {
    fn from(e: serde_json::Error) -> Self {
        PharmaBatchError::SerializationError(e.to_string())
    }
}

impl From<ConfigError> for PharmaBatchError {
    fn from(e: ConfigError) -> Self {
        PharmaBatchError::ConfigError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for PharmaBatchError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        PharmaBatchError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
///
/// `config_toml` overrides the default pipeline configuration.
#[uniffi::export]
pub fn open_database(
    path: String,
    config_toml: Option<String>,
) -> Result<Arc<PharmaBatchCore>, PharmaBatchError> {
    let config = match config_toml {
        Some(toml) => PipelineConfig::from_toml_str(&toml)?,
        None => PipelineConfig::default(),
    };
    let db = Database::open(&path)?;
    Ok(Arc::new(PharmaBatchCore {
        db: Arc::new(Mutex::new(db)),
        config,
    }))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<PharmaBatchCore>, PharmaBatchError> {
    let db = Database::open_in_memory()?;
    Ok(Arc::new(PharmaBatchCore {
        db: Arc::new(Mutex::new(db)),
        config: PipelineConfig::default(),
    }))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe database wrapper for FFI.
#[derive(uniffi::Object)]
pub struct PharmaBatchCore {
    db: Arc<Mutex<Database>>,
    config: PipelineConfig,
}

impl PharmaBatchCore {
    fn run_validation(&self, lines: Vec<FfiReceptionLine>) -> Result<BatchValidation, PharmaBatchError> {
        let lines = lines
            .into_iter()
            .map(ReceptionLine::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let db = self.db.lock()?;
        let service = ReceptionValidationService::new(&*db, self.config.clone());
        Ok(service.validate(&lines))
    }
}

#[uniffi::export]
impl PharmaBatchCore {
    // =========================================================================
    // Reference Data
    // =========================================================================

    /// Add or update a product.
    pub fn upsert_product(&self, product: FfiProduct) -> Result<(), PharmaBatchError> {
        let db = self.db.lock()?;
        db.upsert_product(&product.into())?;
        Ok(())
    }

    /// Get a product by id.
    pub fn get_product(&self, id: String) -> Result<Option<FfiProduct>, PharmaBatchError> {
        let db = self.db.lock()?;
        Ok(db.get_product(&id)?.map(|p| p.into()))
    }

    /// Add or update a lot.
    pub fn upsert_lot(&self, lot: FfiLot) -> Result<(), PharmaBatchError> {
        let lot = LotSnapshot::try_from(lot)?;
        let db = self.db.lock()?;
        db.upsert_lot(&lot)?;
        Ok(())
    }

    // =========================================================================
    // Reception Validation
    // =========================================================================

    /// Validate a reception against the stored products and lots.
    pub fn validate_reception(
        &self,
        lines: Vec<FfiReceptionLine>,
    ) -> Result<FfiValidationResult, PharmaBatchError> {
        let validation = self.run_validation(lines)?;
        Ok(validation.into())
    }

    /// Validate a reception and return the findings as CSV.
    pub fn export_validation_csv(
        &self,
        lines: Vec<FfiReceptionLine>,
    ) -> Result<String, PharmaBatchError> {
        let validation = self.run_validation(lines)?;
        Ok(ReportTable::from_validation("Reception validation", &validation).to_csv())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe product.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiProduct {
    pub id: String,
    pub name: String,
    pub category: String,
    pub supplier: Option<String>,
    pub unit_price: Option<f64>,
    pub active: bool,
}

impl From<ProductSnapshot> for FfiProduct {
    fn from(p: ProductSnapshot) -> Self {
        Self {
            id: p.id,
            name: p.name,
            category: p.category,
            supplier: p.supplier,
            unit_price: p.unit_price,
            active: p.active,
        }
    }
}

impl From<FfiProduct> for ProductSnapshot {
    fn from(p: FfiProduct) -> Self {
        ProductSnapshot {
            id: p.id,
            name: p.name,
            category: p.category,
            supplier: p.supplier,
            unit_price: p.unit_price,
            active: p.active,
        }
    }
}

/// FFI-safe lot. Dates are `YYYY-MM-DD`.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLot {
    pub product_id: String,
    pub lot_number: String,
    pub expiry_date: Option<String>,
    pub quantity: i64,
}

impl TryFrom<FfiLot> for LotSnapshot {
    type Error = PharmaBatchError;

    fn try_from(lot: FfiLot) -> Result<Self, Self::Error> {
        Ok(LotSnapshot {
            product_id: lot.product_id,
            lot_number: lot.lot_number,
            expiry_date: parse_date(lot.expiry_date.as_deref())?,
            quantity: lot.quantity,
        })
    }
}

/// FFI-safe reception line. Dates are `YYYY-MM-DD`.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiReceptionLine {
    pub line_id: String,
    pub product_id: String,
    pub lot_number: Option<String>,
    pub expiry_date: Option<String>,
    pub quantity_ordered: Option<i64>,
    pub quantity_received: i64,
    pub quantity_accepted: i64,
    pub status: String,
    pub comment: Option<String>,
    pub unit_price: Option<f64>,
}

impl TryFrom<FfiReceptionLine> for ReceptionLine {
    type Error = PharmaBatchError;

    fn try_from(line: FfiReceptionLine) -> Result<Self, Self::Error> {
        let status = ConformityStatus::parse(&line.status).ok_or_else(|| {
            PharmaBatchError::InvalidInput(format!("unknown conformity status '{}'", line.status))
        })?;
        Ok(ReceptionLine {
            line_id: line.line_id,
            product_id: line.product_id,
            lot_number: line.lot_number,
            expiry_date: parse_date(line.expiry_date.as_deref())?,
            quantity_ordered: line.quantity_ordered,
            quantity_received: line.quantity_received,
            quantity_accepted: line.quantity_accepted,
            status,
            comment: line.comment,
            unit_price: line.unit_price,
        })
    }
}

/// FFI-safe evaluated line.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiEvaluatedLine {
    pub line_id: String,
    pub product_id: String,
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
}

impl From<EvaluatedLine> for FfiEvaluatedLine {
    fn from(evaluated: EvaluatedLine) -> Self {
        Self {
            is_valid: evaluated.is_valid(),
            line_id: evaluated.line.line_id,
            product_id: evaluated.line.product_id,
            errors: evaluated.errors,
            warnings: evaluated.warnings,
            suggestions: evaluated.suggestions,
        }
    }
}

/// FFI-safe reception validation result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiValidationResult {
    pub is_valid: bool,
    pub lines: Vec<FfiEvaluatedLine>,
    pub batch_errors: Vec<String>,
    pub batch_warnings: Vec<String>,
    pub chunks_issued: u32,
    pub chunks_failed: u32,
}

impl From<BatchValidation> for FfiValidationResult {
    fn from(validation: BatchValidation) -> Self {
        Self {
            is_valid: validation.is_valid(),
            chunks_issued: validation.load_report.chunks_issued as u32,
            chunks_failed: (validation.load_report.chunks_failed
                + validation.load_report.chunks_skipped) as u32,
            lines: validation.lines.into_iter().map(|l| l.into()).collect(),
            batch_errors: validation.batch_errors,
            batch_warnings: validation.batch_warnings,
        }
    }
}

fn parse_date(s: Option<&str>) -> Result<Option<NaiveDate>, PharmaBatchError> {
    s.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|e| PharmaBatchError::InvalidInput(format!("date '{}': {}", s, e)))
        })
        .transpose()
}
