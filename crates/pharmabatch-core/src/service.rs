//! Reception validation: load reference data once, then run the rules.

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::loader::{BatchLoader, ReceptionLookups};
use crate::models::ReceptionLine;
use crate::rules::{BatchValidation, RuleEvaluator};
use crate::store::EntityStore;

/// Validates supplier receptions against an entity store.
pub struct ReceptionValidationService<S> {
    loader: BatchLoader<S>,
    evaluator: RuleEvaluator,
}

impl<S: EntityStore> ReceptionValidationService<S> {
    /// Create a service evaluating expiry against the local date.
    pub fn new(store: S, config: PipelineConfig) -> Self {
        Self::with_today(store, config, chrono::Local::now().date_naive())
    }

    /// Create a service with an explicit reference date.
    pub fn with_today(store: S, config: PipelineConfig, today: NaiveDate) -> Self {
        Self {
            loader: BatchLoader::new(store, config.loader),
            evaluator: RuleEvaluator::new(config.rules, today),
        }
    }

    pub fn loader(&self) -> &BatchLoader<S> {
        &self.loader
    }

    pub fn evaluator(&self) -> &RuleEvaluator {
        &self.evaluator
    }

    /// Load everything `lines` reference.
    pub fn load(&self, lines: &[ReceptionLine]) -> ReceptionLookups {
        self.loader.load_reception_lookups(lines)
    }

    /// Validate a reception.
    pub fn validate(&self, lines: &[ReceptionLine]) -> BatchValidation {
        let batch_id = uuid::Uuid::new_v4();
        info!(%batch_id, lines = lines.len(), "validating reception");

        let lookups = self.load(lines);
        if !lookups.report.is_complete() {
            warn!(
                %batch_id,
                failed = lookups.report.chunks_failed,
                skipped = lookups.report.chunks_skipped,
                "reference data incomplete"
            );
        }

        let validation = self.evaluator.evaluate_batch(lines, &lookups);
        info!(
            %batch_id,
            valid = validation.is_valid(),
            errors = validation.error_count(),
            warnings = validation.warning_count(),
            fetches = validation.load_report.chunks_issued,
            "reception validated"
        );
        validation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{LotSnapshot, ProductSnapshot};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn setup_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.upsert_product(&ProductSnapshot::new("P1".into(), "Doliprane".into(), "analgesics".into()))
            .unwrap();
        db.upsert_lot(&LotSnapshot::new("P1".into(), "OLD-1".into()))
            .unwrap();
        db
    }

    fn line(product: &str, lot: &str) -> ReceptionLine {
        let mut line = ReceptionLine::new(product.into(), 10);
        line.lot_number = Some(lot.into());
        line.expiry_date = Some(today() + chrono::Duration::days(365));
        line
    }

    #[test]
    fn test_validate_against_database() {
        let db = setup_db();
        let service = ReceptionValidationService::with_today(&db, PipelineConfig::default(), today());

        let validation = service.validate(&[line("P1", "NEW-1"), line("P1", "old1"), line("P9", "X")]);

        assert!(!validation.is_valid());
        assert!(validation.lines[0].findings.is_empty());
        assert!(validation.lines[1].warnings[0].contains("already exists"));
        assert_eq!(validation.lines[2].errors, vec!["Product P9 not found"]);
        assert_eq!(validation.load_report.chunks_issued, 2);
    }

    #[test]
    fn test_validate_empty_reception() {
        let db = setup_db();
        let service = ReceptionValidationService::with_today(&db, PipelineConfig::default(), today());

        let validation = service.validate(&[]);
        assert!(!validation.is_valid());
        assert_eq!(validation.load_report.chunks_issued, 0);
    }
}
