//! Synchronous rule evaluation for reception lines.
//!
//! Rule families run in a fixed order:
//! 1. Existence - the product must resolve
//! 2. Range - quantities are non-negative and accepted <= received
//! 3. Required text - lot number present, not a suspected duplicate
//! 4. Expiry - distance between expiry date and today
//! 5. Variance - ordered vs received quantity
//! 6. Status - conformity verdict agrees with quantities and comment
//!
//! Evaluation only reads its inputs, so the same line and lookups always
//! produce the same findings in the same order.

mod seen;

pub use seen::*;

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::RuleConfig;
use crate::loader::{LoadReport, ReceptionLookups};
use crate::models::{ConformityStatus, EvaluatedLine, ReceptionLine, RuleFamily, Severity};

/// Result of validating a whole reception.
#[derive(Debug, Clone, Serialize)]
pub struct BatchValidation {
    /// One entry per input line, in input order
    pub lines: Vec<EvaluatedLine>,
    /// Blocking problems with the batch as a whole
    pub batch_errors: Vec<String>,
    /// Non-blocking problems with the batch as a whole
    pub batch_warnings: Vec<String>,
    /// How the reference data was loaded
    pub load_report: LoadReport,
}

impl BatchValidation {
    /// Valid when there is no batch error and every line is valid.
    pub fn is_valid(&self) -> bool {
        self.batch_errors.is_empty() && self.lines.iter().all(EvaluatedLine::is_valid)
    }

    pub fn valid_count(&self) -> usize {
        self.lines.iter().filter(|l| l.is_valid()).count()
    }

    pub fn error_count(&self) -> usize {
        self.batch_errors.len() + self.lines.iter().map(|l| l.errors.len()).sum::<usize>()
    }

    pub fn warning_count(&self) -> usize {
        self.batch_warnings.len() + self.lines.iter().map(|l| l.warnings.len()).sum::<usize>()
    }

    pub fn suggestion_count(&self) -> usize {
        self.lines.iter().map(|l| l.suggestions.len()).sum()
    }
}

/// Rule evaluator bound to a reference date.
#[derive(Debug, Clone)]
pub struct RuleEvaluator {
    config: RuleConfig,
    today: NaiveDate,
}

impl RuleEvaluator {
    pub fn new(config: RuleConfig, today: NaiveDate) -> Self {
        Self { config, today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Evaluate one line with no lots seen earlier in the batch.
    pub fn evaluate(&self, line: &ReceptionLine, lookups: &ReceptionLookups) -> EvaluatedLine {
        self.evaluate_with_seen(line, lookups, &SeenLots::new())
    }

    /// Evaluate one line against the lookups and the lots already seen.
    pub fn evaluate_with_seen(
        &self,
        line: &ReceptionLine,
        lookups: &ReceptionLookups,
        seen: &SeenLots,
    ) -> EvaluatedLine {
        let mut out = EvaluatedLine::new(line.clone());
        self.check_existence(line, lookups, &mut out);
        self.check_ranges(line, &mut out);
        self.check_lot_number(line, lookups, seen, &mut out);
        self.check_expiry(line, &mut out);
        self.check_variance(line, &mut out);
        self.check_status(line, &mut out);
        out
    }

    /// Evaluate every line of a reception, in order.
    ///
    /// Lots are compared against stock and against lots of earlier lines.
    pub fn evaluate_batch(
        &self,
        lines: &[ReceptionLine],
        lookups: &ReceptionLookups,
    ) -> BatchValidation {
        let mut batch_errors = Vec::new();
        let mut batch_warnings = Vec::new();

        if lines.is_empty() {
            batch_errors.push("Reception contains no lines".to_string());
        }
        let report = lookups.report;
        if !report.is_complete() {
            batch_warnings.push(format!(
                "Reference data partially unavailable ({} chunk(s) failed, {} skipped); affected products are reported as not found",
                report.chunks_failed, report.chunks_skipped
            ));
        }

        let mut seen = SeenLots::new();
        let mut evaluated = Vec::with_capacity(lines.len());
        for line in lines {
            evaluated.push(self.evaluate_with_seen(line, lookups, &seen));
            if let Some(lot) = line.trimmed_lot_number() {
                seen.insert(&line.product_id, lot);
            }
        }

        BatchValidation {
            lines: evaluated,
            batch_errors,
            batch_warnings,
            load_report: report,
        }
    }

    fn check_existence(
        &self,
        line: &ReceptionLine,
        lookups: &ReceptionLookups,
        out: &mut EvaluatedLine,
    ) {
        match lookups.products.get(&line.product_id) {
            None => out.record(
                Severity::Error,
                RuleFamily::Existence,
                format!("Product {} not found", line.product_id),
            ),
            Some(product) if !product.active => out.record(
                Severity::Warning,
                RuleFamily::Existence,
                format!("Product {} ({}) is no longer active", product.id, product.name),
            ),
            Some(_) => {}
        }
    }

    fn check_ranges(&self, line: &ReceptionLine, out: &mut EvaluatedLine) {
        let received = line.quantity_received;
        let accepted = line.quantity_accepted;

        if received < 0 {
            out.record(
                Severity::Error,
                RuleFamily::Range,
                format!("Received quantity cannot be negative ({})", received),
            );
        }
        if accepted < 0 {
            out.record(
                Severity::Error,
                RuleFamily::Range,
                format!("Accepted quantity cannot be negative ({})", accepted),
            );
        }
        if accepted > received {
            out.record(
                Severity::Error,
                RuleFamily::Range,
                format!(
                    "Accepted quantity ({}) exceeds received quantity ({})",
                    accepted, received
                ),
            );
        }
        if let Some(ordered) = line.quantity_ordered.filter(|q| *q < 0) {
            out.record(
                Severity::Error,
                RuleFamily::Range,
                format!("Ordered quantity cannot be negative ({})", ordered),
            );
        }
    }

    fn check_lot_number(
        &self,
        line: &ReceptionLine,
        lookups: &ReceptionLookups,
        seen: &SeenLots,
        out: &mut EvaluatedLine,
    ) {
        let Some(lot) = line.trimmed_lot_number() else {
            out.record(
                Severity::Error,
                RuleFamily::RequiredText,
                "Lot number is required",
            );
            return;
        };

        let duplicate = if lookups.has_lot(&line.product_id, lot) {
            Some(format!(
                "Lot {} already exists in stock for product {}",
                lot, line.product_id
            ))
        } else {
            seen.find_similar(&line.product_id, lot, self.config.duplicate_similarity)
                .map(|other| {
                    format!(
                        "Lot {} looks like lot {} entered earlier in this reception",
                        lot, other
                    )
                })
        };

        if let Some(message) = duplicate {
            out.record(Severity::Warning, RuleFamily::RequiredText, message);
            out.record(
                Severity::Suggestion,
                RuleFamily::RequiredText,
                format!("Check that lot {} is not a duplicate entry", lot),
            );
        }
    }

    fn check_expiry(&self, line: &ReceptionLine, out: &mut EvaluatedLine) {
        let Some(expiry) = line.expiry_date else {
            out.record(
                Severity::Warning,
                RuleFamily::Expiry,
                "Expiry date missing; fill it in to enable expiry tracking",
            );
            return;
        };

        let days = days_until(expiry, self.today);
        if days < 0 {
            out.record(
                Severity::Error,
                RuleFamily::Expiry,
                format!("Lot expired on {} ({} days ago)", expiry, -days),
            );
        } else if days <= self.config.near_expiry_days {
            out.record(
                Severity::Warning,
                RuleFamily::Expiry,
                format!("Lot expires in {} days ({})", days, expiry),
            );
        } else if days <= self.config.medium_expiry_days {
            out.record(
                Severity::Warning,
                RuleFamily::Expiry,
                format!(
                    "Lot expires within {} days ({}); plan to dispense it first",
                    days, expiry
                ),
            );
        }
    }

    fn check_variance(&self, line: &ReceptionLine, out: &mut EvaluatedLine) {
        let Some(ordered) = line.quantity_ordered.filter(|q| *q >= 0) else {
            return;
        };
        let received = line.quantity_received;
        // Negative receipts are already a range error.
        if received < 0 {
            return;
        }

        if ordered == 0 {
            if received > 0 {
                out.record(
                    Severity::Warning,
                    RuleFamily::Variance,
                    format!("Received {} units that were not ordered", received),
                );
            }
            return;
        }

        let (Some(delta), Some(pct)) =
            (received.checked_sub(ordered), variance_pct(ordered, received))
        else {
            return;
        };

        if pct > self.config.variance_warning_pct {
            out.record(
                Severity::Warning,
                RuleFamily::Variance,
                format!(
                    "Received quantity differs from order by {:+} ({:.1}%)",
                    delta, pct
                ),
            );
        } else if pct > self.config.variance_suggestion_pct {
            out.record(
                Severity::Suggestion,
                RuleFamily::Variance,
                format!(
                    "Small difference with order ({:+}, {:.1}%); confirm with the supplier",
                    delta, pct
                ),
            );
        }
    }

    fn check_status(&self, line: &ReceptionLine, out: &mut EvaluatedLine) {
        let accepted = line.quantity_accepted;
        let received = line.quantity_received;

        if line.status == ConformityStatus::NonConforming && accepted > 0 {
            out.record(
                Severity::Warning,
                RuleFamily::Status,
                format!("Line is non-conforming but {} units were accepted", accepted),
            );
        }

        let has_comment = line
            .comment
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty());
        if line.status.indicates_problem() && !has_comment {
            out.record(
                Severity::Warning,
                RuleFamily::Status,
                format!("A comment is required for {} lines", line.status.as_str()),
            );
        }

        if line.status == ConformityStatus::Conforming && (0..received).contains(&accepted) {
            out.record(
                Severity::Suggestion,
                RuleFamily::Status,
                format!(
                    "Only {} of {} units accepted; consider marking the line as partial",
                    accepted, received
                ),
            );
        }
    }
}

/// Whole days from `today` to `date`; negative when `date` is past.
pub fn days_until(date: NaiveDate, today: NaiveDate) -> i64 {
    (date - today).num_days()
}

/// Absolute ordered/received difference as a percentage of the ordered quantity.
///
/// `None` when nothing was ordered or the difference does not fit an `i64`.
pub fn variance_pct(ordered: i64, received: i64) -> Option<f64> {
    if ordered <= 0 {
        return None;
    }
    let diff = received.checked_sub(ordered)?.checked_abs()?;
    Some(diff as f64 / ordered as f64 * 100.0)
}
