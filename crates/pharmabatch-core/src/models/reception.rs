//! Reception lines and their evaluation results.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Conformity verdict recorded by the person receiving the delivery.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConformityStatus {
    /// Delivered as ordered
    #[default]
    Conforming,
    /// Damaged, wrong product, broken cold chain...
    NonConforming,
    /// Only part of the delivery is acceptable
    Partial,
}

impl ConformityStatus {
    /// Whether this status reports a problem that must be explained.
    pub fn indicates_problem(&self) -> bool {
        !matches!(self, ConformityStatus::Conforming)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConformityStatus::Conforming => "conforming",
            ConformityStatus::NonConforming => "non_conforming",
            ConformityStatus::Partial => "partial",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "conforming" | "conforme" => Some(ConformityStatus::Conforming),
            "non_conforming" | "non-conforming" | "non_conforme" => {
                Some(ConformityStatus::NonConforming)
            }
            "partial" | "partiel" => Some(ConformityStatus::Partial),
            _ => None,
        }
    }
}

/// One line of a supplier delivery, as entered by the caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReceptionLine {
    /// Caller-side identifier of the line
    pub line_id: String,
    /// Referenced product (batch key)
    pub product_id: String,
    /// Manufacturer lot number
    pub lot_number: Option<String>,
    /// Lot expiry date
    pub expiry_date: Option<NaiveDate>,
    /// Quantity on the purchase order, if the delivery matches one
    pub quantity_ordered: Option<i64>,
    /// Quantity physically received
    pub quantity_received: i64,
    /// Quantity accepted into stock
    pub quantity_accepted: i64,
    /// Conformity verdict
    pub status: ConformityStatus,
    /// Free-text remark, required when the status reports a problem
    pub comment: Option<String>,
    /// Invoiced unit price
    pub unit_price: Option<f64>,
}

impl ReceptionLine {
    /// Create a conforming line where everything received is accepted.
    pub fn new(product_id: String, quantity_received: i64) -> Self {
        Self {
            line_id: uuid::Uuid::new_v4().to_string(),
            product_id,
            lot_number: None,
            expiry_date: None,
            quantity_ordered: None,
            quantity_received,
            quantity_accepted: quantity_received,
            status: ConformityStatus::Conforming,
            comment: None,
            unit_price: None,
        }
    }

    /// Lot number with surrounding whitespace removed, `None` when blank.
    pub fn trimmed_lot_number(&self) -> Option<&str> {
        self.lot_number
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Accepted value of the line at the invoiced price.
    pub fn accepted_value(&self) -> f64 {
        self.unit_price.unwrap_or(0.0) * self.quantity_accepted as f64
    }
}

/// Severity of a finding.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Blocks validity of the line and therefore of the batch
    Error,
    /// Noteworthy, never blocks
    Warning,
    /// Advisory text only
    Suggestion,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Suggestion => "suggestion",
        }
    }
}

/// Rule family a finding was produced by, in evaluation order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RuleFamily {
    Existence,
    Range,
    RequiredText,
    Expiry,
    Variance,
    Status,
}

impl RuleFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleFamily::Existence => "existence",
            RuleFamily::Range => "range",
            RuleFamily::RequiredText => "required_text",
            RuleFamily::Expiry => "expiry",
            RuleFamily::Variance => "variance",
            RuleFamily::Status => "status",
        }
    }
}

/// A single error, warning or suggestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Finding {
    pub severity: Severity,
    pub rule: RuleFamily,
    pub message: String,
}

/// A reception line together with everything the rules found about it.
///
/// The three message lists are append-only and keep evaluation order;
/// `findings` holds the same messages interleaved, tagged with their rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluatedLine {
    pub line: ReceptionLine,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
    pub findings: Vec<Finding>,
}

impl EvaluatedLine {
    /// Start an evaluation with no findings.
    pub fn new(line: ReceptionLine) -> Self {
        Self {
            line,
            errors: Vec::new(),
            warnings: Vec::new(),
            suggestions: Vec::new(),
            findings: Vec::new(),
        }
    }

    /// Append a finding.
    pub fn record(&mut self, severity: Severity, rule: RuleFamily, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Error => self.errors.push(message.clone()),
            Severity::Warning => self.warnings.push(message.clone()),
            Severity::Suggestion => self.suggestions.push(message.clone()),
        }
        self.findings.push(Finding {
            severity,
            rule,
            message,
        });
    }

    /// A line is valid when no blocking error was found.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}
