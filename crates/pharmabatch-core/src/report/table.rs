//! Export-ready tables.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{AggregateBucket, BucketComparison, SummaryMetrics};
use crate::rules::BatchValidation;

/// A titled table of pre-formatted cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportTable {
    /// Report title
    pub title: String,
    /// Column headers
    pub columns: Vec<String>,
    /// Rows, each with one cell per column
    pub rows: Vec<Vec<String>>,
    /// Generation timestamp (RFC 3339)
    pub generated_at: String,
}

impl ReportTable {
    /// Create an empty table.
    pub fn new(title: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            title: title.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
            generated_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Append a row.
    pub fn push_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    /// One row per bucket, in bucket order.
    pub fn from_buckets(title: impl Into<String>, buckets: &[AggregateBucket]) -> Self {
        let mut table = Self::new(title, &["key", "count", "sum", "share_pct"]);
        for bucket in buckets {
            table.push_row(vec![
                bucket.key.clone(),
                bucket.count.to_string(),
                format!("{:.2}", bucket.sum),
                format!("{:.1}", bucket.share_pct),
            ]);
        }
        table
    }

    /// One row per key with both periods and the change.
    pub fn from_comparisons(title: impl Into<String>, comparisons: &[BucketComparison]) -> Self {
        let mut table = Self::new(title, &["key", "current", "previous", "delta", "change"]);
        for c in comparisons {
            table.push_row(vec![
                c.key.clone(),
                format!("{:.2}", c.comparison.current),
                format!("{:.2}", c.comparison.previous),
                format!("{:+.2}", c.comparison.delta),
                c.comparison.change.label(),
            ]);
        }
        table
    }

    /// Single-row table of summary metrics.
    pub fn from_summary(title: impl Into<String>, metrics: &SummaryMetrics) -> Self {
        let mut table = Self::new(title, &["count", "total", "mean", "min", "max"]);
        table.push_row(vec![
            metrics.count.to_string(),
            format!("{:.2}", metrics.total),
            format!("{:.2}", metrics.mean),
            format!("{:.2}", metrics.min),
            format!("{:.2}", metrics.max),
        ]);
        table
    }

    /// One row per finding, plus batch-level findings first.
    ///
    /// Lines without findings get a single `ok` row so every line appears.
    pub fn from_validation(title: impl Into<String>, validation: &BatchValidation) -> Self {
        let mut table = Self::new(
            title,
            &["line_id", "product_id", "lot_number", "severity", "rule", "message"],
        );

        for message in &validation.batch_errors {
            table.push_row(batch_row("error", message));
        }
        for message in &validation.batch_warnings {
            table.push_row(batch_row("warning", message));
        }

        for evaluated in &validation.lines {
            let line = &evaluated.line;
            let lot = line.lot_number.clone().unwrap_or_default();
            if evaluated.findings.is_empty() {
                table.push_row(vec![
                    line.line_id.clone(),
                    line.product_id.clone(),
                    lot.clone(),
                    "ok".to_string(),
                    String::new(),
                    String::new(),
                ]);
            }
            for finding in &evaluated.findings {
                table.push_row(vec![
                    line.line_id.clone(),
                    line.product_id.clone(),
                    lot.clone(),
                    finding.severity.as_str().to_string(),
                    finding.rule.as_str().to_string(),
                    finding.message.clone(),
                ]);
            }
        }
        table
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export to CSV format (header + rows).
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();

        csv.push_str(&join_csv(&self.columns));
        csv.push('\n');

        for row in &self.rows {
            csv.push_str(&join_csv(row));
            csv.push('\n');
        }

        csv
    }

    /// SHA-256 of the CSV body, hex encoded.
    ///
    /// Ignores `generated_at`, so the same data always yields the same digest.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.title.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.to_csv().as_bytes());
        hex::encode(hasher.finalize())
    }
}

fn batch_row(severity: &str, message: &str) -> Vec<String> {
    vec![
        String::new(),
        String::new(),
        String::new(),
        severity.to_string(),
        "batch".to_string(),
        message.to_string(),
    ]
}

fn join_csv(cells: &[String]) -> String {
    cells
        .iter()
        .map(|c| escape_csv(c))
        .collect::<Vec<_>>()
        .join(",")
}

/// Escape a string for CSV output.
fn escape_csv(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::LoadReport;
    use crate::models::{EvaluatedLine, ReceptionLine, RuleFamily, Severity};

    fn buckets() -> Vec<AggregateBucket> {
        vec![
            AggregateBucket { key: "analgesics".into(), count: 2, sum: 50.0, share_pct: 62.5 },
            AggregateBucket { key: "eye, ear".into(), count: 1, sum: 30.0, share_pct: 37.5 },
        ]
    }

    #[test]
    fn test_csv_escaping() {
        assert_eq!(escape_csv("simple"), "simple");
        assert_eq!(escape_csv("with,comma"), "\"with,comma\"");
        assert_eq!(escape_csv("with\"quote"), "\"with\"\"quote\"");
        assert_eq!(escape_csv("line\r\nbreak"), "\"line\r\nbreak\"");
        assert_eq!(escape_csv("bare\rreturn"), "\"bare\rreturn\"");
    }

    #[test]
    fn test_crlf_comment_stays_in_one_record() {
        let mut table = ReportTable::new("Remarks", &["line_id", "comment"]);
        table.push_row(vec!["L1".into(), "box crushed\r\nseal intact".into()]);

        let csv = table.to_csv();
        assert_eq!(csv, "line_id,comment\nL1,\"box crushed\r\nseal intact\"\n");
    }

    #[test]
    fn test_buckets_csv() {
        let table = ReportTable::from_buckets("Sales by category", &buckets());
        let csv = table.to_csv();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "key,count,sum,share_pct");
        assert_eq!(lines[1], "analgesics,2,50.00,62.5");
        assert_eq!(lines[2], "\"eye, ear\",1,30.00,37.5");
    }

    #[test]
    fn test_digest_stable_and_sensitive() {
        let a = ReportTable::from_buckets("Sales", &buckets());
        let b = ReportTable::from_buckets("Sales", &buckets());
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 64);

        let mut changed = buckets();
        changed[0].count = 3;
        let c = ReportTable::from_buckets("Sales", &changed);
        assert_ne!(a.digest(), c.digest());
    }

    #[test]
    fn test_validation_rows() {
        let clean = EvaluatedLine::new(ReceptionLine::new("P1".into(), 1));
        let mut flagged = EvaluatedLine::new(ReceptionLine::new("P2".into(), 1));
        flagged.record(Severity::Error, RuleFamily::Existence, "Product P2 not found");
        flagged.record(Severity::Warning, RuleFamily::Expiry, "Expiry date missing");

        let validation = BatchValidation {
            lines: vec![clean, flagged],
            batch_errors: Vec::new(),
            batch_warnings: vec!["partial data".into()],
            load_report: LoadReport::default(),
        };

        let table = ReportTable::from_validation("Reception", &validation);
        assert_eq!(table.rows.len(), 4);
        assert_eq!(table.rows[0][3], "warning");
        assert_eq!(table.rows[0][4], "batch");
        assert_eq!(table.rows[1][3], "ok");
        assert_eq!(table.rows[2][3], "error");
        assert_eq!(table.rows[2][4], "existence");
        assert_eq!(table.rows[3][5], "Expiry date missing");
    }

    #[test]
    fn test_json_export() {
        let table = ReportTable::from_summary(
            "Received value",
            &SummaryMetrics { count: 2, total: 10.0, mean: 5.0, min: 4.0, max: 6.0 },
        );
        let json = table.to_json().unwrap();
        assert!(json.contains("Received value"));
        assert!(json.contains("5.00"));
    }
}
