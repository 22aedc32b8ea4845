//! Aggregation over evaluated lines or any other rows.
//!
//! Everything here is a read-only scan of its input. Output ordering (sum
//! descending, then key) is for display only.

mod table;

pub use table::*;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::rules::BatchValidation;

/// A named group accumulated over a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateBucket {
    pub key: String,
    pub count: usize,
    pub sum: f64,
    /// Share of the grand total, in percent (0 when the total is 0)
    pub share_pct: f64,
}

/// Count and spread of a set of values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub count: usize,
    pub total: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// Relative change between two periods.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PercentChange {
    /// Ordinary percentage; `0.0` when both periods are zero
    Percent(f64),
    /// Previous period was zero and the current one is not
    New,
}

impl PercentChange {
    /// Display form: `+12.5%`, `-3.0%` or `new`.
    pub fn label(&self) -> String {
        match self {
            PercentChange::Percent(p) => format!("{:+.1}%", p),
            PercentChange::New => "new".to_string(),
        }
    }
}

/// Current vs previous period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodComparison {
    pub current: f64,
    pub previous: f64,
    pub delta: f64,
    pub change: PercentChange,
}

impl PeriodComparison {
    pub fn new(current: f64, previous: f64) -> Self {
        Self {
            current,
            previous,
            delta: current - previous,
            change: percent_change(current, previous),
        }
    }
}

/// Per-key comparison between two bucket sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketComparison {
    pub key: String,
    pub comparison: PeriodComparison,
}

/// Pass/fail overview of a validated reception.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub lines: usize,
    pub valid_lines: usize,
    pub invalid_lines: usize,
    /// Valid lines as a percentage of all lines (0 for an empty batch)
    pub pass_rate_pct: f64,
    pub errors: usize,
    pub warnings: usize,
    pub suggestions: usize,
    pub batch_valid: bool,
}

/// Group `rows` by `key_fn`, counting rows and summing `value_fn`.
pub fn aggregate<R, K, V>(rows: &[R], key_fn: K, value_fn: V) -> Vec<AggregateBucket>
where
    K: Fn(&R) -> String,
    V: Fn(&R) -> f64,
{
    let mut groups: HashMap<String, (usize, f64)> = HashMap::new();
    for row in rows {
        let entry = groups.entry(key_fn(row)).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += value_fn(row);
    }

    let grand_total: f64 = groups.values().map(|(_, sum)| sum).sum();
    let mut buckets: Vec<AggregateBucket> = groups
        .into_iter()
        .map(|(key, (count, sum))| AggregateBucket {
            key,
            count,
            sum,
            share_pct: ratio_pct(sum, grand_total),
        })
        .collect();

    buckets.sort_by(|a, b| {
        b.sum
            .partial_cmp(&a.sum)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.key.cmp(&b.key))
    });
    buckets
}

/// Count, total, mean and extremes of `values`; all zero when empty.
pub fn summarize<I>(values: I) -> SummaryMetrics
where
    I: IntoIterator<Item = f64>,
{
    let mut metrics = SummaryMetrics::default();
    for value in values {
        if metrics.count == 0 {
            metrics.min = value;
            metrics.max = value;
        } else {
            metrics.min = metrics.min.min(value);
            metrics.max = metrics.max.max(value);
        }
        metrics.count += 1;
        metrics.total += value;
    }
    if metrics.count > 0 {
        metrics.mean = metrics.total / metrics.count as f64;
    }
    metrics
}

/// Percentage change from `previous` to `current`.
///
/// `0 -> 0` is no change; `0 -> x` is [`PercentChange::New`]. The
/// denominator is `|previous|`, so a rise is always positive.
pub fn percent_change(current: f64, previous: f64) -> PercentChange {
    if previous == 0.0 {
        if current == 0.0 {
            PercentChange::Percent(0.0)
        } else {
            PercentChange::New
        }
    } else {
        PercentChange::Percent((current - previous) / previous.abs() * 100.0)
    }
}

/// Compare the totals of two row sets.
pub fn compare_periods<R, V>(current: &[R], previous: &[R], value_fn: V) -> PeriodComparison
where
    V: Fn(&R) -> f64,
{
    let current_total: f64 = current.iter().map(&value_fn).sum();
    let previous_total: f64 = previous.iter().map(&value_fn).sum();
    PeriodComparison::new(current_total, previous_total)
}

/// Compare two bucket sets key by key.
///
/// Keys missing on one side count as zero there. Output follows the
/// current buckets' order, then keys only present in the previous period.
pub fn compare_buckets(
    current: &[AggregateBucket],
    previous: &[AggregateBucket],
) -> Vec<BucketComparison> {
    let previous_sums: HashMap<&str, f64> =
        previous.iter().map(|b| (b.key.as_str(), b.sum)).collect();

    let mut comparisons: Vec<BucketComparison> = current
        .iter()
        .map(|b| BucketComparison {
            key: b.key.clone(),
            comparison: PeriodComparison::new(
                b.sum,
                previous_sums.get(b.key.as_str()).copied().unwrap_or(0.0),
            ),
        })
        .collect();

    for b in previous {
        if !current.iter().any(|c| c.key == b.key) {
            comparisons.push(BucketComparison {
                key: b.key.clone(),
                comparison: PeriodComparison::new(0.0, b.sum),
            });
        }
    }
    comparisons
}

/// Pass/fail counts of a validated reception.
pub fn validation_summary(validation: &BatchValidation) -> ValidationSummary {
    let lines = validation.lines.len();
    let valid_lines = validation.valid_count();
    ValidationSummary {
        lines,
        valid_lines,
        invalid_lines: lines - valid_lines,
        pass_rate_pct: ratio_pct(valid_lines as f64, lines as f64),
        errors: validation.error_count(),
        warnings: validation.warning_count(),
        suggestions: validation.suggestion_count(),
        batch_valid: validation.is_valid(),
    }
}

/// `part / whole` in percent, 0 when `whole` is 0.
fn ratio_pct(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        part / whole * 100.0
    }
}
