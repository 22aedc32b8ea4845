//! Golden tests for reception validation.
//!
//! Each case is a single reception line checked against a small pharmacy
//! catalog, with the findings it must produce.

use chrono::{Duration, NaiveDate};
use pharmabatch_core::models::{ConformityStatus, LotSnapshot, ProductSnapshot, ReceptionLine};
use pharmabatch_core::{Database, PipelineConfig, ReceptionValidationService};

/// Test case from golden file.
struct GoldenCase {
    id: &'static str,
    product_id: &'static str,
    lot_number: Option<&'static str>,
    expiry_in_days: Option<i64>,
    ordered: Option<i64>,
    received: i64,
    accepted: i64,
    status: ConformityStatus,
    comment: Option<&'static str>,
    expected_valid: bool,
    expected_errors: &'static [&'static str],
    expected_warnings: &'static [&'static str],
    expected_suggestions: usize,
}

fn get_golden_cases() -> Vec<GoldenCase> {
    vec![
        GoldenCase {
            id: "clean-line",
            product_id: "DOLI500",
            lot_number: Some("GA1001"),
            expiry_in_days: Some(400),
            ordered: Some(50),
            received: 50,
            accepted: 50,
            status: ConformityStatus::Conforming,
            comment: None,
            expected_valid: true,
            expected_errors: &[],
            expected_warnings: &[],
            expected_suggestions: 0,
        },
        GoldenCase {
            id: "unknown-product",
            product_id: "C",
            lot_number: Some("GB2002"),
            expiry_in_days: Some(400),
            ordered: None,
            received: 10,
            accepted: 10,
            status: ConformityStatus::Conforming,
            comment: None,
            expected_valid: false,
            expected_errors: &["Product C not found"],
            expected_warnings: &[],
            expected_suggestions: 0,
        },
        GoldenCase {
            id: "short-delivery",
            product_id: "AMOX1G",
            lot_number: Some("GC3003"),
            expiry_in_days: Some(400),
            ordered: Some(120),
            received: 100,
            accepted: 100,
            status: ConformityStatus::Conforming,
            comment: None,
            expected_valid: true,
            expected_errors: &[],
            expected_warnings: &["-20 (16.7%)"],
            expected_suggestions: 0,
        },
        GoldenCase {
            id: "near-expiry",
            product_id: "DOLI500",
            lot_number: Some("GD4004"),
            expiry_in_days: Some(10),
            ordered: None,
            received: 5,
            accepted: 5,
            status: ConformityStatus::Conforming,
            comment: None,
            expected_valid: true,
            expected_errors: &[],
            expected_warnings: &["expires in 10 days"],
            expected_suggestions: 0,
        },
        GoldenCase {
            id: "expired-lot",
            product_id: "AMOX1G",
            lot_number: Some("GE5005"),
            expiry_in_days: Some(-3),
            ordered: None,
            received: 5,
            accepted: 5,
            status: ConformityStatus::Conforming,
            comment: None,
            expected_valid: false,
            expected_errors: &["3 days ago"],
            expected_warnings: &[],
            expected_suggestions: 0,
        },
        GoldenCase {
            id: "lot-already-stocked",
            product_id: "DOLI500",
            lot_number: Some("old1"),
            expiry_in_days: Some(400),
            ordered: None,
            received: 5,
            accepted: 5,
            status: ConformityStatus::Conforming,
            comment: None,
            expected_valid: true,
            expected_errors: &[],
            expected_warnings: &["already exists in stock"],
            expected_suggestions: 1,
        },
        GoldenCase {
            id: "missing-lot",
            product_id: "AMOX1G",
            lot_number: None,
            expiry_in_days: Some(400),
            ordered: None,
            received: 5,
            accepted: 5,
            status: ConformityStatus::Conforming,
            comment: None,
            expected_valid: false,
            expected_errors: &["Lot number is required"],
            expected_warnings: &[],
            expected_suggestions: 0,
        },
        GoldenCase {
            id: "partial-without-comment",
            product_id: "DOLI500",
            lot_number: Some("GF6006"),
            expiry_in_days: Some(400),
            ordered: Some(20),
            received: 20,
            accepted: 15,
            status: ConformityStatus::Partial,
            comment: None,
            expected_valid: true,
            expected_errors: &[],
            expected_warnings: &["comment is required for partial"],
            expected_suggestions: 0,
        },
        GoldenCase {
            id: "accepted-exceeds-received",
            product_id: "AMOX1G",
            lot_number: Some("GG7007"),
            expiry_in_days: Some(400),
            ordered: None,
            received: 4,
            accepted: 6,
            status: ConformityStatus::Conforming,
            comment: None,
            expected_valid: false,
            expected_errors: &["Accepted quantity (6) exceeds received quantity (4)"],
            expected_warnings: &[],
            expected_suggestions: 0,
        },
        GoldenCase {
            id: "discontinued-product",
            product_id: "RETIRED",
            lot_number: Some("GH8008"),
            expiry_in_days: Some(400),
            ordered: None,
            received: 1,
            accepted: 1,
            status: ConformityStatus::Conforming,
            comment: None,
            expected_valid: true,
            expected_errors: &[],
            expected_warnings: &["no longer active"],
            expected_suggestions: 0,
        },
    ]
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn setup_db() -> Database {
    let db = Database::open_in_memory().unwrap();

    let mut doli = ProductSnapshot::new("DOLI500".into(), "Doliprane 500mg".into(), "analgesics".into());
    doli.unit_price = Some(1.85);
    db.upsert_product(&doli).unwrap();

    let mut amox = ProductSnapshot::new("AMOX1G".into(), "Amoxicilline 1g".into(), "antibiotics".into());
    amox.unit_price = Some(4.10);
    db.upsert_product(&amox).unwrap();

    let mut retired = ProductSnapshot::new("RETIRED".into(), "Old syrup".into(), "misc".into());
    retired.active = false;
    db.upsert_product(&retired).unwrap();

    let mut lot = LotSnapshot::new("DOLI500".into(), "OLD-1".into());
    lot.quantity = 30;
    lot.expiry_date = Some(today() + Duration::days(200));
    db.upsert_lot(&lot).unwrap();

    db
}

fn build_line(case: &GoldenCase) -> ReceptionLine {
    let mut line = ReceptionLine::new(case.product_id.into(), case.received);
    line.line_id = case.id.to_string();
    line.lot_number = case.lot_number.map(Into::into);
    line.expiry_date = case.expiry_in_days.map(|d| today() + Duration::days(d));
    line.quantity_ordered = case.ordered;
    line.quantity_accepted = case.accepted;
    line.status = case.status;
    line.comment = case.comment.map(Into::into);
    line
}

fn assert_contains_all(case_id: &str, kind: &str, actual: &[String], expected: &[&str]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "[{}] {}: got {:?}",
        case_id,
        kind,
        actual
    );
    for (got, want) in actual.iter().zip(expected) {
        assert!(got.contains(want), "[{}] {}: '{}' lacks '{}'", case_id, kind, got, want);
    }
}

#[test]
fn test_golden_cases() {
    init_tracing();
    let db = setup_db();
    let service = ReceptionValidationService::with_today(&db, PipelineConfig::default(), today());

    for case in get_golden_cases() {
        let validation = service.validate(&[build_line(&case)]);
        let evaluated = &validation.lines[0];

        assert_eq!(evaluated.is_valid(), case.expected_valid, "[{}] validity", case.id);
        assert_eq!(validation.is_valid(), case.expected_valid, "[{}] batch validity", case.id);
        assert_contains_all(case.id, "errors", &evaluated.errors, case.expected_errors);
        assert_contains_all(case.id, "warnings", &evaluated.warnings, case.expected_warnings);
        assert_eq!(
            evaluated.suggestions.len(),
            case.expected_suggestions,
            "[{}] suggestions: {:?}",
            case.id,
            evaluated.suggestions
        );
    }
}

#[test]
fn test_golden_batch_preserves_order() {
    init_tracing();
    let db = setup_db();
    let service = ReceptionValidationService::with_today(&db, PipelineConfig::default(), today());

    let cases = get_golden_cases();
    let lines: Vec<ReceptionLine> = cases.iter().map(build_line).collect();
    let validation = service.validate(&lines);

    assert_eq!(validation.lines.len(), cases.len());
    for (evaluated, case) in validation.lines.iter().zip(&cases) {
        assert_eq!(evaluated.line.line_id, case.id);
        assert_eq!(evaluated.is_valid(), case.expected_valid, "[{}]", case.id);
    }

    let expected_invalid = cases.iter().filter(|c| !c.expected_valid).count();
    assert_eq!(validation.lines.len() - validation.valid_count(), expected_invalid);
    assert!(!validation.is_valid());
    assert!(validation.batch_errors.is_empty());
    assert!(validation.load_report.is_complete());
    // One product fetch and one lot fetch
    assert_eq!(validation.load_report.chunks_issued, 2);
}

#[test]
fn test_validation_is_repeatable() {
    let db = setup_db();
    let service = ReceptionValidationService::with_today(&db, PipelineConfig::default(), today());
    let lines: Vec<ReceptionLine> = get_golden_cases().iter().map(build_line).collect();

    let first = service.validate(&lines);
    let second = service.validate(&lines);

    assert_eq!(first.lines, second.lines);
    assert_eq!(first.batch_warnings, second.batch_warnings);
}

#[test]
fn test_small_chunks_same_findings() {
    let db = setup_db();
    let lines: Vec<ReceptionLine> = get_golden_cases().iter().map(build_line).collect();

    let default = ReceptionValidationService::with_today(&db, PipelineConfig::default(), today())
        .validate(&lines);

    let mut config = PipelineConfig::default();
    config.loader.chunk_size = 1;
    let chunked = ReceptionValidationService::with_today(&db, config, today()).validate(&lines);

    assert_eq!(default.lines, chunked.lines);
    assert!(chunked.load_report.chunks_issued > default.load_report.chunks_issued);
}

#[test]
fn test_stocked_lot_found_past_one_chunk() {
    let db = setup_db();
    let service = ReceptionValidationService::with_today(&db, PipelineConfig::default(), today());

    let mut lines: Vec<ReceptionLine> = (0..500)
        .map(|i| {
            let mut line = ReceptionLine::new("AMOX1G".into(), 1);
            line.lot_number = Some(format!("N{i}"));
            line.expiry_date = Some(today() + Duration::days(400));
            line
        })
        .collect();
    let mut stocked = ReceptionLine::new("DOLI500".into(), 1);
    stocked.lot_number = Some("old1".into());
    stocked.expiry_date = Some(today() + Duration::days(400));
    lines.push(stocked);

    let validation = service.validate(&lines);

    assert!(validation.load_report.is_complete());
    // One product chunk, 501 lot pairs over two chunks
    assert_eq!(validation.load_report.chunks_issued, 3);
    let last = &validation.lines[500];
    assert_eq!(last.warnings.len(), 1);
    assert!(last.warnings[0].contains("already exists in stock"));
}
