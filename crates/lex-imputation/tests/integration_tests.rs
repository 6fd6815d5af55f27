//! Integration tests for the imputation engine.
//!
//! These tests run the engine end to end on synthetic tables and a small CSV
//! fixture.

use lex_imputation::{
    GateStatus, ImputationConfig, ImputationEngine, ImputationMethod, ImputationReport,
    ImputationStage, JointPassMode, ProgressUpdate,
};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_csv(filename: &str) -> DataFrame {
    let path = fixtures_path().join(filename);
    CsvReadOptions::default()
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_try_parse_dates(true))
        .try_into_reader_with_file_path(Some(path))
        .expect("Failed to create CSV reader")
        .finish()
        .expect("Failed to read CSV file")
}

fn engine(config: ImputationConfig) -> ImputationEngine {
    ImputationEngine::builder().config(config).build().unwrap()
}

fn default_engine() -> ImputationEngine {
    engine(ImputationConfig::default())
}

fn date_column(name: &str, days: Vec<Option<i32>>) -> Column {
    Series::new(name.into(), days)
        .cast(&DataType::Date)
        .unwrap()
        .into()
}

/// Numeric table with a target `y` missing every 10th row and peers that
/// correlate strongly with it.
fn correlated_frame(n: usize, peers: usize) -> DataFrame {
    let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let y: Vec<Option<f64>> = (0..n)
        .map(|i| (i % 10 != 0).then(|| x[i] + ((i * 17) % 5) as f64))
        .collect();

    let mut columns: Vec<Column> = vec![Series::new("y".into(), y).into()];
    for p in 0..peers {
        let values: Vec<f64> = (0..n)
            .map(|i| (p as f64 + 1.0) * x[i] + ((i * (13 + p)) % 7) as f64)
            .collect();
        columns.push(Series::new(format!("peer{}", p).into(), values).into());
    }
    DataFrame::new(columns).unwrap()
}

fn mixed_frame() -> DataFrame {
    let mut df = df![
        "age" => [Some(31.0), None, Some(45.0), Some(28.0), None, Some(52.0), Some(39.0), Some(41.0)],
        "city" => [Some("x"), Some("y"), None, Some("x"), Some("y"), Some("x"), None, Some("x")],
        "score" => [1, 2, 3, 4, 5, 6, 7, 8],
    ]
    .unwrap();
    df.with_column(date_column(
        "joined",
        vec![Some(19_000), None, Some(19_010), Some(19_020), None, Some(19_030), Some(19_040), Some(19_050)],
    ))
    .unwrap();
    df
}

// ============================================================================
// End-to-End Runs
// ============================================================================

#[test]
fn test_run_on_csv_fixture_with_group_column() {
    let df = load_csv("sales.csv");
    let config = ImputationConfig::builder().group_column("region").build().unwrap();

    let outcome = engine(config).run(df).unwrap();
    let report = &outcome.report;

    assert_eq!(report.decision_for("units").unwrap().method, ImputationMethod::GroupMedian);
    assert_eq!(report.decision_for("segment").unwrap().method, ImputationMethod::GroupMode);
    assert_eq!(report.decision_for("order_date").unwrap().method, ImputationMethod::FlagOnly);
    assert!(report.decision_for("price").is_none());
    assert!(report.decision_for("region").is_none());

    let units = outcome.table.column("units").unwrap().as_materialized_series().f64().unwrap().clone();
    assert_eq!(units.get(1), Some(14.0));
    assert_eq!(units.get(6), Some(30.0));

    let segment = outcome.table.column("segment").unwrap().as_materialized_series().str().unwrap().clone();
    assert_eq!(segment.get(2), Some("retail"));
    assert_eq!(segment.get(7), Some("wholesale"));

    assert!(outcome.table.column("order_date_missing").is_ok());
    assert!(report.validation.contains_key("units"));
}

#[test]
fn test_idempotence_second_run_makes_no_decisions() {
    let engine = default_engine();

    let first = engine.run(mixed_frame()).unwrap();
    assert_eq!(first.report.decisions.len(), 3);

    let second = engine.run(first.table.clone()).unwrap();
    assert!(second.report.decisions.is_empty());
    assert!(second.report.validation.is_empty());
    assert!(second.table.equals_missing(&first.table));
}

#[test]
fn test_completeness_never_decreases() {
    let outcome = default_engine().run(mixed_frame()).unwrap();

    assert!(outcome.summary.completeness_after >= outcome.summary.completeness_before);
    assert_eq!(outcome.report.record_completeness, outcome.summary.completeness_after);
    assert_eq!(outcome.summary.columns_after, outcome.summary.columns_before + 1);
}

#[test]
fn test_report_json_shape() {
    let outcome = default_engine().run(mixed_frame()).unwrap();
    let value = serde_json::to_value(&outcome.report).unwrap();

    let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(|k| k.as_str()).collect();
    keys.sort_unstable();
    assert_eq!(
        keys,
        vec!["decisions", "record_completeness", "status", "validation", "warnings"]
    );

    let decision = &value["decisions"][0];
    assert_eq!(decision["column"], "age");
    assert_eq!(decision["method"], "median");
    assert_eq!(decision["missing_before"], 2);
    assert_eq!(decision["missing_after"], 0);

    let parsed = ImputationReport::from_json(&outcome.report.to_json_pretty().unwrap()).unwrap();
    assert_eq!(parsed, outcome.report);
}

// ============================================================================
// Decision Properties
// ============================================================================

#[test]
fn test_threshold_boundary_uses_median() {
    let values: Vec<Option<f64>> = (0..100).map(|i| (i >= 5).then_some(i as f64)).collect();
    let df = df!["v" => values].unwrap();
    let plan = default_engine().plan(&df);
    assert_eq!(plan[0].method, ImputationMethod::Median);
    assert!((plan[0].missing_ratio - 0.05).abs() < 1e-12);

    // 5.1% without a group column on a small table
    let values: Vec<Option<f64>> = (0..1000).map(|i| (i >= 51).then_some(i as f64)).collect();
    let df = df!["v" => values].unwrap();
    let plan = default_engine().plan(&df);
    assert_eq!(plan[0].method, ImputationMethod::Median);
    assert!(plan[0].reason.contains("small table"));
}

#[test]
fn test_datetime_columns_are_flagged_not_imputed() {
    let mask = vec![false, true, false, false, true, false, false, false];
    let outcome = default_engine().run(mixed_frame()).unwrap();

    let decision = outcome.report.decision_for("joined").unwrap();
    assert_eq!(decision.method, ImputationMethod::FlagOnly);
    assert_eq!(decision.missing_before, 2);
    assert_eq!(decision.missing_after, decision.missing_before);
    assert_eq!(outcome.table.column("joined").unwrap().null_count(), 2);

    let indicator: Vec<Option<bool>> = outcome
        .table
        .column("joined_missing")
        .unwrap()
        .as_materialized_series()
        .bool()
        .unwrap()
        .into_iter()
        .collect();
    let expected: Vec<Option<bool>> = mask.into_iter().map(Some).collect();
    assert_eq!(indicator, expected);
    assert!(!outcome.report.validation.contains_key("joined"));
}

#[test]
fn test_large_correlated_table_chooses_mice() {
    let df = correlated_frame(60_000, 3);
    let plan = default_engine().plan(&df);

    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].column, "y");
    assert!((plan[0].missing_ratio - 0.1).abs() < 1e-12);
    assert_eq!(plan[0].method, ImputationMethod::Mice);
}

#[test]
fn test_large_table_without_enough_peers_chooses_knn() {
    let df = correlated_frame(60_000, 2);
    let plan = default_engine().plan(&df);

    assert_eq!(plan[0].method, ImputationMethod::Knn);
    assert!(plan[0].reason.contains("2 correlated peers"));
}

#[test]
fn test_medium_table_chooses_knn_above_breakpoint() {
    let plan = default_engine().plan(&correlated_frame(10_000, 1));
    assert_eq!(plan[0].method, ImputationMethod::Knn);

    let plan = default_engine().plan(&correlated_frame(9_999, 1));
    assert_eq!(plan[0].method, ImputationMethod::Median);
}

#[test]
fn test_small_table_never_uses_joint_methods() {
    let n = 500;
    let group: Vec<&str> = (0..n).map(|i| if i % 2 == 0 { "a" } else { "b" }).collect();
    let sparse = |every: usize| -> Vec<Option<f64>> {
        (0..n).map(|i| (i % every != 0).then_some(i as f64)).collect()
    };
    let mostly_missing: Vec<Option<f64>> = (0..n).map(|i| (i % 5 == 0).then_some(i as f64)).collect();
    let df = df![
        "group" => group,
        "ten" => sparse(10),
        "half" => sparse(2),
        "most" => mostly_missing,
    ]
    .unwrap();

    for config in [
        ImputationConfig::default(),
        ImputationConfig::builder().group_column("group").build().unwrap(),
    ] {
        let plan = engine(config).plan(&df);
        assert_eq!(plan.len(), 3);
        for planned in &plan {
            assert!(
                !planned.method.is_joint(),
                "{} got {}",
                planned.column,
                planned.method
            );
        }
    }
}

// ============================================================================
// Joint Passes
// ============================================================================

fn joint_config(mode: JointPassMode) -> ImputationConfig {
    ImputationConfig::builder()
        .row_breakpoints(10, 20, 100_000)
        .joint_pass_mode(mode)
        .build()
        .unwrap()
}

#[test]
fn test_knn_run_batched_and_per_column() {
    for mode in [JointPassMode::Batched, JointPassMode::PerColumn] {
        let mut df = correlated_frame(60, 2);
        // second incomplete column
        let peer: Vec<Option<f64>> = df
            .column("peer0")
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_iter()
            .enumerate()
            .map(|(i, v)| if i % 7 == 3 { None } else { v })
            .collect();
        df.replace("peer0", Series::new("peer0".into(), peer)).unwrap();

        let outcome = engine(joint_config(mode)).run(df).unwrap();

        for column in ["y", "peer0"] {
            let decision = outcome.report.decision_for(column).unwrap();
            assert_eq!(decision.method, ImputationMethod::Knn, "{:?}", mode);
            assert_eq!(decision.missing_after, 0);
            assert_eq!(outcome.table.column(column).unwrap().null_count(), 0);
        }
    }
}

#[test]
fn test_mice_run_fills_target() {
    let config = ImputationConfig::builder()
        .row_breakpoints(10, 20, 100)
        .build()
        .unwrap();

    let outcome = engine(config).run(correlated_frame(200, 3)).unwrap();

    let decision = outcome.report.decision_for("y").unwrap();
    assert_eq!(decision.method, ImputationMethod::Mice);
    assert_eq!(decision.missing_after, 0);

    let y = outcome.table.column("y").unwrap().as_materialized_series().f64().unwrap().clone();
    for i in (0..200).step_by(10) {
        let value = y.get(i).unwrap();
        // y = x + noise in [0, 4]
        assert!((value - i as f64).abs() < 10.0, "row {} got {}", i, value);
    }
}

#[test]
fn test_empty_column_falls_back_alone_and_run_completes() {
    let n = 60;
    let a: Vec<Option<f64>> = (0..n).map(|i| (i % 10 != 0).then_some(i as f64)).collect();
    let b: Vec<Option<f64>> = (0..n).map(|i| (i % 7 != 3).then_some((i * 2) as f64)).collect();
    let c: Vec<f64> = (0..n).map(|i| (i * 3 % 11) as f64).collect();
    let empty: Vec<Option<f64>> = vec![None; n];
    let df = df!["a" => a, "b" => b, "c" => c, "empty" => empty].unwrap();

    let outcome = engine(joint_config(JointPassMode::Batched)).run(df).unwrap();

    for column in ["a", "b"] {
        let decision = outcome.report.decision_for(column).unwrap();
        assert_eq!(decision.method, ImputationMethod::Knn, "{}", column);
        assert_eq!(decision.missing_after, 0);
    }

    let empty = outcome.report.decision_for("empty").unwrap();
    assert_eq!(empty.method, ImputationMethod::Median);
    assert!(empty.reason.contains("knn failed (column 'empty' has no observed values)"));
    assert_eq!(empty.missing_after, n);

    let fallbacks: Vec<&String> = outcome
        .report
        .warnings
        .iter()
        .filter(|w| w.contains("fell back to"))
        .collect();
    assert_eq!(fallbacks.len(), 1);
    assert!(fallbacks[0].starts_with("KNN Imputation failed for 'empty'"));
    // the all-null column keeps completeness at 75%
    assert_eq!(outcome.report.status, GateStatus::Stop);
}

#[test]
fn test_empty_numeric_column_does_not_block_mice() {
    let n = 60_000;
    let mut df = correlated_frame(n, 3);
    df.with_column(Series::new("empty".into(), vec![Option::<f64>::None; n]))
        .unwrap();
    let labels: Vec<&str> = (0..n).map(|i| if i % 3 == 0 { "a" } else { "b" }).collect();
    df.with_column(Series::new("cat".into(), labels)).unwrap();

    let outcome = default_engine().run(df).unwrap();

    let y = outcome.report.decision_for("y").unwrap();
    assert_eq!(y.method, ImputationMethod::Mice, "{}", y.reason);
    assert_eq!(y.missing_after, 0);
    assert!(!y.reason.contains("failed"));

    let empty = outcome.report.decision_for("empty").unwrap();
    assert_eq!(empty.method, ImputationMethod::Median);
    assert_eq!(empty.missing_after, n);
}

#[test]
fn test_nan_cells_are_missing_end_to_end() {
    let x: Vec<Option<f64>> = (0..100)
        .map(|i| match i {
            3 => None,
            7 => Some(f64::NAN),
            _ => Some(i as f64),
        })
        .collect();
    let df = df!["x" => x].unwrap();

    let outcome = default_engine().run(df).unwrap();

    let decision = outcome.report.decision_for("x").unwrap();
    assert_eq!(decision.method, ImputationMethod::Median);
    assert_eq!(decision.missing_before, 2);
    assert_eq!(decision.missing_after, 0);

    let x = outcome.table.column("x").unwrap().as_materialized_series().f64().unwrap().clone();
    assert!(x.get(7).is_some_and(f64::is_finite));
    assert_eq!(x.get(3), x.get(7));
    assert_eq!(outcome.summary.completeness_after, 1.0);
}

// ============================================================================
// Validation and Gate
// ============================================================================

#[test]
fn test_median_refill_psi_scenario() {
    let df = df![
        "v" => [Some(10.0), Some(11.0), None, Some(13.0), Some(9.0), None, Some(10.0), Some(12.0), Some(11.0), Some(13.0)],
    ]
    .unwrap();
    let config = ImputationConfig::builder()
        .min_validation_samples(8)
        .build()
        .unwrap();

    let outcome = engine(config).run(df).unwrap();

    let decision = outcome.report.decision_for("v").unwrap();
    assert_eq!(decision.method, ImputationMethod::Median);
    let filled = outcome.table.column("v").unwrap().as_materialized_series().f64().unwrap().clone();
    assert_eq!(filled.get(2), Some(11.0));
    assert_eq!(filled.get(5), Some(11.0));

    let metric = &outcome.report.validation["v"];
    assert!((metric.psi - 0.103_972_077_083_991_82).abs() < 1e-9);
    assert!((metric.ks_statistic - 0.075).abs() < 1e-12);
    assert!(!metric.passed);

    // the only validated column failed
    assert_eq!(outcome.report.status, GateStatus::Stop);
    assert_eq!(outcome.report.record_completeness, 1.0);
}

#[test]
fn test_low_completeness_stops() {
    let df = DataFrame::new(vec![date_column(
        "when",
        vec![Some(19_000), None, Some(19_002), None],
    )])
    .unwrap();

    let outcome = default_engine().run(df).unwrap();

    assert!((outcome.report.record_completeness - 0.75).abs() < 1e-12);
    assert_eq!(outcome.report.status, GateStatus::Stop);
    assert!(outcome.report.validation.is_empty());
    assert!(outcome.report.warnings.iter().any(|w| w.contains("75.0%")));
}

#[test]
fn test_clean_table_passes() {
    let df = df!["a" => [1.0, 2.0, 3.0], "b" => ["x", "y", "z"]].unwrap();

    let outcome = default_engine().run(df).unwrap();

    assert!(outcome.report.decisions.is_empty());
    assert_eq!(outcome.report.status, GateStatus::Pass);
    assert_eq!(outcome.report.record_completeness, 1.0);
}

// ============================================================================
// Progress Reporting
// ============================================================================

#[test]
fn test_progress_updates_are_monotonic() {
    let updates: Arc<Mutex<Vec<ProgressUpdate>>> = Arc::new(Mutex::new(Vec::new()));
    let updates_clone = updates.clone();

    ImputationEngine::builder()
        .on_progress(move |update| updates_clone.lock().unwrap().push(update))
        .build()
        .unwrap()
        .run(mixed_frame())
        .unwrap();

    let updates = updates.lock().unwrap();
    assert!(updates.len() > 5);
    for pair in updates.windows(2) {
        assert!(
            pair[1].progress + 1e-6 >= pair[0].progress,
            "{:?} -> {:?}",
            pair[0].stage,
            pair[1].stage
        );
    }

    let imputing: Vec<_> = updates
        .iter()
        .filter(|u| u.stage == ImputationStage::Imputing)
        .collect();
    assert_eq!(imputing.len(), 3);
    assert_eq!(imputing[0].items_total, Some(3));
    assert_eq!(updates.last().unwrap().stage, ImputationStage::Complete);
}
