//! Table profiling for imputation decisions.
//!
//! This module provides:
//! - Per-column missingness profiles ([`MissingnessAnalyzer`])
//! - Correlated-peer counting for MICE eligibility ([`CorrelationScout`])

mod correlation;

pub use correlation::{CorrelationMatrix, CorrelationScout};

use crate::types::ColumnProfile;
use crate::utils::{logical_type, missing_in_column};
use polars::prelude::*;

/// Computes missing counts and ratios for every column of a table.
pub struct MissingnessAnalyzer;

impl MissingnessAnalyzer {
    /// Profile every column, in table order.
    pub fn analyze(df: &DataFrame) -> Vec<ColumnProfile> {
        let n_rows = df.height();
        df.get_columns()
            .iter()
            .map(|col| {
                let missing_count = missing_in_column(col);
                let missing_ratio = if n_rows == 0 {
                    0.0
                } else {
                    missing_count as f64 / n_rows as f64
                };
                ColumnProfile {
                    name: col.name().to_string(),
                    logical_type: logical_type(col.dtype()),
                    missing_count,
                    missing_ratio,
                }
            })
            .collect()
    }

    /// Profile a single column.
    pub fn analyze_column(df: &DataFrame, name: &str) -> Option<ColumnProfile> {
        let col = df.column(name).ok()?;
        let missing_count = missing_in_column(col);
        let missing_ratio = if df.height() == 0 {
            0.0
        } else {
            missing_count as f64 / df.height() as f64
        };
        Some(ColumnProfile {
            name: name.to_string(),
            logical_type: logical_type(col.dtype()),
            missing_count,
            missing_ratio,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LogicalType;

    #[test]
    fn test_analyze_counts_and_ratios() {
        let df = df![
            "age" => [Some(30.0), None, Some(40.0), None],
            "city" => [Some("a"), Some("b"), None, Some("c")],
            "id" => [1, 2, 3, 4],
        ]
        .unwrap();

        let profiles = MissingnessAnalyzer::analyze(&df);

        assert_eq!(profiles.len(), 3);
        assert_eq!(profiles[0].name, "age");
        assert_eq!(profiles[0].logical_type, LogicalType::Numeric);
        assert_eq!(profiles[0].missing_count, 2);
        assert!((profiles[0].missing_ratio - 0.5).abs() < 1e-12);
        assert_eq!(profiles[1].logical_type, LogicalType::Categorical);
        assert!((profiles[1].missing_ratio - 0.25).abs() < 1e-12);
        assert!(!profiles[2].has_missing());
    }

    #[test]
    fn test_analyze_zero_rows() {
        let df = df![
            "age" => Vec::<Option<f64>>::new(),
            "city" => Vec::<Option<&str>>::new(),
        ]
        .unwrap();

        let profiles = MissingnessAnalyzer::analyze(&df);

        assert_eq!(profiles.len(), 2);
        assert!(profiles.iter().all(|p| p.missing_ratio == 0.0));
        assert!(profiles.iter().all(|p| p.missing_count == 0));
    }

    #[test]
    fn test_analyze_column() {
        let df = df!["v" => [Some(1.0), None]].unwrap();
        let profile = MissingnessAnalyzer::analyze_column(&df, "v").unwrap();
        assert_eq!(profile.missing_count, 1);
        assert!(MissingnessAnalyzer::analyze_column(&df, "missing").is_none());
    }

    #[test]
    fn test_nan_is_counted_as_missing() {
        let df = df!["v" => [Some(1.0), Some(f64::NAN), None, Some(4.0)]].unwrap();
        let profile = MissingnessAnalyzer::analyze_column(&df, "v").unwrap();
        assert_eq!(profile.missing_count, 2);
        assert!((profile.missing_ratio - 0.5).abs() < 1e-12);
    }
}
