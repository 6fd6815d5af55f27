//! Statistical imputation methods.
//!
//! Column-local fills: median for numeric columns, mode or a constant label
//! for categorical columns, and the indicator column used for dates.

use crate::utils::{
    median_of, mode_of, null_mask, numeric_values, string_values, write_labels, write_numeric,
};
use anyhow::{Context, Result};
use polars::prelude::*;
use tracing::{debug, warn};

/// Statistical imputation methods for filling missing values.
///
/// Every fill returns the number of cells it wrote.
pub struct StatisticalImputer;

impl StatisticalImputer {
    /// Fill a numeric column with the median of its observed values.
    pub fn apply_median(df: &mut DataFrame, col_name: &str) -> Result<usize> {
        let values = numeric_values(df, col_name)?;
        let finite: Vec<Option<f64>> = values
            .iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect();
        let Some(median_val) = median_of(&finite) else {
            warn!("Column '{}' has no observed values, median fill skipped", col_name);
            return Ok(0);
        };

        let (filled_values, filled) = fill_numeric(values, median_val);
        write_numeric(df, col_name, filled_values)?;

        debug!("Filled {} values in '{}' with median {:.4}", filled, col_name, median_val);
        Ok(filled)
    }

    /// Fill a categorical column with its most frequent label.
    pub fn apply_mode(df: &mut DataFrame, col_name: &str) -> Result<usize> {
        let values = string_values(df, col_name)?;
        let Some(mode_val) = mode_of(&values) else {
            warn!("Column '{}' has no observed values, mode fill skipped", col_name);
            return Ok(0);
        };

        let filled = Self::fill_label(df, col_name, values, &mode_val)?;
        debug!("Filled {} values in '{}' with mode '{}'", filled, col_name, mode_val);
        Ok(filled)
    }

    /// Fill a categorical column with a constant label, opening the category
    /// domain when the column's dtype cannot hold it.
    pub fn apply_unknown(df: &mut DataFrame, col_name: &str, label: &str) -> Result<usize> {
        let values = string_values(df, col_name)?;
        let filled = Self::fill_label(df, col_name, values, label)?;
        debug!("Filled {} values in '{}' with '{}'", filled, col_name, label);
        Ok(filled)
    }

    /// Leave `col_name` untouched and append a boolean indicator column that
    /// equals its null mask.
    pub fn apply_flag_only(df: &mut DataFrame, col_name: &str, indicator: &str) -> Result<usize> {
        let mask = null_mask(df, col_name)?;
        let flagged = mask.iter().filter(|&&m| m).count();
        df.with_column(Series::new(indicator.into(), mask))
            .with_context(|| format!("Failed to add indicator column '{}'", indicator))?;

        debug!("Added '{}' flagging {} missing values", indicator, flagged);
        Ok(0)
    }

    fn fill_label(
        df: &mut DataFrame,
        col_name: &str,
        values: Vec<Option<String>>,
        label: &str,
    ) -> Result<usize> {
        let original = df.column(col_name)?.dtype().clone();
        let mut filled = 0;
        let values: Vec<Option<String>> = values
            .into_iter()
            .map(|v| {
                v.or_else(|| {
                    filled += 1;
                    Some(label.to_string())
                })
            })
            .collect();

        write_labels(df, col_name, values, &original)?;
        Ok(filled)
    }
}

/// Replace nulls with `fill_value`, returning the new buffer and the count.
pub(crate) fn fill_numeric(values: Vec<Option<f64>>, fill_value: f64) -> (Vec<Option<f64>>, usize) {
    let mut filled = 0;
    let values = values
        .into_iter()
        .map(|v| {
            v.or_else(|| {
                filled += 1;
                Some(fill_value)
            })
        })
        .collect();
    (values, filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f64_at(df: &DataFrame, col: &str, idx: usize) -> f64 {
        df.column(col)
            .unwrap()
            .get(idx)
            .unwrap()
            .try_extract::<f64>()
            .unwrap()
    }

    // ========================================================================
    // apply_median() tests
    // ========================================================================

    #[test]
    fn test_apply_median_basic() {
        let mut df = df![
            "values" => [Some(1.0), None, Some(3.0), None, Some(5.0)],
        ]
        .unwrap();

        let filled = StatisticalImputer::apply_median(&mut df, "values").unwrap();

        assert_eq!(filled, 2);
        assert_eq!(df.column("values").unwrap().null_count(), 0);
        // Median of [1, 3, 5] = 3
        assert_eq!(f64_at(&df, "values", 1), 3.0);
        assert_eq!(f64_at(&df, "values", 3), 3.0);
        assert_eq!(f64_at(&df, "values", 4), 5.0);
    }

    #[test]
    fn test_apply_median_integer_column_becomes_float() {
        let mut df = df![
            "count" => [Some(1i32), Some(2), None, Some(4)],
        ]
        .unwrap();

        StatisticalImputer::apply_median(&mut df, "count").unwrap();

        assert_eq!(df.column("count").unwrap().dtype(), &DataType::Float64);
        assert_eq!(f64_at(&df, "count", 2), 2.0);
    }

    #[test]
    fn test_apply_median_all_nulls_is_noop() {
        let mut df = df![
            "values" => [Option::<f64>::None, None, None],
        ]
        .unwrap();

        let filled = StatisticalImputer::apply_median(&mut df, "values").unwrap();

        assert_eq!(filled, 0);
        assert_eq!(df.column("values").unwrap().null_count(), 3);
    }

    #[test]
    fn test_apply_median_nonexistent_column_is_error() {
        let mut df = df!["other" => [1.0, 2.0]].unwrap();
        assert!(StatisticalImputer::apply_median(&mut df, "values").is_err());
    }

    // ========================================================================
    // apply_mode() / apply_unknown() tests
    // ========================================================================

    #[test]
    fn test_apply_mode_basic() {
        let mut df = df![
            "category" => [Some("A"), Some("B"), Some("A"), None, Some("A")],
        ]
        .unwrap();

        let filled = StatisticalImputer::apply_mode(&mut df, "category").unwrap();

        assert_eq!(filled, 1);
        let values = string_values(&df, "category").unwrap();
        assert_eq!(values[3].as_deref(), Some("A"));
    }

    #[test]
    fn test_apply_mode_tie_takes_first_seen() {
        let mut df = df![
            "category" => [Some("B"), Some("A"), None, Some("A"), Some("B")],
        ]
        .unwrap();

        StatisticalImputer::apply_mode(&mut df, "category").unwrap();

        let values = string_values(&df, "category").unwrap();
        assert_eq!(values[2].as_deref(), Some("B"));
    }

    #[test]
    fn test_apply_unknown() {
        let mut df = df![
            "city" => [Some("Paris"), None, None],
        ]
        .unwrap();

        let filled = StatisticalImputer::apply_unknown(&mut df, "city", "Unknown").unwrap();

        assert_eq!(filled, 2);
        let values = string_values(&df, "city").unwrap();
        assert_eq!(values[1].as_deref(), Some("Unknown"));
        assert_eq!(values[0].as_deref(), Some("Paris"));
    }

    #[test]
    fn test_apply_unknown_on_boolean_opens_domain() {
        let mut df = df![
            "active" => [Some(true), None, Some(false)],
        ]
        .unwrap();

        StatisticalImputer::apply_unknown(&mut df, "active", "Unknown").unwrap();

        let column = df.column("active").unwrap();
        assert_eq!(column.dtype(), &DataType::String);
        assert_eq!(column.null_count(), 0);
    }

    // ========================================================================
    // apply_flag_only() tests
    // ========================================================================

    #[test]
    fn test_apply_flag_only_adds_indicator() {
        let mut df = df![
            "when" => [Some(1.0), None, Some(3.0), None],
        ]
        .unwrap();

        let filled = StatisticalImputer::apply_flag_only(&mut df, "when", "when_missing").unwrap();

        assert_eq!(filled, 0);
        assert_eq!(df.column("when").unwrap().null_count(), 2);
        let indicator: Vec<Option<bool>> = df
            .column("when_missing")
            .unwrap()
            .bool()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(
            indicator,
            vec![Some(false), Some(true), Some(false), Some(true)]
        );
    }

    #[test]
    fn test_fill_numeric_counts() {
        let (values, filled) = fill_numeric(vec![None, Some(2.0), None], 1.5);
        assert_eq!(filled, 2);
        assert_eq!(values, vec![Some(1.5), Some(2.0), Some(1.5)]);
    }
}
