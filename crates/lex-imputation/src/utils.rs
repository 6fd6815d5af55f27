//! Shared utilities for the imputation engine.
//!
//! Column access helpers that move data between Polars columns and plain
//! buffers, plus the small statistics every imputer needs.

use crate::types::LogicalType;
use anyhow::{Context, Result};
use polars::prelude::*;
use std::collections::HashMap;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType is a date/time type.
#[inline]
pub fn is_datetime_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Date | DataType::Datetime(_, _) | DataType::Time | DataType::Duration(_)
    )
}

/// Logical type of a declared dtype. Anything that is neither numeric nor
/// temporal is handled as a categorical label column.
pub fn logical_type(dtype: &DataType) -> LogicalType {
    if is_numeric_dtype(dtype) {
        LogicalType::Numeric
    } else if is_datetime_dtype(dtype) {
        LogicalType::Datetime
    } else {
        LogicalType::Categorical
    }
}

/// Names of all numeric columns, in table order.
pub fn numeric_column_names(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|col| is_numeric_dtype(col.dtype()))
        .map(|col| col.name().to_string())
        .collect()
}

// =============================================================================
// Column Buffers
// =============================================================================

/// Read a column as `f64` values. Nulls and NaN both come back as `None`.
pub fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = df
        .column(name)
        .with_context(|| format!("Column '{}' not found", name))?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    Ok(series
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

/// Read a column as string labels, nulls preserved.
pub fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let series = df
        .column(name)
        .with_context(|| format!("Column '{}' not found", name))?
        .as_materialized_series()
        .cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Number of missing cells in a column: nulls, plus NaN in float columns.
pub fn missing_in_column(column: &Column) -> usize {
    column.null_count() + nan_count(column)
}

fn nan_count(column: &Column) -> usize {
    if !matches!(column.dtype(), DataType::Float32 | DataType::Float64) {
        return 0;
    }
    column
        .as_materialized_series()
        .cast(&DataType::Float64)
        .ok()
        .and_then(|s| {
            s.f64()
                .ok()
                .map(|ca| ca.into_iter().filter(|v| v.is_some_and(f64::is_nan)).count())
        })
        .unwrap_or(0)
}

/// Turn NaN into null in every float column, keeping its dtype. Returns the
/// number of cells changed.
pub fn nan_to_null(df: &mut DataFrame) -> Result<usize> {
    let targets: Vec<(String, DataType)> = df
        .get_columns()
        .iter()
        .filter(|col| nan_count(col) > 0)
        .map(|col| (col.name().to_string(), col.dtype().clone()))
        .collect();

    let mut changed = 0;
    for (name, dtype) in targets {
        let column = df.column(&name)?;
        changed += nan_count(column);
        let series = match dtype {
            DataType::Float32 => {
                let values: Vec<Option<f32>> = column
                    .as_materialized_series()
                    .f32()?
                    .into_iter()
                    .map(|v| v.filter(|x| !x.is_nan()))
                    .collect();
                Series::new(name.as_str().into(), values)
            }
            _ => Series::new(name.as_str().into(), numeric_values(df, &name)?),
        };
        df.replace(&name, series)?;
    }
    Ok(changed)
}

/// Null mask of a column (`true` where the value is missing).
pub fn null_mask(df: &DataFrame, name: &str) -> Result<Vec<bool>> {
    let column = df
        .column(name)
        .with_context(|| format!("Column '{}' not found", name))?;
    Ok(column
        .as_materialized_series()
        .is_null()
        .into_iter()
        .map(|v| v.unwrap_or(false))
        .collect())
}

/// Replace a numeric column with filled values, stored as `Float64`.
pub fn write_numeric(df: &mut DataFrame, name: &str, values: Vec<Option<f64>>) -> Result<()> {
    let series = Series::new(name.into(), values);
    df.replace(name, series)?;
    Ok(())
}

/// Replace a label column with filled values.
///
/// The column is written as `String` and strictly cast back to its original
/// dtype. When the original dtype cannot hold the new labels (an `Enum`
/// without them, `Boolean` receiving a new label) it stays `String`.
pub fn write_labels(
    df: &mut DataFrame,
    name: &str,
    values: Vec<Option<String>>,
    original: &DataType,
) -> Result<()> {
    let series = Series::new(name.into(), values);
    let series = if matches!(original, DataType::String) {
        series
    } else {
        match series.strict_cast(original) {
            Ok(cast) => cast,
            Err(e) => {
                tracing::debug!(
                    "Keeping '{}' as String, cannot cast back to {:?}: {}",
                    name,
                    original,
                    e
                );
                series
            }
        }
    };
    df.replace(name, series)?;
    Ok(())
}

// =============================================================================
// Statistics Utilities
// =============================================================================

/// Median of the given values, `None` when empty.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Median of the non-null entries of a buffer.
pub fn median_of(values: &[Option<f64>]) -> Option<f64> {
    let observed: Vec<f64> = values.iter().flatten().copied().collect();
    median(&observed)
}

/// Most frequent label; ties go to the label seen first.
pub fn mode<'a, I>(values: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (position, value) in values.into_iter().enumerate() {
        counts.entry(value).or_insert((0, position)).0 += 1;
    }

    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(value, _)| value.to_string())
}

/// Mode of the non-null entries of a label buffer.
pub fn mode_of(values: &[Option<String>]) -> Option<String> {
    mode(values.iter().flatten().map(String::as_str))
}

/// Mean and sample standard deviation of the observed values.
pub fn mean_std(values: &[Option<f64>]) -> Option<(f64, f64)> {
    let observed: Vec<f64> = values.iter().flatten().copied().collect();
    if observed.is_empty() {
        return None;
    }
    let n = observed.len() as f64;
    let mean = observed.iter().sum::<f64>() / n;
    if observed.len() < 2 {
        return Some((mean, 0.0));
    }
    let variance = observed.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some((mean, variance.sqrt()))
}

// =============================================================================
// Table Metrics
// =============================================================================

/// Total number of missing cells in the table.
pub fn missing_cells(df: &DataFrame) -> usize {
    df.get_columns().iter().map(missing_in_column).sum()
}

/// Share of present cells. A table without cells is complete.
pub fn record_completeness(df: &DataFrame) -> f64 {
    let total_cells = df.height() * df.width();
    if total_cells == 0 {
        return 1.0;
    }
    1.0 - missing_cells(df) as f64 / total_cells as f64
}
