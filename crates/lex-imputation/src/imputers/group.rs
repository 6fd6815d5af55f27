//! Group-wise imputation keyed by a categorical column.

use super::statistical::fill_numeric;
use crate::config::GroupFallbackSource;
use crate::utils::{
    median, median_of, mode, mode_of, numeric_values, string_values, write_labels, write_numeric,
};
use anyhow::Result;
use polars::prelude::*;
use std::collections::HashMap;
use tracing::debug;

/// Fills each missing value with a statistic of its group, then falls back
/// to the column-wide statistic for rows whose group has nothing to offer
/// (all-null group or null key).
pub struct GroupImputer {
    group_column: String,
    fallback_source: GroupFallbackSource,
}

impl GroupImputer {
    pub fn new(group_column: impl Into<String>, fallback_source: GroupFallbackSource) -> Self {
        Self {
            group_column: group_column.into(),
            fallback_source,
        }
    }

    pub fn group_column(&self) -> &str {
        &self.group_column
    }

    /// Per-group median fill for a numeric column.
    pub fn apply_group_median(&self, df: &mut DataFrame, col_name: &str) -> Result<usize> {
        let keys = string_values(df, &self.group_column)?;
        let original: Vec<Option<f64>> = numeric_values(df, col_name)?
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect();

        let mut groups: HashMap<&str, Vec<f64>> = HashMap::new();
        for (key, value) in keys.iter().zip(&original) {
            if let (Some(key), Some(value)) = (key, value) {
                groups.entry(key.as_str()).or_default().push(*value);
            }
        }
        let medians: HashMap<&str, f64> = groups
            .into_iter()
            .filter_map(|(key, values)| median(&values).map(|m| (key, m)))
            .collect();

        let mut filled = 0;
        let mut values = original.clone();
        for (value, key) in values.iter_mut().zip(&keys) {
            if value.is_none()
                && let Some(m) = key.as_deref().and_then(|k| medians.get(k))
            {
                *value = Some(*m);
                filled += 1;
            }
        }
        debug!(
            "Group median filled {} values in '{}' across {} groups",
            filled,
            col_name,
            medians.len()
        );

        let fallback = match self.fallback_source {
            GroupFallbackSource::Working => median_of(&values),
            GroupFallbackSource::Original => median_of(&original),
        };
        if let Some(fallback) = fallback {
            let (with_fallback, count) = fill_numeric(values, fallback);
            values = with_fallback;
            filled += count;
            if count > 0 {
                debug!(
                    "Global median {:.4} filled {} remaining values in '{}'",
                    fallback, count, col_name
                );
            }
        }

        write_numeric(df, col_name, values)?;
        Ok(filled)
    }

    /// Per-group mode fill for a categorical column.
    pub fn apply_group_mode(&self, df: &mut DataFrame, col_name: &str) -> Result<usize> {
        let keys = string_values(df, &self.group_column)?;
        let original = string_values(df, col_name)?;
        let dtype = df.column(col_name)?.dtype().clone();

        let mut groups: HashMap<&str, Vec<&str>> = HashMap::new();
        for (key, value) in keys.iter().zip(&original) {
            if let (Some(key), Some(value)) = (key, value) {
                groups.entry(key.as_str()).or_default().push(value.as_str());
            }
        }
        let modes: HashMap<&str, String> = groups
            .into_iter()
            .filter_map(|(key, values)| mode(values).map(|m| (key, m)))
            .collect();

        let mut filled = 0;
        let mut values = original.clone();
        for (value, key) in values.iter_mut().zip(&keys) {
            if value.is_none()
                && let Some(m) = key.as_deref().and_then(|k| modes.get(k))
            {
                *value = Some(m.clone());
                filled += 1;
            }
        }
        debug!(
            "Group mode filled {} values in '{}' across {} groups",
            filled,
            col_name,
            modes.len()
        );

        let fallback = match self.fallback_source {
            GroupFallbackSource::Working => mode_of(&values),
            GroupFallbackSource::Original => mode_of(&original),
        };
        if let Some(fallback) = fallback {
            for value in values.iter_mut().filter(|v| v.is_none()) {
                *value = Some(fallback.clone());
                filled += 1;
            }
        }

        write_labels(df, col_name, values, &dtype)?;
        Ok(filled)
    }
}
