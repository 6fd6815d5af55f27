//! Pearson correlation between numeric columns.
//!
//! Used only to gate MICE: a column qualifies when enough numeric peers
//! correlate with it. Degenerate inputs never fail, they simply do not count.

use crate::utils::{numeric_column_names, numeric_values};
use anyhow::Result;
use polars::prelude::*;
use tracing::debug;

/// Pairwise correlation matrix over the numeric columns of a table.
///
/// Entries are `None` where the coefficient is undefined (constant column,
/// fewer than two complete pairs).
#[derive(Debug, Clone)]
pub struct CorrelationMatrix {
    names: Vec<String>,
    values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    /// Compute the matrix for every numeric column of `df`.
    pub fn compute(df: &DataFrame) -> Result<Self> {
        let names = numeric_column_names(df);
        let columns = names
            .iter()
            .map(|name| numeric_values(df, name))
            .collect::<Result<Vec<_>>>()?;

        let n = names.len();
        let mut values = vec![vec![None; n]; n];
        for i in 0..n {
            values[i][i] = Some(1.0);
            for j in (i + 1)..n {
                let r = pearson(&columns[i], &columns[j]);
                values[i][j] = r;
                values[j][i] = r;
            }
        }

        debug!("Computed {}x{} correlation matrix", n, n);
        Ok(Self { names, values })
    }

    /// Numeric column names covered by the matrix.
    pub fn columns(&self) -> &[String] {
        &self.names
    }

    /// Correlation between two columns, if defined.
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.names.iter().position(|n| n == a)?;
        let j = self.names.iter().position(|n| n == b)?;
        self.values[i][j]
    }

    /// Count peers of `target` whose absolute correlation reaches `threshold`.
    pub fn count_peers(&self, target: &str, threshold: f64) -> usize {
        if self.names.len() < 2 {
            return 0;
        }
        let Some(i) = self.names.iter().position(|n| n == target) else {
            return 0;
        };
        self.values[i]
            .iter()
            .enumerate()
            .filter(|(j, r)| *j != i && r.is_some_and(|r| r.abs() >= threshold))
            .count()
    }
}

/// Counts numeric peers correlated with a target column.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationScout {
    threshold: f64,
}

impl Default for CorrelationScout {
    fn default() -> Self {
        Self::new(0.4)
    }
}

impl CorrelationScout {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Number of numeric peers with `|r| >= threshold` against `target`.
    ///
    /// Returns 0 when the target is not numeric, when fewer than two numeric
    /// columns exist, or when the matrix cannot be computed.
    pub fn count_correlated_peers(&self, df: &DataFrame, target: &str) -> usize {
        match CorrelationMatrix::compute(df) {
            Ok(matrix) => self.count_in(&matrix, target),
            Err(e) => {
                debug!("Correlation scan failed for '{}': {}", target, e);
                0
            }
        }
    }

    /// Same as [`count_correlated_peers`](Self::count_correlated_peers) over a
    /// precomputed matrix.
    pub fn count_in(&self, matrix: &CorrelationMatrix, target: &str) -> usize {
        matrix.count_peers(target, self.threshold)
    }
}

/// Pearson correlation over rows where both values are present.
pub(crate) fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y.iter())
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .collect();

    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(a, _)| a).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, b)| b).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in &pairs {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }

    let r = cov / (var_x.sqrt() * var_y.sqrt());
    r.is_finite().then_some(r.clamp(-1.0, 1.0))
}
