use super::{DesignMatrix, JointImputer};
use anyhow::{Result, bail};
use tracing::debug;

/// K-nearest-neighbour imputer over a standardized numeric design matrix.
pub struct KnnImputer {
    n_neighbors: usize,
}

impl KnnImputer {
    /// Create a new KNN imputer with specified number of neighbors
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors: n_neighbors.max(1), // Ensure at least 1 neighbor
        }
    }

    pub fn n_neighbors(&self) -> usize {
        self.n_neighbors
    }

    /// Z-score every column using its observed values. Constant columns keep
    /// a unit scale so they contribute zero distance.
    fn standardize(matrix: &DesignMatrix) -> Vec<Vec<Option<f64>>> {
        let n_cols = matrix.n_cols();
        let mut scales = Vec::with_capacity(n_cols);
        for col in 0..n_cols {
            let values = matrix.column(col);
            let (mean, std) = crate::utils::mean_std(&values).unwrap_or((0.0, 1.0));
            let std = if std > 0.0 && std.is_finite() { std } else { 1.0 };
            scales.push((mean, std));
        }

        matrix
            .rows()
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&scales)
                    .map(|(value, (mean, std))| value.map(|v| (v - mean) / std))
                    .collect()
            })
            .collect()
    }

    /// Impute a single missing value from its nearest donors.
    fn impute_value(
        &self,
        scaled: &[Vec<Option<f64>>],
        raw: &[Vec<Option<f64>>],
        target_row: usize,
        target_col: usize,
        donors: &[usize],
        fallback: f64,
    ) -> f64 {
        let n_features = scaled[target_row].len().saturating_sub(1);

        let mut distances: Vec<(f64, usize)> = donors
            .iter()
            .filter_map(|&donor| {
                calculate_distance(&scaled[target_row], &scaled[donor], target_col, n_features)
                    .map(|d| (d, donor))
            })
            .collect();

        if distances.is_empty() {
            return fallback;
        }

        let k = self.n_neighbors.min(distances.len());
        let by_distance =
            |a: &(f64, usize), b: &(f64, usize)| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1));
        if k < distances.len() {
            distances.select_nth_unstable_by(k - 1, by_distance);
            distances.truncate(k);
        }

        let sum: f64 = distances
            .iter()
            .filter_map(|&(_, donor)| raw[donor][target_col])
            .sum();
        sum / k as f64
    }
}

impl JointImputer for KnnImputer {
    fn name(&self) -> &'static str {
        "knn"
    }

    fn impute(&self, matrix: &DesignMatrix, targets: &[String]) -> Result<DesignMatrix> {
        let target_indices = matrix.indices_of(targets)?;
        let scaled = Self::standardize(matrix);
        let raw = matrix.rows().to_vec();
        let mut result = matrix.clone();

        for (&col, name) in target_indices.iter().zip(targets) {
            let donors: Vec<usize> = (0..matrix.n_rows())
                .filter(|&row| raw[row][col].is_some())
                .collect();
            if donors.is_empty() {
                bail!("column '{}' has no observed values to learn from", name);
            }
            let fallback =
                donors.iter().filter_map(|&row| raw[row][col]).sum::<f64>() / donors.len() as f64;

            let mut filled = 0;
            for row in 0..matrix.n_rows() {
                if raw[row][col].is_some() {
                    continue;
                }
                let value = self.impute_value(&scaled, &raw, row, col, &donors, fallback);
                if !value.is_finite() {
                    bail!("non-finite neighbour average for column '{}'", name);
                }
                result.rows_mut()[row][col] = Some(value);
                filled += 1;
            }
            debug!("KNN filled {} values in '{}'", filled, name);
        }

        Ok(result)
    }
}

/// Euclidean distance over coordinates present in both rows, skipping the
/// target column, rescaled by the share of coordinates used. `None` when the
/// rows share no coordinate.
fn calculate_distance(
    row1: &[Option<f64>],
    row2: &[Option<f64>],
    skip_col: usize,
    n_features: usize,
) -> Option<f64> {
    let mut sum_squared_diff = 0.0;
    let mut count = 0usize;

    for (col, (a, b)) in row1.iter().zip(row2).enumerate() {
        if col == skip_col {
            continue;
        }
        if let (Some(a), Some(b)) = (a, b) {
            sum_squared_diff += (a - b).powi(2);
            count += 1;
        }
    }

    if count == 0 {
        return None;
    }
    Some((sum_squared_diff * n_features as f64 / count as f64).sqrt())
}
