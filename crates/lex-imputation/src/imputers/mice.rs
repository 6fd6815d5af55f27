//! Multivariate imputation by chained equations.
//!
//! Each incomplete numeric column is regressed on every other numeric column
//! with a ridge-regularized least-squares fit, and the predictions replace
//! its originally-missing cells. Rounds repeat until the imputations settle
//! or the iteration budget runs out.

use super::{DesignMatrix, JointImputer};
use anyhow::{Result, bail};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::debug;

/// Chained-equation imputer.
pub struct MiceImputer {
    max_iter: usize,
    tolerance: f64,
    ridge_alpha: f64,
    seed: u64,
}

impl MiceImputer {
    pub fn new(max_iter: usize, tolerance: f64, ridge_alpha: f64, seed: u64) -> Self {
        Self {
            max_iter: max_iter.max(1),
            tolerance,
            ridge_alpha,
            seed,
        }
    }

    /// Fit `y ~ X` on the given rows and return `(intercept, coefficients)`.
    fn fit_linear(
        &self,
        data: &[Vec<f64>],
        target: usize,
        predictors: &[usize],
        rows: &[usize],
    ) -> Result<(f64, Vec<f64>)> {
        let n = rows.len() as f64;
        let p = predictors.len();

        let y_mean = rows.iter().map(|&r| data[r][target]).sum::<f64>() / n;
        let x_means: Vec<f64> = predictors
            .iter()
            .map(|&c| rows.iter().map(|&r| data[r][c]).sum::<f64>() / n)
            .collect();

        // centered normal equations: (X'X + alpha I) beta = X'y
        let mut xtx = vec![vec![0.0; p]; p];
        let mut xty = vec![0.0; p];
        for &r in rows {
            let y = data[r][target] - y_mean;
            for i in 0..p {
                let xi = data[r][predictors[i]] - x_means[i];
                xty[i] += xi * y;
                for j in i..p {
                    xtx[i][j] += xi * (data[r][predictors[j]] - x_means[j]);
                }
            }
        }
        for i in 0..p {
            for j in 0..i {
                xtx[i][j] = xtx[j][i];
            }
            xtx[i][i] += self.ridge_alpha;
        }

        let beta = solve_linear_system(xtx, xty)?;
        let intercept = y_mean
            - beta
                .iter()
                .zip(&x_means)
                .map(|(b, m)| b * m)
                .sum::<f64>();
        Ok((intercept, beta))
    }
}

impl JointImputer for MiceImputer {
    fn name(&self) -> &'static str {
        "mice"
    }

    fn impute(&self, matrix: &DesignMatrix, targets: &[String]) -> Result<DesignMatrix> {
        let target_indices = matrix.indices_of(targets)?;
        let n_rows = matrix.n_rows();
        let n_cols = matrix.n_cols();

        let missing: Vec<Vec<bool>> = matrix
            .rows()
            .iter()
            .map(|row| row.iter().map(Option::is_none).collect())
            .collect();

        // initial fill with observed means; columns with nothing observed
        // take no part in the regressions
        let mut data = vec![vec![0.0; n_cols]; n_rows];
        let mut usable = Vec::with_capacity(n_cols);
        let mut incomplete = Vec::new();
        let mut scale = 0.0f64;
        for col in 0..n_cols {
            let observed: Vec<f64> = matrix.rows().iter().filter_map(|row| row[col]).collect();
            if observed.is_empty() {
                if target_indices.contains(&col) {
                    bail!("column '{}' has no observed values", matrix.columns()[col]);
                }
                debug!("Leaving out '{}': no observed values", matrix.columns()[col]);
                continue;
            }
            usable.push(col);
            let mean = observed.iter().sum::<f64>() / observed.len() as f64;
            scale = observed.iter().fold(scale, |acc, v| acc.max(v.abs()));
            for (row, cells) in data.iter_mut().enumerate() {
                cells[col] = matrix.rows()[row][col].unwrap_or(mean);
            }
            if observed.len() < n_rows {
                incomplete.push(col);
            }
        }

        if incomplete.is_empty() {
            return Ok(matrix.clone());
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut order = incomplete.clone();

        for iteration in 0..self.max_iter {
            order.shuffle(&mut rng);
            let mut max_change = 0.0f64;

            for &col in &order {
                let predictors: Vec<usize> =
                    usable.iter().copied().filter(|&c| c != col).collect();
                let (train, predict): (Vec<usize>, Vec<usize>) =
                    (0..n_rows).partition(|&r| !missing[r][col]);

                let (intercept, beta) = self.fit_linear(&data, col, &predictors, &train)?;

                for &row in &predict {
                    let value = intercept
                        + predictors
                            .iter()
                            .zip(&beta)
                            .map(|(&c, b)| data[row][c] * b)
                            .sum::<f64>();
                    if !value.is_finite() {
                        bail!(
                            "non-finite prediction for column '{}' in round {}",
                            matrix.columns()[col],
                            iteration + 1
                        );
                    }
                    max_change = max_change.max((value - data[row][col]).abs());
                    data[row][col] = value;
                }
            }

            debug!(
                "MICE round {}: max change {:.6}",
                iteration + 1,
                max_change
            );
            if max_change <= self.tolerance * scale {
                debug!("MICE converged after {} rounds", iteration + 1);
                break;
            }
        }

        let mut result = matrix.clone();
        for (row, cells) in result.rows_mut().iter_mut().enumerate() {
            for (col, cell) in cells.iter_mut().enumerate() {
                if missing[row][col] && usable.contains(&col) {
                    *cell = Some(data[row][col]);
                }
            }
        }
        Ok(result)
    }
}

/// Solve `a x = b` by Gaussian elimination with partial pivoting.
pub(crate) fn solve_linear_system(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot_row][col].abs() < 1e-12 {
            bail!("singular matrix in regression fit");
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }

    if x.iter().any(|v| !v.is_finite()) {
        bail!("non-finite regression coefficients");
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(columns: Vec<(&str, Vec<Option<f64>>)>) -> DesignMatrix {
        DesignMatrix::from_columns(
            columns
                .into_iter()
                .map(|(name, values)| (name.to_string(), values))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_solve_linear_system() {
        let a = vec![vec![2.0, 1.0], vec![1.0, 3.0]];
        let b = vec![3.0, 5.0];
        let x = solve_linear_system(a, b).unwrap();
        assert!((x[0] - 0.8).abs() < 1e-12);
        assert!((x[1] - 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_solve_singular_system_fails() {
        let a = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        assert!(solve_linear_system(a, vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn test_mice_recovers_linear_relationship() {
        let x: Vec<Option<f64>> = (0..40).map(|i| Some(i as f64)).collect();
        let y: Vec<Option<f64>> = (0..40)
            .map(|i| if i % 7 == 3 { None } else { Some(3.0 * i as f64 + 2.0) })
            .collect();
        let m = matrix(vec![("x", x), ("y", y)]);

        let imputed = MiceImputer::new(10, 1e-3, 1e-6, 42)
            .impute(&m, &["y".to_string()])
            .unwrap();

        for (i, value) in imputed.column(1).iter().enumerate() {
            let expected = 3.0 * i as f64 + 2.0;
            assert!((value.unwrap() - expected).abs() < 1e-3, "row {}", i);
        }
    }

    #[test]
    fn test_mice_is_reproducible_for_a_seed() {
        let a: Vec<Option<f64>> = (0..30)
            .map(|i| if i % 5 == 0 { None } else { Some((i * 7 % 13) as f64) })
            .collect();
        let b: Vec<Option<f64>> = (0..30)
            .map(|i| if i % 4 == 1 { None } else { Some((i * 3 % 11) as f64 + 0.5) })
            .collect();
        let c: Vec<Option<f64>> = (0..30).map(|i| Some(i as f64 * 0.25)).collect();
        let m = matrix(vec![("a", a), ("b", b), ("c", c)]);
        let targets = ["a".to_string(), "b".to_string()];

        let first = MiceImputer::new(10, 1e-3, 1e-6, 7).impute(&m, &targets).unwrap();
        let second = MiceImputer::new(10, 1e-3, 1e-6, 7).impute(&m, &targets).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.missing_in(0), 0);
        assert_eq!(first.missing_in(1), 0);
    }

    #[test]
    fn test_mice_keeps_observed_values() {
        let m = matrix(vec![
            ("x", vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)]),
            ("y", vec![Some(2.0), None, Some(6.0), Some(8.0)]),
        ]);
        let imputed = MiceImputer::new(10, 1e-3, 1e-6, 42)
            .impute(&m, &["y".to_string()])
            .unwrap();

        let y = imputed.column(1);
        assert_eq!(y[0], Some(2.0));
        assert_eq!(y[2], Some(6.0));
        assert_eq!(y[3], Some(8.0));
        assert!((y[1].unwrap() - 4.0).abs() < 1e-3);
    }

    #[test]
    fn test_mice_fails_on_fully_missing_column() {
        let m = matrix(vec![
            ("x", vec![Some(1.0), Some(2.0)]),
            ("y", vec![None, None]),
        ]);
        assert!(
            MiceImputer::new(10, 1e-3, 1e-6, 42)
                .impute(&m, &["y".to_string()])
                .is_err()
        );
    }

    #[test]
    fn test_mice_ignores_empty_predictor() {
        let x: Vec<Option<f64>> = (0..20).map(|i| Some(i as f64)).collect();
        let y: Vec<Option<f64>> = (0..20)
            .map(|i| if i % 6 == 2 { None } else { Some(2.0 * i as f64) })
            .collect();
        let m = matrix(vec![("x", x), ("empty", vec![None; 20]), ("y", y)]);

        let imputed = MiceImputer::new(10, 1e-3, 1e-6, 42)
            .impute(&m, &["y".to_string()])
            .unwrap();

        assert_eq!(imputed.missing_in(2), 0);
        assert!((imputed.column(2)[2].unwrap() - 4.0).abs() < 1e-3);
        assert_eq!(imputed.missing_in(1), 20);
    }

    #[test]
    fn test_mice_without_ridge_on_collinear_predictors_fails() {
        let x: Vec<Option<f64>> = (0..10).map(|i| Some(i as f64)).collect();
        let x2 = x.clone();
        let y: Vec<Option<f64>> = (0..10)
            .map(|i| if i == 4 { None } else { Some(i as f64) })
            .collect();
        let m = matrix(vec![("x", x), ("x2", x2), ("y", y)]);

        let result = MiceImputer::new(10, 1e-3, 0.0, 42).impute(&m, &["y".to_string()]);
        assert!(result.is_err());
    }
}
