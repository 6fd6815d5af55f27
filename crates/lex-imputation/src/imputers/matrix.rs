//! Numeric design matrix shared by the joint imputers.

use crate::utils::{numeric_column_names, numeric_values};
use anyhow::{Result, anyhow};
use polars::prelude::*;

/// Row-major matrix of every numeric column of a table, nulls kept as `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix {
    columns: Vec<String>,
    rows: Vec<Vec<Option<f64>>>,
}

impl DesignMatrix {
    /// Build the matrix from all numeric columns of `df`.
    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        let columns = numeric_column_names(df);
        let n_rows = df.height();
        let mut rows = vec![vec![None; columns.len()]; n_rows];

        for (col_idx, name) in columns.iter().enumerate() {
            let values = numeric_values(df, name)?;
            for (row, value) in rows.iter_mut().zip(values) {
                // infinities take no part in distances or regressions
                row[col_idx] = value.filter(|v| v.is_finite());
            }
        }

        Ok(Self { columns, rows })
    }

    /// Build a matrix directly from column-major buffers.
    pub fn from_columns(columns: Vec<(String, Vec<Option<f64>>)>) -> Result<Self> {
        let n_rows = columns.first().map(|(_, v)| v.len()).unwrap_or(0);
        if columns.iter().any(|(_, v)| v.len() != n_rows) {
            return Err(anyhow!("All columns must have the same length"));
        }
        let mut rows = vec![vec![None; columns.len()]; n_rows];
        for (col_idx, (_, values)) in columns.iter().enumerate() {
            for (row, value) in rows.iter_mut().zip(values) {
                row[col_idx] = *value;
            }
        }
        Ok(Self {
            columns: columns.into_iter().map(|(name, _)| name).collect(),
            rows,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Option<f64>>] {
        &self.rows
    }

    pub(crate) fn rows_mut(&mut self) -> &mut [Vec<Option<f64>>] {
        &mut self.rows
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of one column, top to bottom.
    pub fn column(&self, idx: usize) -> Vec<Option<f64>> {
        self.rows.iter().map(|row| row[idx]).collect()
    }

    /// Indices of `names` in the matrix, failing on any unknown name.
    pub fn indices_of(&self, names: &[String]) -> Result<Vec<usize>> {
        names
            .iter()
            .map(|name| {
                self.column_index(name)
                    .ok_or_else(|| anyhow!("Column '{}' is not numeric", name))
            })
            .collect()
    }

    /// Number of missing cells in a column.
    pub fn missing_in(&self, idx: usize) -> usize {
        self.rows.iter().filter(|row| row[idx].is_none()).count()
    }
}
