//! Imputation module for filling missing values.
//!
//! This module provides:
//! - Column-local fills: median, mode, constant label, indicator flag
//!   ([`StatisticalImputer`])
//! - Group-wise fills keyed by a categorical column ([`GroupImputer`])
//! - Joint fills over the numeric design matrix: KNN ([`KnnImputer`]) and
//!   chained equations ([`MiceImputer`])

mod group;
mod knn;
mod matrix;
mod mice;
mod statistical;

pub use group::GroupImputer;
pub use knn::KnnImputer;
pub use matrix::DesignMatrix;
pub use mice::MiceImputer;
pub use statistical::StatisticalImputer;

use anyhow::Result;

/// An imputer that fills several numeric columns at once from the full
/// numeric design matrix.
///
/// `impute` returns a copy of `matrix` in which only the missing cells of
/// `targets` are filled. Numerical failure is reported as `Err` and left to
/// the caller to absorb.
pub trait JointImputer: Send + Sync {
    fn name(&self) -> &'static str;

    fn impute(&self, matrix: &DesignMatrix, targets: &[String]) -> Result<DesignMatrix>;
}
