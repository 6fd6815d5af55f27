//! Core data types for the imputation engine.
//!
//! The report types in this module form the JSON interchange format consumed
//! by downstream writers, so their field names are part of the public
//! contract.

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Column Profiling Types
// ============================================================================

/// Logical type of a column, derived from its declared dtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalType {
    Numeric,
    Categorical,
    Datetime,
}

impl LogicalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Categorical => "categorical",
            Self::Datetime => "datetime",
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Missingness profile of a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub logical_type: LogicalType,
    pub missing_count: usize,
    /// `missing_count / row_count`, 0 for an empty table.
    pub missing_ratio: f64,
}

impl ColumnProfile {
    pub fn has_missing(&self) -> bool {
        self.missing_count > 0
    }
}

// ============================================================================
// Decision Types
// ============================================================================

/// Imputation technique applied to a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputationMethod {
    Median,
    GroupMedian,
    Mode,
    GroupMode,
    Unknown,
    Knn,
    Mice,
    FlagOnly,
}

impl ImputationMethod {
    /// Wire name of the method, as it appears in the report.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Median => "median",
            Self::GroupMedian => "group_median",
            Self::Mode => "mode",
            Self::GroupMode => "group_mode",
            Self::Unknown => "unknown",
            Self::Knn => "knn",
            Self::Mice => "mice",
            Self::FlagOnly => "flag_only",
        }
    }

    /// Returns a human-readable name for the method.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Median => "Median Fill",
            Self::GroupMedian => "Group Median Fill",
            Self::Mode => "Mode Fill",
            Self::GroupMode => "Group Mode Fill",
            Self::Unknown => "Unknown Label",
            Self::Knn => "KNN Imputation",
            Self::Mice => "MICE Imputation",
            Self::FlagOnly => "Missing Indicator Only",
        }
    }

    /// Whether the method runs over the whole numeric design matrix.
    pub fn is_joint(&self) -> bool {
        matches!(self, Self::Knn | Self::Mice)
    }

    /// Whether the method fills values (everything except `flag_only`).
    pub fn fills_values(&self) -> bool {
        !matches!(self, Self::FlagOnly)
    }
}

impl fmt::Display for ImputationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provenance of the imputation applied to one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputationDecision {
    pub column: String,
    pub method: ImputationMethod,
    pub reason: String,
    pub missing_before: usize,
    pub missing_after: usize,
}

/// A decision computed without touching the table (dry runs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedDecision {
    pub column: String,
    pub logical_type: LogicalType,
    pub missing_count: usize,
    pub missing_ratio: f64,
    pub method: ImputationMethod,
    pub reason: String,
}

// ============================================================================
// Validation & Gate Types
// ============================================================================

/// Drift metrics of one imputed numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetric {
    /// Keyed by column in the report map, so not repeated in JSON.
    #[serde(skip_serializing, default)]
    pub column: String,
    pub psi: f64,
    pub ks_statistic: f64,
    pub passed: bool,
}

/// Advisory status produced by the quality gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GateStatus {
    Pass,
    Warn,
    Stop,
}

impl GateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Warn => "WARN",
            Self::Stop => "STOP",
        }
    }
}

impl fmt::Display for GateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Report Types
// ============================================================================

/// Report of one engine run.
///
/// Serialized as:
///
/// ```json
/// {
///   "decisions": [{"column": "age", "method": "median", "reason": "...",
///                  "missing_before": 5, "missing_after": 0}],
///   "validation": {"age": {"psi": 0.01, "ks_statistic": 0.02, "passed": true}},
///   "record_completeness": 0.98,
///   "status": "PASS",
///   "warnings": []
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputationReport {
    pub decisions: Vec<ImputationDecision>,
    pub validation: BTreeMap<String, ValidationMetric>,
    pub record_completeness: f64,
    pub status: GateStatus,
    pub warnings: Vec<String>,
}

impl ImputationReport {
    /// Serialize the report as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a report from its JSON form.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let mut report: ImputationReport = serde_json::from_str(json)?;
        for (column, metric) in report.validation.iter_mut() {
            metric.column = column.clone();
        }
        Ok(report)
    }

    /// Append a warning, skipping exact duplicates.
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        let warning = warning.into();
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }

    /// Decision recorded for `column`, if any.
    pub fn decision_for(&self, column: &str) -> Option<&ImputationDecision> {
        self.decisions.iter().find(|d| d.column == column)
    }

    /// Number of validated columns that did not pass.
    pub fn failed_validations(&self) -> usize {
        self.validation.values().filter(|m| !m.passed).count()
    }

    /// Total number of cells filled across all decisions.
    pub fn imputed_cells(&self) -> usize {
        self.decisions
            .iter()
            .map(|d| d.missing_before.saturating_sub(d.missing_after))
            .sum()
    }
}

/// Before/after statistics of a run, for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub rows: usize,
    pub columns_before: usize,
    pub columns_after: usize,
    pub completeness_before: f64,
    pub completeness_after: f64,
    pub imputed_cells: usize,
    pub duration_ms: u64,
}

/// Everything a run hands back to the caller.
#[derive(Debug, Clone)]
pub struct ImputationOutcome {
    /// The working table with all imputations and indicator columns applied.
    pub table: DataFrame,
    pub report: ImputationReport,
    pub summary: RunSummary,
}
