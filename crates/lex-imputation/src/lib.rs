//! Missing Value Imputation Library
//!
//! A rule-based imputation engine for typed tabular data built with Rust and
//! Polars.
//!
//! # Overview
//!
//! For every column with missing values the engine:
//!
//! - **Decides** which technique to apply from the missing ratio, the column
//!   type, an optional group column, cross-feature correlation and the
//!   dataset size
//! - **Imputes** with median/mode fills, per-group fills, an `Unknown` label,
//!   KNN or MICE over the numeric columns, or a missing indicator for
//!   datetime columns
//! - **Validates** each filled numeric column against its original
//!   distribution with PSI and the KS statistic
//!
//! The results are aggregated into a PASS/WARN/STOP quality gate with
//! per-column provenance.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lex_imputation::{ImputationConfig, ImputationEngine};
//! use polars::prelude::*;
//!
//! let df = CsvReadOptions::default()
//!     .try_into_reader_with_file_path(Some("sales.csv".into()))?
//!     .finish()?;
//!
//! let outcome = ImputationEngine::builder()
//!     .config(ImputationConfig::builder().group_column("region").build()?)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run(df)?;
//!
//! println!("{}", outcome.report.to_json_pretty()?);
//! ```
//!
//! # Decision Policy
//!
//! The default [`RuleBasedSelector`] can be replaced by any
//! [`MethodSelector`] implementation through
//! [`ImputationEngineBuilder::selector`]. All thresholds the default policy,
//! the validator and the gate use are fields of [`ImputationConfig`].

pub mod config;
pub mod decisions;
pub mod error;
pub mod imputers;
pub mod pipeline;
pub mod profiler;
pub mod quality;
pub mod reporting;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use config::{
    ConfigValidationError, GroupFallbackSource, ImputationConfig, ImputationConfigBuilder,
    JointPassMode,
};
pub use decisions::{MethodChoice, MethodSelector, RuleBasedSelector, SelectionContext};
pub use error::{ImputationError, Result as ImputationResult, ResultExt};
pub use imputers::{
    DesignMatrix, GroupImputer, JointImputer, KnnImputer, MiceImputer, StatisticalImputer,
};
pub use pipeline::{
    ClosureProgressReporter, ImputationEngine, ImputationEngineBuilder, ImputationStage,
    ProgressReporter, ProgressUpdate,
};
pub use profiler::{CorrelationMatrix, CorrelationScout, MissingnessAnalyzer};
pub use quality::{DistributionValidator, Gatekeeper};
pub use reporting::{ReportGenerator, RunReport};
pub use types::{
    ColumnProfile, GateStatus, ImputationDecision, ImputationMethod, ImputationOutcome,
    ImputationReport, LogicalType, PlannedDecision, RunSummary, ValidationMetric,
};
pub use utils::{missing_cells, record_completeness};
