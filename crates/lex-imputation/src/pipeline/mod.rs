//! Pipeline module.
//!
//! This module provides the imputation engine and its progress reporting.

mod builder;
mod executor;
pub mod progress;

pub use builder::{ImputationEngine, ImputationEngineBuilder};
pub use executor::{ExecutionResult, ImputationExecutor};
pub use progress::{ClosureProgressReporter, ImputationStage, ProgressReporter, ProgressUpdate};
