//! Imputation engine and its builder.
//!
//! The engine orchestrates one run: analyze, decide and impute column by
//! column, validate the filled distributions, then evaluate the quality gate.

use crate::config::{ConfigValidationError, ImputationConfig};
use crate::decisions::{MethodSelector, RuleBasedSelector};
use crate::error::{ImputationError, Result};
use crate::pipeline::executor::ImputationExecutor;
use crate::pipeline::progress::{
    ClosureProgressReporter, ImputationStage, ProgressReporter, ProgressUpdate,
};
use crate::profiler::MissingnessAnalyzer;
use crate::quality::{DistributionValidator, Gatekeeper};
use crate::types::{GateStatus, ImputationOutcome, ImputationReport, PlannedDecision, RunSummary};
use crate::utils::{nan_to_null, record_completeness};
use polars::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// The imputation engine.
///
/// Use [`ImputationEngine::builder()`] to create an engine with a custom
/// configuration, selector or progress reporter.
///
/// # Example
///
/// ```rust,ignore
/// use lex_imputation::{ImputationConfig, ImputationEngine};
///
/// let outcome = ImputationEngine::builder()
///     .config(ImputationConfig::builder().group_column("region").build()?)
///     .on_progress(|update| {
///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
///     })
///     .build()?
///     .run(df)?;
///
/// println!("Gate status: {}", outcome.report.status);
/// ```
pub struct ImputationEngine {
    config: ImputationConfig,
    selector: Arc<dyn MethodSelector>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

// Runs may be moved onto a worker thread
static_assertions::assert_impl_all!(ImputationEngine: Send);

impl ImputationEngine {
    /// Create a new engine builder.
    pub fn builder() -> ImputationEngineBuilder {
        ImputationEngineBuilder::default()
    }

    pub fn config(&self) -> &ImputationConfig {
        &self.config
    }

    /// Impute every column of `df` that has missing values.
    ///
    /// The returned outcome carries the working table, the report and a
    /// before/after summary. A `STOP` gate status is part of the report, not
    /// an error.
    ///
    /// # Errors
    ///
    /// Returns an error if a column cannot be read or written, or disappears
    /// while the run is in progress.
    pub fn run(&self, df: DataFrame) -> Result<ImputationOutcome> {
        match self.run_internal(df) {
            Ok(outcome) => {
                self.report_progress(ProgressUpdate::complete(format!(
                    "Imputation completed with status {}",
                    outcome.report.status
                )));
                Ok(outcome)
            }
            Err(e) => {
                self.report_progress(ProgressUpdate::failed(e.to_string()));
                error!("Imputation error: {}", e);
                Err(e)
            }
        }
    }

    /// Decisions the engine would make for `df`, without imputing anything.
    ///
    /// Each column is decided against the unmodified table, so methods that
    /// depend on earlier fills may differ from a real run.
    pub fn plan(&self, df: &DataFrame) -> Vec<PlannedDecision> {
        let executor = ImputationExecutor::new(&self.config, self.selector.as_ref());
        let mut correlations = None;

        MissingnessAnalyzer::analyze(df)
            .into_iter()
            .filter(|profile| profile.has_missing() && !executor.already_flagged(df, profile))
            .map(|profile| {
                let has_group = executor.has_group_column(df, &profile.name);
                let choice = executor.decide(df, &profile, has_group, &mut correlations);
                PlannedDecision {
                    column: profile.name,
                    logical_type: profile.logical_type,
                    missing_count: profile.missing_count,
                    missing_ratio: profile.missing_ratio,
                    method: choice.method,
                    reason: choice.reason,
                }
            })
            .collect()
    }

    /// Report progress if a reporter is configured.
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn run_internal(&self, df: DataFrame) -> Result<ImputationOutcome> {
        let start_time = Instant::now();

        info!(
            "Starting imputation run on {} rows x {} columns...",
            df.height(),
            df.width()
        );
        self.report_progress(ProgressUpdate::new(
            ImputationStage::Initializing,
            0.0,
            "Starting imputation run...",
        ));

        let mut working = df;
        let nan_cells = nan_to_null(&mut working)
            .map_err(|e| ImputationError::Internal(format!("Normalizing NaN values: {:#}", e)))?;
        if nan_cells > 0 {
            debug!("Treating {} NaN cells as missing", nan_cells);
        }
        let original = working.clone();
        let completeness_before = record_completeness(&original);

        // Step 1: Missingness profiles
        self.report_progress(ProgressUpdate::new(
            ImputationStage::Analyzing,
            0.0,
            "Analyzing missingness...",
        ));
        info!("Step 1: Analyzing missingness...");

        let profiles = MissingnessAnalyzer::analyze(&working);
        let incomplete = profiles.iter().filter(|p| p.has_missing()).count();
        for profile in profiles.iter().filter(|p| p.has_missing()) {
            debug!(
                "  {}: {} missing ({:.1}%, {})",
                profile.name,
                profile.missing_count,
                profile.missing_ratio * 100.0,
                profile.logical_type
            );
        }

        self.report_progress(ProgressUpdate::new(
            ImputationStage::Analyzing,
            1.0,
            format!("Found {} columns with missing values", incomplete),
        ));

        // Step 2: Decide and impute, column by column
        self.report_progress(ProgressUpdate::new(
            ImputationStage::Deciding,
            0.0,
            "Selecting imputation methods...",
        ));
        info!("Step 2: Deciding and imputing {} columns...", incomplete);

        let executor = ImputationExecutor::new(&self.config, self.selector.as_ref());
        let forward = |update: ProgressUpdate| self.report_progress(update);
        let execution = executor.execute(&mut working, &profiles, &forward)?;

        for decision in &execution.decisions {
            info!(
                "  {} -> {} ({} -> {} missing)",
                decision.column, decision.method, decision.missing_before, decision.missing_after
            );
        }

        // Step 3: Distribution validation
        self.report_progress(ProgressUpdate::new(
            ImputationStage::Validating,
            0.0,
            "Validating imputed distributions...",
        ));
        info!("Step 3: Validating imputed distributions...");

        let validator = DistributionValidator::new(&self.config);
        let (validation, validation_warnings) =
            validator.validate(&original, &working, &execution.decisions)?;

        self.report_progress(ProgressUpdate::new(
            ImputationStage::Validating,
            1.0,
            format!("Validated {} columns", validation.len()),
        ));

        // Step 4: Quality gate
        self.report_progress(ProgressUpdate::new(
            ImputationStage::Gating,
            0.0,
            "Evaluating quality gate...",
        ));
        info!("Step 4: Evaluating quality gate...");

        let completeness = record_completeness(&working);
        let (status, gate_warnings) = Gatekeeper::new(&self.config).evaluate(&validation, completeness);

        let mut report = ImputationReport {
            decisions: execution.decisions,
            validation,
            record_completeness: completeness,
            status,
            warnings: Vec::new(),
        };
        for warning in execution
            .warnings
            .into_iter()
            .chain(validation_warnings)
            .chain(gate_warnings)
        {
            report.add_warning(warning);
        }

        match report.status {
            GateStatus::Pass => info!(
                "Quality gate PASS (completeness {:.1}%)",
                completeness * 100.0
            ),
            status => warn!(
                "Quality gate {} (completeness {:.1}%, {} failed validations)",
                status,
                completeness * 100.0,
                report.failed_validations()
            ),
        }

        let summary = RunSummary {
            rows: working.height(),
            columns_before: original.width(),
            columns_after: working.width(),
            completeness_before,
            completeness_after: completeness,
            imputed_cells: report.imputed_cells(),
            duration_ms: start_time.elapsed().as_millis() as u64,
        };

        self.report_progress(ProgressUpdate::new(
            ImputationStage::Gating,
            1.0,
            format!("Quality gate: {}", report.status),
        ));

        Ok(ImputationOutcome {
            table: working,
            report,
            summary,
        })
    }
}

/// Builder for creating an [`ImputationEngine`].
///
/// Use [`ImputationEngine::builder()`] to get started.
#[derive(Default)]
pub struct ImputationEngineBuilder {
    config: Option<ImputationConfig>,
    selector: Option<Arc<dyn MethodSelector>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(ImputationEngineBuilder: Send);

impl ImputationEngineBuilder {
    /// Set the engine configuration.
    pub fn config(mut self, config: ImputationConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the rule-based decision policy.
    ///
    /// When not set, a [`RuleBasedSelector`] over the engine configuration
    /// is used.
    pub fn selector(mut self, selector: Arc<dyn MethodSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Set a progress reporter for receiving updates during a run.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use lex_imputation::{ProgressReporter, ProgressUpdate};
    /// use std::sync::Arc;
    ///
    /// struct MyReporter;
    ///
    /// impl ProgressReporter for MyReporter {
    ///     fn report(&self, update: ProgressUpdate) {
    ///         println!("{}: {}", update.stage.display_name(), update.message);
    ///     }
    /// }
    ///
    /// let engine = ImputationEngine::builder()
    ///     .progress_reporter(Arc::new(MyReporter))
    ///     .build()?;
    /// ```
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    ///
    /// For more complex scenarios, use [`progress_reporter`](Self::progress_reporter).
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the engine.
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> std::result::Result<ImputationEngine, ConfigValidationError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let selector = self
            .selector
            .unwrap_or_else(|| Arc::new(RuleBasedSelector::new(config.clone())));

        Ok(ImputationEngine {
            config,
            selector,
            progress_reporter: self.progress_reporter,
        })
    }
}
