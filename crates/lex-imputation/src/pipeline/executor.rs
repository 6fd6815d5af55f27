//! Imputation executor.
//!
//! Walks the columns with missing values in table order, asks the selector
//! for a method and applies it to the working table. KNN and MICE columns
//! are filled by joint passes over the numeric design matrix, either batched
//! after the loop or at each column's turn.

use crate::config::{ImputationConfig, JointPassMode};
use crate::decisions::{MethodChoice, MethodSelector, SelectionContext};
use crate::error::{ImputationError, Result, ResultExt};
use crate::imputers::{
    DesignMatrix, GroupImputer, JointImputer, KnnImputer, MiceImputer, StatisticalImputer,
};
use crate::pipeline::progress::{ImputationStage, ProgressUpdate};
use crate::profiler::{CorrelationMatrix, CorrelationScout, MissingnessAnalyzer};
use crate::types::{ColumnProfile, ImputationDecision, ImputationMethod, LogicalType};
use crate::utils::{missing_in_column, numeric_values, write_numeric};
use anyhow::anyhow;
use polars::prelude::*;
use tracing::{debug, info, warn};

/// Decisions and warnings produced by one pass over a table.
#[derive(Debug, Default)]
pub struct ExecutionResult {
    pub decisions: Vec<ImputationDecision>,
    pub warnings: Vec<String>,
}

/// A KNN/MICE column waiting for its joint pass.
#[derive(Debug, Clone, Copy)]
struct PendingJoint {
    decision_idx: usize,
    has_group: bool,
}

/// Applies imputation decisions to a working table.
pub struct ImputationExecutor<'a> {
    config: &'a ImputationConfig,
    selector: &'a dyn MethodSelector,
    scout: CorrelationScout,
}

impl<'a> ImputationExecutor<'a> {
    pub fn new(config: &'a ImputationConfig, selector: &'a dyn MethodSelector) -> Self {
        Self {
            config,
            selector,
            scout: CorrelationScout::new(config.correlation_threshold),
        }
    }

    /// Decide and impute every column of `df` that has missing values.
    pub fn execute(
        &self,
        df: &mut DataFrame,
        profiles: &[ColumnProfile],
        progress: &dyn Fn(ProgressUpdate),
    ) -> Result<ExecutionResult> {
        let mut result = ExecutionResult::default();
        let mut correlations: Option<CorrelationMatrix> = None;
        let mut pending_knn = Vec::new();
        let mut pending_mice = Vec::new();

        let candidates: Vec<&ColumnProfile> = profiles.iter().filter(|p| p.has_missing()).collect();
        let total = candidates.len();

        for (i, initial) in candidates.into_iter().enumerate() {
            let name = initial.name.as_str();
            progress(ProgressUpdate::with_items(
                ImputationStage::Imputing,
                format!("Column: {}", name),
                i,
                total,
                format!("Imputing missing values in '{}'", name),
            ));

            let profile = MissingnessAnalyzer::analyze_column(df, name)
                .ok_or_else(|| ImputationError::ColumnNotFound(name.to_string()))?;
            if !profile.has_missing() || self.already_flagged(df, &profile) {
                debug!("Skipping '{}': nothing left to decide", name);
                continue;
            }

            let has_group = self.has_group_column(df, name);
            let choice = self.decide(df, &profile, has_group, &mut correlations);
            let MethodChoice { method, reason } = choice;

            match method {
                ImputationMethod::Knn | ImputationMethod::Mice => {
                    result.decisions.push(ImputationDecision {
                        column: profile.name.clone(),
                        method,
                        reason,
                        missing_before: profile.missing_count,
                        missing_after: profile.missing_count,
                    });
                    let pending = PendingJoint {
                        decision_idx: result.decisions.len() - 1,
                        has_group,
                    };
                    match (self.config.joint_pass_mode, method) {
                        (JointPassMode::PerColumn, _) => {
                            self.run_joint_pass(df, method, &[pending], &mut result)?
                        }
                        (JointPassMode::Batched, ImputationMethod::Knn) => pending_knn.push(pending),
                        (JointPassMode::Batched, _) => pending_mice.push(pending),
                    }
                }
                method => {
                    self.apply_local(df, method, name, has_group)
                        .map_err(|e| column_failure(name, e))?;
                    result.decisions.push(ImputationDecision {
                        column: profile.name.clone(),
                        method,
                        reason,
                        missing_before: profile.missing_count,
                        missing_after: missing_count(df, name)?,
                    });
                }
            }
        }

        if !pending_knn.is_empty() || !pending_mice.is_empty() {
            progress(ProgressUpdate::new(
                ImputationStage::JointImputation,
                0.0,
                format!(
                    "Running joint passes ({} KNN, {} MICE columns)",
                    pending_knn.len(),
                    pending_mice.len()
                ),
            ));
            self.run_joint_pass(df, ImputationMethod::Knn, &pending_knn, &mut result)?;
            self.run_joint_pass(df, ImputationMethod::Mice, &pending_mice, &mut result)?;
        }

        Ok(result)
    }

    /// Ask the selector for a method, computing the correlation matrix the
    /// first time a peer count is needed.
    pub(crate) fn decide(
        &self,
        df: &DataFrame,
        profile: &ColumnProfile,
        has_group: bool,
        correlations: &mut Option<CorrelationMatrix>,
    ) -> MethodChoice {
        let ctx = SelectionContext {
            profile,
            n_rows: df.height(),
            has_group_column: has_group,
        };

        let mut peer_count = || {
            if profile.logical_type != LogicalType::Numeric {
                return 0;
            }
            if correlations.is_none() {
                match CorrelationMatrix::compute(df) {
                    Ok(matrix) => {
                        info!(
                            "Computed correlation matrix over {} numeric columns",
                            matrix.columns().len()
                        );
                        *correlations = Some(matrix);
                    }
                    Err(e) => {
                        warn!("Correlation matrix unavailable: {:#}", e);
                        return 0;
                    }
                }
            }
            correlations
                .as_ref()
                .map(|matrix| self.scout.count_in(matrix, &profile.name))
                .unwrap_or(0)
        };

        self.selector.select(&ctx, &mut peer_count)
    }

    /// A datetime column whose indicator already exists was handled by an
    /// earlier run.
    pub(crate) fn already_flagged(&self, df: &DataFrame, profile: &ColumnProfile) -> bool {
        profile.logical_type == LogicalType::Datetime
            && df.column(&self.config.indicator_name(&profile.name)).is_ok()
    }

    /// The configured group column exists and is not `column` itself.
    pub(crate) fn has_group_column(&self, df: &DataFrame, column: &str) -> bool {
        self.config
            .group_column
            .as_deref()
            .is_some_and(|group| group != column && df.column(group).is_ok())
    }

    fn group_imputer(&self, has_group: bool) -> Option<GroupImputer> {
        if !has_group {
            return None;
        }
        self.config
            .group_column
            .as_ref()
            .map(|group| GroupImputer::new(group.clone(), self.config.group_fallback_source))
    }

    /// Apply a column-local method.
    fn apply_local(
        &self,
        df: &mut DataFrame,
        method: ImputationMethod,
        name: &str,
        has_group: bool,
    ) -> anyhow::Result<usize> {
        match method {
            ImputationMethod::Median => StatisticalImputer::apply_median(df, name),
            ImputationMethod::Mode => StatisticalImputer::apply_mode(df, name),
            ImputationMethod::Unknown => {
                StatisticalImputer::apply_unknown(df, name, &self.config.unknown_label)
            }
            ImputationMethod::GroupMedian => match self.group_imputer(has_group) {
                Some(imputer) => imputer.apply_group_median(df, name),
                None => {
                    warn!("No group column for '{}', using global median", name);
                    StatisticalImputer::apply_median(df, name)
                }
            },
            ImputationMethod::GroupMode => match self.group_imputer(has_group) {
                Some(imputer) => imputer.apply_group_mode(df, name),
                None => {
                    warn!("No group column for '{}', using global mode", name);
                    StatisticalImputer::apply_mode(df, name)
                }
            },
            ImputationMethod::FlagOnly => {
                StatisticalImputer::apply_flag_only(df, name, &self.config.indicator_name(name))
            }
            ImputationMethod::Knn | ImputationMethod::Mice => {
                Err(anyhow!("{} requires a joint pass", method.display_name()))
            }
        }
    }

    fn joint_imputer(&self, method: ImputationMethod) -> Box<dyn JointImputer> {
        match method {
            ImputationMethod::Mice => Box::new(MiceImputer::new(
                self.config.mice_iterations,
                self.config.mice_tolerance,
                self.config.mice_ridge_alpha,
                self.config.random_seed,
            )),
            _ => Box::new(KnnImputer::new(self.config.knn_neighbors)),
        }
    }

    /// Fill the pending columns with one joint pass.
    ///
    /// A target without a single observed value falls back on its own before
    /// the pass. On numerical failure of the pass itself every remaining
    /// target falls back to a group median or median fill.
    fn run_joint_pass(
        &self,
        df: &mut DataFrame,
        method: ImputationMethod,
        pending: &[PendingJoint],
        result: &mut ExecutionResult,
    ) -> Result<()> {
        let mut runnable = Vec::with_capacity(pending.len());
        for &p in pending {
            let name = result.decisions[p.decision_idx].column.clone();
            if missing_count(df, &name)? == df.height() {
                let cause = anyhow!("column '{}' has no observed values", name);
                self.fall_back(df, method, p, &cause, result)?;
            } else {
                runnable.push(p);
            }
        }
        if runnable.is_empty() {
            return Ok(());
        }

        let targets: Vec<String> = runnable
            .iter()
            .map(|p| result.decisions[p.decision_idx].column.clone())
            .collect();
        let imputer = self.joint_imputer(method);
        info!(
            "Running {} pass over {} column(s): {:?}",
            imputer.name(),
            targets.len(),
            targets
        );

        let outcome =
            DesignMatrix::from_frame(df).and_then(|matrix| imputer.impute(&matrix, &targets));

        match outcome {
            Ok(filled) => {
                for (p, name) in runnable.iter().zip(&targets) {
                    write_joint_column(df, &filled, name).map_err(|e| column_failure(name, e))?;
                    result.decisions[p.decision_idx].missing_after = missing_count(df, name)?;
                }
            }
            Err(e) => {
                warn!("{} pass failed: {:#}", imputer.name(), e);
                for &p in &runnable {
                    self.fall_back(df, method, p, &e, result)?;
                }
            }
        }

        Ok(())
    }

    /// Fill a KNN/MICE column with group median or median instead, and record
    /// why on its decision and in the warnings.
    fn fall_back(
        &self,
        df: &mut DataFrame,
        method: ImputationMethod,
        pending: PendingJoint,
        cause: &anyhow::Error,
        result: &mut ExecutionResult,
    ) -> Result<()> {
        let fallback = if pending.has_group {
            ImputationMethod::GroupMedian
        } else {
            ImputationMethod::Median
        };
        let name = result.decisions[pending.decision_idx].column.clone();
        self.apply_local(df, fallback, &name, pending.has_group)
            .map_err(|err| column_failure(&name, err))?;

        let decision = &mut result.decisions[pending.decision_idx];
        decision.reason = format!(
            "{}; {} failed ({:#}), fell back to {}",
            decision.reason, method, cause, fallback
        );
        decision.method = fallback;
        decision.missing_after = missing_count(df, &name)?;

        result.warnings.push(format!(
            "{} failed for '{}': {:#}; fell back to {}",
            method.display_name(),
            name,
            cause,
            fallback
        ));
        Ok(())
    }
}

/// Copy the joint result of `name` into the working table, replacing only
/// cells that are missing there.
fn write_joint_column(df: &mut DataFrame, filled: &DesignMatrix, name: &str) -> anyhow::Result<()> {
    let idx = filled
        .column_index(name)
        .ok_or_else(|| anyhow!("Column '{}' missing from imputed matrix", name))?;
    let imputed = filled.column(idx);
    let merged: Vec<Option<f64>> = numeric_values(df, name)?
        .into_iter()
        .zip(imputed)
        .map(|(current, new)| current.or(new))
        .collect();
    write_numeric(df, name, merged)
}

fn missing_count(df: &DataFrame, name: &str) -> Result<usize> {
    let column = df
        .column(name)
        .context(format!("Counting missing values in '{}'", name))?;
    Ok(missing_in_column(column))
}

fn column_failure(column: &str, error: anyhow::Error) -> ImputationError {
    ImputationError::ImputationFailed {
        column: column.to_string(),
        reason: format!("{:#}", error),
    }
}
