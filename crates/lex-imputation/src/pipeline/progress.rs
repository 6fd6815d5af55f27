//! Progress reporting for imputation runs.
//!
//! A run emits [`ProgressUpdate`]s through a [`ProgressReporter`] as it moves
//! through its stages, so a caller running the engine on a worker thread can
//! drive a progress bar.
//!
//! # Example
//!
//! ```rust,ignore
//! use lex_imputation::ImputationEngine;
//!
//! let outcome = ImputationEngine::builder()
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .run(df)?;
//! ```

use serde::{Deserialize, Serialize};

/// Stages of an imputation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputationStage {
    /// Run is starting
    Initializing,
    /// Computing missingness profiles
    Analyzing,
    /// Selecting a method per column
    Deciding,
    /// Applying column-local fills
    Imputing,
    /// Running KNN/MICE passes over the numeric matrix
    JointImputation,
    /// Comparing distributions before and after
    Validating,
    /// Computing the gate status
    Gating,
    /// Run finished
    Complete,
    /// Run failed with an error
    Failed,
}

impl ImputationStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Initializing => "Initializing",
            Self::Analyzing => "Analyzing Missingness",
            Self::Deciding => "Selecting Methods",
            Self::Imputing => "Imputing Values",
            Self::JointImputation => "Joint Imputation",
            Self::Validating => "Validating Distributions",
            Self::Gating => "Quality Gate",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        }
    }

    /// Share of the overall run spent in this stage. The working stages sum
    /// to 1.0.
    pub fn weight(&self) -> f32 {
        match self {
            Self::Initializing => 0.02,
            Self::Analyzing => 0.08,
            Self::Deciding => 0.10,
            Self::Imputing => 0.40,
            Self::JointImputation => 0.20,
            Self::Validating => 0.15,
            Self::Gating => 0.05,
            Self::Complete | Self::Failed => 0.0,
        }
    }

    /// Cumulative progress at the start of this stage.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Initializing => 0.0,
            Self::Analyzing => 0.02,
            Self::Deciding => 0.10,
            Self::Imputing => 0.20,
            Self::JointImputation => 0.60,
            Self::Validating => 0.80,
            Self::Gating => 0.95,
            Self::Complete => 1.0,
            Self::Failed => 0.0,
        }
    }
}

/// Progress update with optional sub-stage and item counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: ImputationStage,

    /// Optional sub-stage description (e.g., "Column: age")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_stage: Option<String>,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Progress within current stage (0.0 - 1.0)
    pub stage_progress: f32,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_processed: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_total: Option<usize>,
}

impl ProgressUpdate {
    pub fn new(stage: ImputationStage, stage_progress: f32, message: impl Into<String>) -> Self {
        let progress = stage.base_progress() + (stage.weight() * stage_progress);
        Self {
            stage,
            sub_stage: None,
            progress: progress.clamp(0.0, 1.0),
            stage_progress: stage_progress.clamp(0.0, 1.0),
            message: message.into(),
            items_processed: None,
            items_total: None,
        }
    }

    pub fn with_sub_stage(
        stage: ImputationStage,
        sub_stage: impl Into<String>,
        stage_progress: f32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            sub_stage: Some(sub_stage.into()),
            ..Self::new(stage, stage_progress, message)
        }
    }

    /// Update for item `current` of `total` within a stage.
    pub fn with_items(
        stage: ImputationStage,
        sub_stage: impl Into<String>,
        current: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        let stage_progress = if total > 0 {
            current as f32 / total as f32
        } else {
            0.0
        };
        Self {
            items_processed: Some(current),
            items_total: Some(total),
            ..Self::with_sub_stage(stage, sub_stage, stage_progress, message)
        }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self {
            progress: 1.0,
            stage_progress: 1.0,
            ..Self::new(ImputationStage::Complete, 1.0, message)
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(ImputationStage::Failed, 0.0, message)
    }
}

/// Receiver of progress updates.
///
/// Implementations must be `Send + Sync` so the engine can run on a
/// background thread while updates are forwarded elsewhere. `report` may be
/// called once per column and should not block.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// [`ProgressReporter`] backed by a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);
