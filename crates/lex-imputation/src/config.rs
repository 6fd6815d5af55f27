//! Configuration types for the imputation engine.
//!
//! Every threshold of the decision policy, the validator and the quality gate
//! lives here so that runs are reproducible and tests can move breakpoints.
//! Use [`ImputationConfig::builder()`] for a validated configuration.

use serde::{Deserialize, Serialize};

/// How KNN and MICE joint passes are scheduled within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JointPassMode {
    /// Decide all columns first, then run one joint pass per method over the
    /// columns assigned to it.
    #[default]
    Batched,
    /// Run a joint pass at each column's turn in the column loop.
    PerColumn,
}

/// Which values the global fallback of a group fill is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GroupFallbackSource {
    /// The working column after the grouped fill has been applied.
    #[default]
    Working,
    /// The column's non-null values before any fill.
    Original,
}

/// Configuration for the imputation engine.
///
/// # Example
///
/// ```rust,ignore
/// use lex_imputation::config::ImputationConfig;
///
/// let config = ImputationConfig::builder()
///     .group_column("region")
///     .random_seed(7)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImputationConfig {
    /// Categorical key used by group-wise fills.
    /// Default: None
    pub group_column: Option<String>,

    /// Missing ratio at or below which a plain median/mode fill is used.
    /// Default: 0.05
    pub simple_fill_threshold: f64,

    /// Missing ratio at or below which a numeric column uses group medians
    /// when a group column is available.
    /// Default: 0.50
    pub group_fill_threshold: f64,

    /// Row count below which KNN and MICE are never chosen.
    /// Default: 2000
    pub small_dataset_rows: usize,

    /// Row count below which MICE is avoided in favour of median fills.
    /// Default: 10000
    pub medium_dataset_rows: usize,

    /// Minimum row count for MICE.
    /// Default: 50000
    pub mice_min_rows: usize,

    /// Minimum number of correlated numeric peers for MICE.
    /// Default: 3
    pub mice_min_correlated_peers: usize,

    /// Absolute Pearson correlation a peer must reach to count.
    /// Default: 0.4
    pub correlation_threshold: f64,

    /// Number of neighbours for KNN imputation.
    /// Default: 5
    pub knn_neighbors: usize,

    /// Number of chained-equation rounds for MICE.
    /// Default: 10
    pub mice_iterations: usize,

    /// Relative change below which MICE stops early.
    /// Default: 0.001
    pub mice_tolerance: f64,

    /// Ridge penalty added to the MICE normal equations.
    /// Default: 1e-6
    pub mice_ridge_alpha: f64,

    /// Seed for every randomized step of a run.
    /// Default: 42
    pub random_seed: u64,

    /// Maximum number of equal-frequency PSI bins.
    /// Default: 10
    pub psi_bins: usize,

    /// PSI above this fails validation.
    /// Default: 0.10
    pub psi_threshold: f64,

    /// KS statistic above this fails validation.
    /// Default: 0.10
    pub ks_threshold: f64,

    /// Minimum non-null values required on each side to validate a column.
    /// Default: 10
    pub min_validation_samples: usize,

    /// Record completeness below this stops the gate.
    /// Default: 0.80
    pub completeness_threshold: f64,

    /// Share of failed validations above which the gate stops.
    /// Default: 0.30
    pub max_failed_validation_ratio: f64,

    /// Label written by the `unknown` method.
    /// Default: "Unknown"
    pub unknown_label: String,

    /// Suffix of the indicator column created for datetime columns.
    /// Default: "_missing"
    pub indicator_suffix: String,

    /// Scheduling of KNN/MICE joint passes.
    /// Default: Batched
    pub joint_pass_mode: JointPassMode,

    /// Source of the global fallback statistic for group fills.
    /// Default: Working
    pub group_fallback_source: GroupFallbackSource,
}

impl Default for ImputationConfig {
    fn default() -> Self {
        Self {
            group_column: None,
            simple_fill_threshold: 0.05,
            group_fill_threshold: 0.50,
            small_dataset_rows: 2_000,
            medium_dataset_rows: 10_000,
            mice_min_rows: 50_000,
            mice_min_correlated_peers: 3,
            correlation_threshold: 0.4,
            knn_neighbors: 5,
            mice_iterations: 10,
            mice_tolerance: 1e-3,
            mice_ridge_alpha: 1e-6,
            random_seed: 42,
            psi_bins: 10,
            psi_threshold: 0.10,
            ks_threshold: 0.10,
            min_validation_samples: 10,
            completeness_threshold: 0.80,
            max_failed_validation_ratio: 0.30,
            unknown_label: "Unknown".to_string(),
            indicator_suffix: "_missing".to_string(),
            joint_pass_mode: JointPassMode::default(),
            group_fallback_source: GroupFallbackSource::default(),
        }
    }
}

impl ImputationConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ImputationConfigBuilder {
        ImputationConfigBuilder::default()
    }

    /// Name of the indicator column for `column`.
    pub fn indicator_name(&self, column: &str) -> String {
        format!("{}{}", column, self.indicator_suffix)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let unit_fields = [
            ("simple_fill_threshold", self.simple_fill_threshold),
            ("group_fill_threshold", self.group_fill_threshold),
            ("correlation_threshold", self.correlation_threshold),
            ("psi_threshold", self.psi_threshold),
            ("ks_threshold", self.ks_threshold),
            ("completeness_threshold", self.completeness_threshold),
            ("max_failed_validation_ratio", self.max_failed_validation_ratio),
        ];
        for (field, value) in unit_fields {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigValidationError::InvalidThreshold {
                    field: field.to_string(),
                    value,
                });
            }
        }

        for (field, value) in [
            ("mice_tolerance", self.mice_tolerance),
            ("mice_ridge_alpha", self.mice_ridge_alpha),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigValidationError::NegativeValue {
                    field: field.to_string(),
                    value,
                });
            }
        }

        if self.small_dataset_rows > self.medium_dataset_rows
            || self.medium_dataset_rows > self.mice_min_rows
        {
            return Err(ConfigValidationError::UnorderedBreakpoints {
                small: self.small_dataset_rows,
                medium: self.medium_dataset_rows,
                large: self.mice_min_rows,
            });
        }

        if self.knn_neighbors == 0 {
            return Err(ConfigValidationError::InvalidKnnNeighbors(
                self.knn_neighbors,
            ));
        }

        for (field, value, min) in [
            ("mice_iterations", self.mice_iterations, 1),
            ("psi_bins", self.psi_bins, 2),
            ("min_validation_samples", self.min_validation_samples, 1),
        ] {
            if value < min {
                return Err(ConfigValidationError::TooSmall {
                    field: field.to_string(),
                    value,
                    min,
                });
            }
        }

        if self.unknown_label.is_empty() {
            return Err(ConfigValidationError::EmptyLabel("unknown_label".to_string()));
        }
        if self.indicator_suffix.is_empty() {
            return Err(ConfigValidationError::EmptyLabel(
                "indicator_suffix".to_string(),
            ));
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid threshold for '{field}': {value} (must be between 0.0 and 1.0)")]
    InvalidThreshold { field: String, value: f64 },

    #[error("Invalid value for '{field}': {value} (must be finite and non-negative)")]
    NegativeValue { field: String, value: f64 },

    #[error(
        "Row breakpoints must be ordered (small {small} <= medium {medium} <= large {large})"
    )]
    UnorderedBreakpoints {
        small: usize,
        medium: usize,
        large: usize,
    },

    #[error("Invalid KNN neighbors: {0} (must be at least 1)")]
    InvalidKnnNeighbors(usize),

    #[error("Invalid value for '{field}': {value} (must be at least {min})")]
    TooSmall {
        field: String,
        value: usize,
        min: usize,
    },

    #[error("'{0}' must not be empty")]
    EmptyLabel(String),
}

/// Builder for [`ImputationConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct ImputationConfigBuilder {
    base: Option<ImputationConfig>,
    group_column: Option<String>,
    simple_fill_threshold: Option<f64>,
    group_fill_threshold: Option<f64>,
    small_dataset_rows: Option<usize>,
    medium_dataset_rows: Option<usize>,
    mice_min_rows: Option<usize>,
    mice_min_correlated_peers: Option<usize>,
    correlation_threshold: Option<f64>,
    knn_neighbors: Option<usize>,
    mice_iterations: Option<usize>,
    random_seed: Option<u64>,
    psi_bins: Option<usize>,
    psi_threshold: Option<f64>,
    ks_threshold: Option<f64>,
    min_validation_samples: Option<usize>,
    completeness_threshold: Option<f64>,
    max_failed_validation_ratio: Option<f64>,
    joint_pass_mode: Option<JointPassMode>,
    group_fallback_source: Option<GroupFallbackSource>,
}

impl ImputationConfigBuilder {
    /// Start from an existing configuration (e.g. loaded from JSON) instead
    /// of the defaults. Setters called on the builder override its fields.
    pub fn from_config(config: ImputationConfig) -> Self {
        Self {
            base: Some(config),
            ..Self::default()
        }
    }

    /// Set the group column used by group-wise fills.
    pub fn group_column(mut self, column: impl Into<String>) -> Self {
        self.group_column = Some(column.into());
        self
    }

    /// Set the missing ratio up to which median/mode fills are used.
    pub fn simple_fill_threshold(mut self, threshold: f64) -> Self {
        self.simple_fill_threshold = Some(threshold);
        self
    }

    /// Set the missing ratio up to which group medians are used.
    pub fn group_fill_threshold(mut self, threshold: f64) -> Self {
        self.group_fill_threshold = Some(threshold);
        self
    }

    /// Set the small/medium/large row breakpoints in one call.
    ///
    /// # Arguments
    /// * `small` - below this, KNN and MICE are never chosen
    /// * `medium` - below this, MICE is avoided
    /// * `large` - minimum rows for MICE
    pub fn row_breakpoints(mut self, small: usize, medium: usize, large: usize) -> Self {
        self.small_dataset_rows = Some(small);
        self.medium_dataset_rows = Some(medium);
        self.mice_min_rows = Some(large);
        self
    }

    /// Set the minimum number of correlated peers for MICE.
    pub fn mice_min_correlated_peers(mut self, peers: usize) -> Self {
        self.mice_min_correlated_peers = Some(peers);
        self
    }

    /// Set the absolute correlation a peer must reach.
    pub fn correlation_threshold(mut self, threshold: f64) -> Self {
        self.correlation_threshold = Some(threshold);
        self
    }

    /// Set the number of neighbors for KNN imputation.
    pub fn knn_neighbors(mut self, k: usize) -> Self {
        self.knn_neighbors = Some(k);
        self
    }

    /// Set the number of MICE rounds.
    pub fn mice_iterations(mut self, iterations: usize) -> Self {
        self.mice_iterations = Some(iterations);
        self
    }

    /// Set the random seed.
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    /// Set the maximum number of PSI bins.
    pub fn psi_bins(mut self, bins: usize) -> Self {
        self.psi_bins = Some(bins);
        self
    }

    /// Set the PSI pass threshold.
    pub fn psi_threshold(mut self, threshold: f64) -> Self {
        self.psi_threshold = Some(threshold);
        self
    }

    /// Set the KS pass threshold.
    pub fn ks_threshold(mut self, threshold: f64) -> Self {
        self.ks_threshold = Some(threshold);
        self
    }

    /// Set the minimum sample size for validation.
    pub fn min_validation_samples(mut self, samples: usize) -> Self {
        self.min_validation_samples = Some(samples);
        self
    }

    /// Set the completeness below which the gate stops.
    pub fn completeness_threshold(mut self, threshold: f64) -> Self {
        self.completeness_threshold = Some(threshold);
        self
    }

    /// Set the failed-validation share above which the gate stops.
    pub fn max_failed_validation_ratio(mut self, ratio: f64) -> Self {
        self.max_failed_validation_ratio = Some(ratio);
        self
    }

    /// Set how KNN/MICE joint passes are scheduled.
    pub fn joint_pass_mode(mut self, mode: JointPassMode) -> Self {
        self.joint_pass_mode = Some(mode);
        self
    }

    /// Set the source of the group-fill global fallback.
    pub fn group_fallback_source(mut self, source: GroupFallbackSource) -> Self {
        self.group_fallback_source = Some(source);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `ImputationConfig` or an error if validation fails.
    pub fn build(self) -> Result<ImputationConfig, ConfigValidationError> {
        let base = self.base.unwrap_or_default();
        let config = ImputationConfig {
            group_column: self.group_column.or(base.group_column),
            simple_fill_threshold: self
                .simple_fill_threshold
                .unwrap_or(base.simple_fill_threshold),
            group_fill_threshold: self
                .group_fill_threshold
                .unwrap_or(base.group_fill_threshold),
            small_dataset_rows: self.small_dataset_rows.unwrap_or(base.small_dataset_rows),
            medium_dataset_rows: self.medium_dataset_rows.unwrap_or(base.medium_dataset_rows),
            mice_min_rows: self.mice_min_rows.unwrap_or(base.mice_min_rows),
            mice_min_correlated_peers: self
                .mice_min_correlated_peers
                .unwrap_or(base.mice_min_correlated_peers),
            correlation_threshold: self
                .correlation_threshold
                .unwrap_or(base.correlation_threshold),
            knn_neighbors: self.knn_neighbors.unwrap_or(base.knn_neighbors),
            mice_iterations: self.mice_iterations.unwrap_or(base.mice_iterations),
            mice_tolerance: base.mice_tolerance,
            mice_ridge_alpha: base.mice_ridge_alpha,
            random_seed: self.random_seed.unwrap_or(base.random_seed),
            psi_bins: self.psi_bins.unwrap_or(base.psi_bins),
            psi_threshold: self.psi_threshold.unwrap_or(base.psi_threshold),
            ks_threshold: self.ks_threshold.unwrap_or(base.ks_threshold),
            min_validation_samples: self
                .min_validation_samples
                .unwrap_or(base.min_validation_samples),
            completeness_threshold: self
                .completeness_threshold
                .unwrap_or(base.completeness_threshold),
            max_failed_validation_ratio: self
                .max_failed_validation_ratio
                .unwrap_or(base.max_failed_validation_ratio),
            unknown_label: base.unknown_label,
            indicator_suffix: base.indicator_suffix,
            joint_pass_mode: self.joint_pass_mode.unwrap_or(base.joint_pass_mode),
            group_fallback_source: self
                .group_fallback_source
                .unwrap_or(base.group_fallback_source),
        };

        config.validate()?;
        Ok(config)
    }
}
