use super::drift::{ks_statistic, psi};
use crate::config::ImputationConfig;
use crate::error::ImputationError;
use crate::types::{ImputationDecision, LogicalType, ValidationMetric};
use crate::utils::{logical_type, numeric_values};
use anyhow::Result;
use polars::prelude::*;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Compares each imputed numeric column against its pre-fill observations.
pub struct DistributionValidator {
    psi_bins: usize,
    psi_threshold: f64,
    ks_threshold: f64,
    min_samples: usize,
}

impl DistributionValidator {
    pub fn new(config: &ImputationConfig) -> Self {
        Self {
            psi_bins: config.psi_bins,
            psi_threshold: config.psi_threshold,
            ks_threshold: config.ks_threshold,
            min_samples: config.min_validation_samples,
        }
    }

    /// Metric for one column, or `None` when either side has fewer than the
    /// minimum number of observations.
    pub fn validate_column(
        &self,
        original: &DataFrame,
        imputed: &DataFrame,
        column: &str,
    ) -> Result<Option<ValidationMetric>> {
        let before = observed(original, column)?;
        let after = observed(imputed, column)?;

        if before.len() < self.min_samples || after.len() < self.min_samples {
            debug!(
                "Skipping validation of '{}': {} observed before, {} after",
                column,
                before.len(),
                after.len()
            );
            return Ok(None);
        }

        let psi_value = psi(&before, &after, self.psi_bins);
        let ks_value = ks_statistic(&before, &after);
        let passed = psi_value <= self.psi_threshold && ks_value <= self.ks_threshold;

        debug!(
            "Validated '{}': PSI={:.4}, KS={:.4}, passed={}",
            column, psi_value, ks_value, passed
        );

        Ok(Some(ValidationMetric {
            column: column.to_string(),
            psi: psi_value,
            ks_statistic: ks_value,
            passed,
        }))
    }

    /// Validate every numeric column that received a value-filling decision.
    ///
    /// Returns the metrics keyed by column and one warning per failed column.
    pub fn validate(
        &self,
        original: &DataFrame,
        imputed: &DataFrame,
        decisions: &[ImputationDecision],
    ) -> crate::error::Result<(BTreeMap<String, ValidationMetric>, Vec<String>)> {
        let mut metrics = BTreeMap::new();
        let mut warnings = Vec::new();

        for decision in decisions {
            if !decision.method.fills_values() {
                continue;
            }
            let is_numeric = original
                .column(&decision.column)
                .map(|c| logical_type(c.dtype()) == LogicalType::Numeric)
                .unwrap_or(false);
            if !is_numeric {
                continue;
            }

            let metric = self
                .validate_column(original, imputed, &decision.column)
                .map_err(|e| ImputationError::ValidationFailed {
                    column: decision.column.clone(),
                    reason: format!("{:#}", e),
                })?;

            if let Some(metric) = metric {
                if !metric.passed {
                    let message = format!(
                        "Column '{}' failed distribution validation: PSI={:.4} (max {:.2}), KS={:.4} (max {:.2})",
                        metric.column,
                        metric.psi,
                        self.psi_threshold,
                        metric.ks_statistic,
                        self.ks_threshold
                    );
                    warn!("{}", message);
                    warnings.push(message);
                }
                metrics.insert(metric.column.clone(), metric);
            }
        }

        Ok((metrics, warnings))
    }
}

/// Non-null, finite values of a column.
fn observed(df: &DataFrame, column: &str) -> Result<Vec<f64>> {
    Ok(numeric_values(df, column)?
        .into_iter()
        .flatten()
        .filter(|v| v.is_finite())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImputationMethod;

    fn decision(column: &str, method: ImputationMethod) -> ImputationDecision {
        ImputationDecision {
            column: column.to_string(),
            method,
            reason: String::new(),
            missing_before: 2,
            missing_after: 0,
        }
    }

    fn scenario() -> (DataFrame, DataFrame) {
        let original = df![
            "score" => [Some(10.0), Some(11.0), None, Some(13.0), Some(9.0), None, Some(10.0), Some(12.0), Some(11.0), Some(13.0)],
        ]
        .unwrap();
        let imputed = df![
            "score" => [10.0, 11.0, 11.0, 13.0, 9.0, 11.0, 10.0, 12.0, 11.0, 13.0],
        ]
        .unwrap();
        (original, imputed)
    }

    #[test]
    fn test_validate_column_requires_min_samples() {
        let (original, imputed) = scenario();
        let validator = DistributionValidator::new(&ImputationConfig::default());

        // only 8 observations before imputation
        assert!(validator.validate_column(&original, &imputed, "score").unwrap().is_none());
    }

    #[test]
    fn test_validate_column_median_refill() {
        let (original, imputed) = scenario();
        let config = ImputationConfig::builder()
            .min_validation_samples(8)
            .build()
            .unwrap();
        let validator = DistributionValidator::new(&config);

        let metric = validator
            .validate_column(&original, &imputed, "score")
            .unwrap()
            .unwrap();

        assert!((metric.psi - 0.104).abs() < 0.001);
        assert!((metric.ks_statistic - 0.075).abs() < 1e-12);
        // PSI lands just above 0.10
        assert!(!metric.passed);
    }

    #[test]
    fn test_validate_skips_categorical_and_flag_only() {
        let original = df![
            "label" => [Some("a"); 12],
            "when" => [Some(1.0); 12],
        ]
        .unwrap();
        let validator = DistributionValidator::new(&ImputationConfig::default());

        let (metrics, warnings) = validator
            .validate(
                &original,
                &original,
                &[
                    decision("label", ImputationMethod::Mode),
                    decision("when", ImputationMethod::FlagOnly),
                ],
            )
            .unwrap();

        assert!(metrics.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_validate_passes_stable_column() {
        let values: Vec<Option<f64>> = (0..40)
            .map(|i| if i == 20 { None } else { Some(i as f64) })
            .collect();
        let original = df!["x" => values.clone()].unwrap();
        let filled: Vec<f64> = values.iter().map(|v| v.unwrap_or(20.0)).collect();
        let imputed = df!["x" => filled].unwrap();

        let validator = DistributionValidator::new(&ImputationConfig::default());
        let (metrics, warnings) = validator
            .validate(&original, &imputed, &[decision("x", ImputationMethod::Median)])
            .unwrap();

        assert!(metrics["x"].passed);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_validate_warns_on_failure() {
        let (original, imputed) = scenario();
        let config = ImputationConfig::builder()
            .min_validation_samples(8)
            .build()
            .unwrap();
        let validator = DistributionValidator::new(&config);

        let (metrics, warnings) = validator
            .validate(&original, &imputed, &[decision("score", ImputationMethod::Median)])
            .unwrap();

        assert!(!metrics["score"].passed);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("score"));
        assert!(warnings[0].contains("PSI=0.104"));
        assert!(warnings[0].contains("KS=0.0750"));
    }
}
