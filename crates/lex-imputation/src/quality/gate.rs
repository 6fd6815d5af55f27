use crate::config::ImputationConfig;
use crate::types::{GateStatus, ValidationMetric};
use std::collections::BTreeMap;

/// Aggregates completeness and validation results into a gate status.
///
/// Checks in order:
/// 1. completeness below the threshold → `STOP`
/// 2. more than the allowed share of validated columns failed → `STOP`
/// 3. any validated column failed → `WARN`
/// 4. otherwise → `PASS`
#[derive(Debug, Clone, Copy)]
pub struct Gatekeeper {
    completeness_threshold: f64,
    max_failed_ratio: f64,
}

impl Gatekeeper {
    pub fn new(config: &ImputationConfig) -> Self {
        Self {
            completeness_threshold: config.completeness_threshold,
            max_failed_ratio: config.max_failed_validation_ratio,
        }
    }

    /// Status plus the warnings explaining a `STOP`.
    pub fn evaluate(
        &self,
        metrics: &BTreeMap<String, ValidationMetric>,
        record_completeness: f64,
    ) -> (GateStatus, Vec<String>) {
        if record_completeness < self.completeness_threshold {
            return (
                GateStatus::Stop,
                vec![format!(
                    "Record completeness {:.1}% is below the required {:.1}%",
                    record_completeness * 100.0,
                    self.completeness_threshold * 100.0
                )],
            );
        }

        let total = metrics.len();
        let failed = metrics.values().filter(|m| !m.passed).count();

        if failed as f64 > self.max_failed_ratio * total as f64 {
            return (
                GateStatus::Stop,
                vec![format!(
                    "{} of {} validated columns failed, above the allowed {:.0}%",
                    failed,
                    total,
                    self.max_failed_ratio * 100.0
                )],
            );
        }

        if failed > 0 {
            return (GateStatus::Warn, Vec::new());
        }

        (GateStatus::Pass, Vec::new())
    }
}
