//! Rule-based imputation policy.

use super::{MethodChoice, MethodSelector, SelectionContext};
use crate::config::ImputationConfig;
use crate::types::{ImputationMethod, LogicalType};
use tracing::debug;

/// Rule-based method selector.
///
/// Rules are evaluated in priority order and the first match wins:
///
/// 1. datetime → `flag_only`
/// 2. numeric, low missingness → `median`
/// 3. numeric, group column and moderate missingness → `group_median`
/// 4. numeric, large table with enough correlated peers → `mice`
/// 5. numeric, small table → `group_median` / `median`
/// 6. numeric, medium table → `group_median` / `median`
/// 7. numeric otherwise → `knn`
/// 8. categorical, low missingness → `mode`
/// 9. categorical with group column → `group_mode`
/// 10. categorical otherwise → `unknown`
pub struct RuleBasedSelector {
    config: ImputationConfig,
}

impl RuleBasedSelector {
    pub fn new(config: ImputationConfig) -> Self {
        Self { config }
    }

    fn select_numeric(
        &self,
        ctx: &SelectionContext<'_>,
        peer_count: &mut dyn FnMut() -> usize,
    ) -> MethodChoice {
        let cfg = &self.config;
        let ratio = ctx.profile.missing_ratio;
        let n = ctx.n_rows;
        let pct = ratio * 100.0;

        if ratio <= cfg.simple_fill_threshold {
            return choice(
                ImputationMethod::Median,
                format!(
                    "low missingness ({:.1}% <= {:.1}%, n={}): median fill keeps the distribution",
                    pct,
                    cfg.simple_fill_threshold * 100.0,
                    n
                ),
            );
        }

        if ctx.has_group_column && ratio <= cfg.group_fill_threshold {
            return choice(
                ImputationMethod::GroupMedian,
                format!(
                    "moderate missingness ({:.1}% <= {:.1}%, n={}) with group column: per-group median",
                    pct,
                    cfg.group_fill_threshold * 100.0,
                    n
                ),
            );
        }

        let peers = if n >= cfg.mice_min_rows {
            let peers = peer_count();
            if peers >= cfg.mice_min_correlated_peers {
                return choice(
                    ImputationMethod::Mice,
                    format!(
                        "large table (n={} >= {}) with {} correlated peers (|r| >= {}), missing {:.1}%: chained equations",
                        n, cfg.mice_min_rows, peers, cfg.correlation_threshold, pct
                    ),
                );
            }
            Some(peers)
        } else {
            None
        };
        let peer_note = peers
            .map(|p| format!(", {} correlated peers", p))
            .unwrap_or_default();

        let (fallback, fallback_name) = if ctx.has_group_column {
            (ImputationMethod::GroupMedian, "group median")
        } else {
            (ImputationMethod::Median, "median")
        };

        if n < cfg.small_dataset_rows {
            return choice(
                fallback,
                format!(
                    "small table (n={} < {}), missing {:.1}%{}: KNN/MICE unstable, using {}",
                    n, cfg.small_dataset_rows, pct, peer_note, fallback_name
                ),
            );
        }

        if n < cfg.medium_dataset_rows {
            return choice(
                fallback,
                format!(
                    "medium table ({} <= n={} < {}), missing {:.1}%{}: too little data for MICE, using {}",
                    cfg.small_dataset_rows, n, cfg.medium_dataset_rows, pct, peer_note, fallback_name
                ),
            );
        }

        choice(
            ImputationMethod::Knn,
            format!(
                "missing {:.1}%, n={}{}: k={} nearest neighbours over standardized numeric features",
                pct, n, peer_note, cfg.knn_neighbors
            ),
        )
    }

    fn select_categorical(&self, ctx: &SelectionContext<'_>) -> MethodChoice {
        let cfg = &self.config;
        let ratio = ctx.profile.missing_ratio;
        let pct = ratio * 100.0;
        let n = ctx.n_rows;

        if ratio <= cfg.simple_fill_threshold {
            return choice(
                ImputationMethod::Mode,
                format!(
                    "low missingness ({:.1}% <= {:.1}%, n={}): most frequent category",
                    pct,
                    cfg.simple_fill_threshold * 100.0,
                    n
                ),
            );
        }

        if ctx.has_group_column {
            return choice(
                ImputationMethod::GroupMode,
                format!(
                    "missing {:.1}%, n={} with group column: per-group most frequent category",
                    pct, n
                ),
            );
        }

        choice(
            ImputationMethod::Unknown,
            format!(
                "missing {:.1}%, n={} without group column: explicit '{}' label",
                pct, n, cfg.unknown_label
            ),
        )
    }
}

impl MethodSelector for RuleBasedSelector {
    fn select(
        &self,
        ctx: &SelectionContext<'_>,
        peer_count: &mut dyn FnMut() -> usize,
    ) -> MethodChoice {
        let selected = match ctx.profile.logical_type {
            LogicalType::Datetime => choice(
                ImputationMethod::FlagOnly,
                format!(
                    "dates are critical, never imputed (missing {:.1}%, n={}): indicator column only",
                    ctx.profile.missing_ratio * 100.0,
                    ctx.n_rows
                ),
            ),
            LogicalType::Numeric => self.select_numeric(ctx, peer_count),
            LogicalType::Categorical => self.select_categorical(ctx),
        };

        debug!(
            "Column '{}' -> {} ({})",
            ctx.profile.name, selected.method, selected.reason
        );
        selected
    }
}

fn choice(method: ImputationMethod, reason: String) -> MethodChoice {
    MethodChoice { method, reason }
}
