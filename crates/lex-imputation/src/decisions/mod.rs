//! Decision-making module for imputation method selection.
//!
//! A [`MethodSelector`] maps a column's profile and the table context to an
//! imputation method plus an audit reason. The rule-based policy is the only
//! implementation shipped with the crate.

mod rule_engine;

pub use rule_engine::RuleBasedSelector;

use crate::types::{ColumnProfile, ImputationMethod};

/// Inputs a selector sees for one column.
#[derive(Debug, Clone, Copy)]
pub struct SelectionContext<'a> {
    pub profile: &'a ColumnProfile,
    /// Row count of the table.
    pub n_rows: usize,
    /// A usable group column exists for this column.
    pub has_group_column: bool,
}

/// Method chosen for a column and why.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodChoice {
    pub method: ImputationMethod,
    pub reason: String,
}

/// Trait for imputation policies.
///
/// `peer_count` lazily yields the number of numeric peers correlated with the
/// column; implementations call it only when the answer matters.
pub trait MethodSelector: Send + Sync {
    fn select(
        &self,
        ctx: &SelectionContext<'_>,
        peer_count: &mut dyn FnMut() -> usize,
    ) -> MethodChoice;
}
