//! Post-imputation quality checks.
//!
//! This module provides:
//! - PSI and KS drift statistics ([`drift`])
//! - Per-column distribution validation ([`DistributionValidator`])
//! - The PASS/WARN/STOP quality gate ([`Gatekeeper`])

pub mod drift;
mod gate;
mod validator;

pub use gate::Gatekeeper;
pub use validator::DistributionValidator;
