//! # aegis-compliance
//!
//! Multi-jurisdiction compliance checking for the Aegis verification engine.
//!
//! Each requested jurisdiction runs five checks (asset restrictions, position
//! limits, leverage limits, reporting thresholds, disclosure). Findings are
//! merged across jurisdictions, with the strictest score per check winning.

mod checks;
pub mod checker;

pub use checker::{default_rules, CacheStats, JurisdictionComplianceChecker, DEFAULT_RULES};
