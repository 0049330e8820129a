//! # aegis-risk
//!
//! Rule-based risk scoring for the Aegis verification engine.
//!
//! `RuleBasedRiskAnalyzer` combines seven weighted sub-checks into one 0–100
//! risk score. Its default rule table is embedded from `rules/default.toml`.

pub mod analyzer;

pub use analyzer::{default_rules, RiskAnalyzerStats, RuleBasedRiskAnalyzer, DEFAULT_RULES};
