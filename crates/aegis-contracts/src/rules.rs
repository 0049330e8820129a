//! Rule tables for the three analyzers.
//!
//! Tables are plain data deserialized from TOML. Each analyzer crate embeds a
//! default table; hosts may replace any of them at runtime through
//! `RulesUpdate`. Every table is validated before it is accepted, and a table
//! that fails validation never replaces the one in service.

use std::collections::BTreeMap;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::{
    assessment::{PatternCategory, Severity},
    error::{AegisError, AegisResult},
};

/// Upper bound on compiled program size for a single rule pattern.
const PATTERN_SIZE_LIMIT: usize = 1 << 20;

/// Compile a rule pattern case-insensitively with a bounded program size.
///
/// The `regex` engine matches in linear time, so attacker-controlled text
/// cannot trigger catastrophic backtracking; the size limit bounds the
/// automaton itself.
pub fn compile_pattern(source: &str) -> AegisResult<Regex> {
    RegexBuilder::new(source)
        .case_insensitive(true)
        .size_limit(PATTERN_SIZE_LIMIT)
        .build()
        .map_err(|e| AegisError::configuration(format!("invalid pattern '{source}': {e}")))
}

fn parse_toml<T: for<'de> Deserialize<'de>>(s: &str, what: &str) -> AegisResult<T> {
    toml::from_str(s)
        .map_err(|e| AegisError::configuration(format!("failed to parse {what} TOML: {e}")))
}

fn ensure(condition: bool, reason: impl FnOnce() -> String) -> AegisResult<()> {
    if condition {
        Ok(())
    } else {
        Err(AegisError::configuration(reason()))
    }
}

fn ensure_positive(value: f64, field: &str) -> AegisResult<()> {
    ensure(value.is_finite() && value > 0.0, || {
        format!("{field} must be a positive number, got {value}")
    })
}

fn ensure_fraction(value: f64, field: &str) -> AegisResult<()> {
    ensure(value.is_finite() && value > 0.0 && value <= 1.0, || {
        format!("{field} must be in (0, 1], got {value}")
    })
}

// ── Risk rules ───────────────────────────────────────────────────────────────

/// Weights used to combine the seven risk sub-scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskWeights {
    pub scam: f64,
    pub token: f64,
    pub amount: f64,
    pub leverage: f64,
    pub action: f64,
    pub volatility: f64,
    pub context: f64,
}

impl RiskWeights {
    pub fn total(&self) -> f64 {
        self.scam
            + self.token
            + self.amount
            + self.leverage
            + self.action
            + self.volatility
            + self.context
    }
}

/// Rule table for the risk analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRules {
    /// Patterns matched against reasoning and strategy text.
    pub scam_patterns: Vec<String>,
    /// Penalty added per scam pattern hit.
    pub scam_penalty: f64,
    /// Symbols that are high risk outright.
    pub risk_tokens: Vec<String>,
    /// Substrings that mark meme or copycat symbols.
    pub meme_markers: Vec<String>,
    /// Large, liquid assets treated as lower volatility.
    pub major_assets: Vec<String>,
    pub max_amount: f64,
    pub max_leverage: f64,
    pub action_risk: BTreeMap<String, f64>,
    /// Risk for action keywords missing from `action_risk`.
    pub default_action_risk: f64,
    /// Ratio below which historical performance counts as poor.
    pub poor_performance_ratio: f64,
    /// Trades per hour above which frequency counts as high.
    pub high_trade_frequency: u32,
    /// UTC hours `[start, end)` considered off-hours.
    pub off_hours_utc: [u32; 2],
    /// Sub-scores at or above this value produce a warning.
    pub warning_threshold: f64,
    pub weights: RiskWeights,
}

impl RiskRules {
    pub fn from_toml_str(s: &str) -> AegisResult<Self> {
        let rules: Self = parse_toml(s, "risk rules")?;
        rules.validate()?;
        Ok(rules)
    }

    pub fn validate(&self) -> AegisResult<()> {
        for pattern in &self.scam_patterns {
            compile_pattern(pattern)?;
        }
        ensure_positive(self.scam_penalty, "scam_penalty")?;
        ensure_positive(self.max_amount, "max_amount")?;
        ensure_positive(self.max_leverage, "max_leverage")?;
        ensure_fraction(self.poor_performance_ratio, "poor_performance_ratio")?;
        ensure(
            self.off_hours_utc[0] < 24 && self.off_hours_utc[1] <= 24,
            || format!("off_hours_utc must be hours in 0..=24, got {:?}", self.off_hours_utc),
        )?;
        for (action, risk) in &self.action_risk {
            ensure((0.0..=100.0).contains(risk), || {
                format!("action_risk for '{action}' must be within 0..=100, got {risk}")
            })?;
        }
        let total = self.weights.total();
        ensure((total - 1.0).abs() < 1e-6, || {
            format!("risk weights must sum to 1.0, got {total}")
        })?;
        Ok(())
    }
}

// ── Pattern rules ────────────────────────────────────────────────────────────

/// One named pattern in a reasoning or strategy table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRule {
    pub name: String,
    pub pattern: String,
    pub category: PatternCategory,
    /// 0–100 risk weight applied at full confidence.
    pub weight: f64,
    pub severity: Severity,
    pub description: String,
}

/// Thresholds and phrase lists for the behavioral heuristics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehavioralRules {
    pub overconfidence_threshold: f64,
    /// Stated confidence below this adds risk.
    pub low_confidence_threshold: f64,
    pub bearish_terms: String,
    pub bullish_terms: String,
    pub herd_terms: String,
    pub short_timeframe: String,
    pub long_timeframe: String,
    pub long_horizon_strategy: String,
    pub short_horizon_strategy: String,
    /// Fraction of portfolio at which a position is flagged.
    pub position_warning_fraction: f64,
    /// Fraction of portfolio at which a position is flagged as severe.
    pub position_critical_fraction: f64,
    pub min_risk_reward: f64,
}

/// Bounded per-agent decision history used by the temporal checks.
///
/// A decision enters its agent's history when the pattern detector sees it,
/// before the engine signs the result, so a call that later fails still
/// counts toward the window. Batches that name an agent are verified in
/// input order, which keeps them equal to the same sequence of single calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalRules {
    pub enabled: bool,
    pub window_secs: u64,
    pub per_agent_capacity: usize,
    pub max_agents: usize,
    /// Decisions within the window at which rapid-fire trading is flagged.
    pub burst_threshold: usize,
    /// Direction reversals on one asset within the window at which flip-flopping is flagged.
    pub reversal_threshold: usize,
}

impl Default for TemporalRules {
    fn default() -> Self {
        Self {
            enabled: false,
            window_secs: 3600,
            per_agent_capacity: 64,
            max_agents: 1024,
            burst_threshold: 10,
            reversal_threshold: 3,
        }
    }
}

/// Rule table for the pattern detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRules {
    pub reasoning: Vec<PatternRule>,
    pub strategy: Vec<PatternRule>,
    pub behavioral: BehavioralRules,
    #[serde(default)]
    pub temporal: TemporalRules,
}

impl PatternRules {
    pub fn from_toml_str(s: &str) -> AegisResult<Self> {
        let rules: Self = parse_toml(s, "pattern rules")?;
        rules.validate()?;
        Ok(rules)
    }

    pub fn validate(&self) -> AegisResult<()> {
        for rule in self.reasoning.iter().chain(&self.strategy) {
            compile_pattern(&rule.pattern)?;
            ensure((0.0..=100.0).contains(&rule.weight), || {
                format!("pattern '{}' weight must be within 0..=100", rule.name)
            })?;
        }
        let b = &self.behavioral;
        for source in [
            &b.bearish_terms,
            &b.bullish_terms,
            &b.herd_terms,
            &b.short_timeframe,
            &b.long_timeframe,
            &b.long_horizon_strategy,
            &b.short_horizon_strategy,
        ] {
            compile_pattern(source)?;
        }
        ensure_fraction(b.position_warning_fraction, "position_warning_fraction")?;
        ensure_fraction(b.position_critical_fraction, "position_critical_fraction")?;
        ensure(b.position_warning_fraction < b.position_critical_fraction, || {
            "position_warning_fraction must be below position_critical_fraction".to_string()
        })?;
        ensure_positive(b.min_risk_reward, "min_risk_reward")?;
        let t = &self.temporal;
        if t.enabled {
            ensure(t.window_secs > 0, || "temporal.window_secs must be positive".to_string())?;
            ensure(t.per_agent_capacity > 0 && t.max_agents > 0, || {
                "temporal capacities must be positive".to_string()
            })?;
        }
        Ok(())
    }
}

// ── Compliance rules ─────────────────────────────────────────────────────────

/// Whether a jurisdiction's limits are hard violations or advisory warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnforcementMode {
    Mandatory,
    Advisory,
}

/// Treatment of an asset class matched by a heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetPolicy {
    Allow,
    Warn,
    Prohibit,
}

/// Limits and restrictions for one jurisdiction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JurisdictionRules {
    pub frameworks: Vec<String>,
    pub enforcement: EnforcementMode,
    pub restricted_assets: Vec<String>,
    pub derivative_markers: Vec<String>,
    pub derivative_actions: Vec<String>,
    pub derivative_policy: AssetPolicy,
    pub stablecoin_markers: Vec<String>,
    pub stablecoin_policy: AssetPolicy,
    pub max_position_size: f64,
    pub max_concentration: f64,
    /// Fraction of a limit at which a near-limit warning is raised.
    pub near_limit_ratio: f64,
    pub retail_max_leverage: f64,
    pub professional_max_leverage: f64,
    pub reporting_threshold: f64,
}

/// Rule table for the compliance checker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceRules {
    pub default_jurisdictions: Vec<String>,
    pub cache_capacity: usize,
    pub jurisdictions: BTreeMap<String, JurisdictionRules>,
}

impl ComplianceRules {
    pub fn from_toml_str(s: &str) -> AegisResult<Self> {
        let rules: Self = parse_toml(s, "compliance rules")?;
        rules.validate()?;
        Ok(rules)
    }

    pub fn validate(&self) -> AegisResult<()> {
        ensure(!self.default_jurisdictions.is_empty(), || {
            "default_jurisdictions must not be empty".to_string()
        })?;
        ensure(self.cache_capacity > 0, || "cache_capacity must be positive".to_string())?;
        for code in &self.default_jurisdictions {
            ensure(self.jurisdictions.contains_key(code), || {
                format!("default jurisdiction '{code}' has no rules")
            })?;
        }
        for (code, j) in &self.jurisdictions {
            ensure_positive(j.max_position_size, &format!("{code}.max_position_size"))?;
            ensure_fraction(j.max_concentration, &format!("{code}.max_concentration"))?;
            ensure_fraction(j.near_limit_ratio, &format!("{code}.near_limit_ratio"))?;
            ensure_positive(j.retail_max_leverage, &format!("{code}.retail_max_leverage"))?;
            ensure_positive(
                j.professional_max_leverage,
                &format!("{code}.professional_max_leverage"),
            )?;
            ensure_positive(j.reporting_threshold, &format!("{code}.reporting_threshold"))?;
        }
        Ok(())
    }
}

// ── Runtime updates ──────────────────────────────────────────────────────────

/// A partial replacement of the engine's rule tables.
///
/// Absent tables are left untouched. The update is applied only if every
/// present table validates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesUpdate {
    pub risk: Option<RiskRules>,
    pub patterns: Option<PatternRules>,
    pub compliance: Option<ComplianceRules>,
}

impl RulesUpdate {
    pub fn validate(&self) -> AegisResult<()> {
        if let Some(risk) = &self.risk {
            risk.validate()?;
        }
        if let Some(patterns) = &self.patterns {
            patterns.validate()?;
        }
        if let Some(compliance) = &self.compliance {
            compliance.validate()?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.risk.is_none() && self.patterns.is_none() && self.compliance.is_none()
    }
}
