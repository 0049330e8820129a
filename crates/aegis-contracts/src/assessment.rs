//! Intermediate analyzer outputs.
//!
//! Each analyzer produces exactly one of these per verification. They live
//! only as long as the aggregation step and are never persisted.

use serde::{Deserialize, Serialize};

/// Four-tier severity shared by every analyzer. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Map a 0–100 risk score onto the four tiers.
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Severity::Critical
        } else if score >= 60.0 {
            Severity::High
        } else if score >= 30.0 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

// ── RiskAnalyzer ─────────────────────────────────────────────────────────────

/// Per-check sub-scores from the risk analyzer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskBreakdown {
    pub scam: f64,
    pub token: f64,
    pub amount: f64,
    pub leverage: f64,
    pub action: f64,
    pub volatility: f64,
    pub context: f64,
}

/// Output of the risk analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Weighted 0–100 risk score.
    pub score: f64,
    pub severity: Severity,
    pub warnings: Vec<String>,
    pub breakdown: RiskBreakdown,
    /// Names of sub-checks that fell back to their maximum value.
    pub degraded_checks: Vec<String>,
}

impl RiskAssessment {
    /// Conservative stand-in used when the analyzer could not run.
    pub fn degraded(reason: &str) -> Self {
        Self {
            score: 100.0,
            severity: Severity::Critical,
            warnings: vec![format!("Risk analysis degraded: {reason}")],
            breakdown: RiskBreakdown::default(),
            degraded_checks: vec!["risk".to_string()],
        }
    }
}

// ── PatternDetector ──────────────────────────────────────────────────────────

/// Category tag carried by every pattern rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternCategory {
    Scam,
    Manipulation,
    Emotion,
    Hype,
    Technical,
    Behavioral,
}

/// Which analysis pass produced a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternSource {
    Reasoning,
    Strategy,
    Behavioral,
    Temporal,
}

/// One pattern match. Carries the rule name, never the matched text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPattern {
    pub name: String,
    pub category: PatternCategory,
    pub source: PatternSource,
    pub severity: Severity,
    /// Rule weight, 0–100.
    pub weight: f64,
    /// Match confidence, 0–1.
    pub confidence: f64,
    pub description: String,
}

impl DetectedPattern {
    /// Risk contributed by this pattern before capping.
    pub fn contribution(&self) -> f64 {
        self.weight * self.confidence
    }
}

/// Output of the pattern detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternDetection {
    pub score: f64,
    pub severity: Severity,
    pub patterns: Vec<DetectedPattern>,
    pub warnings: Vec<String>,
    pub degraded: bool,
}

impl PatternDetection {
    pub fn degraded(reason: &str) -> Self {
        Self {
            score: 100.0,
            severity: Severity::Critical,
            patterns: Vec::new(),
            warnings: vec![format!("Pattern analysis degraded: {reason}")],
            degraded: true,
        }
    }
}

// ── ComplianceChecker ────────────────────────────────────────────────────────

/// Coarse compliance outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComplianceTier {
    Compliant,
    CompliantWithWarnings,
    NonCompliant,
}

/// Which of the five per-jurisdiction checks produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComplianceCheck {
    AssetRestriction,
    PositionLimits,
    LeverageLimits,
    Reporting,
    Disclosure,
}

/// A hard, mandatory rule breach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceViolation {
    pub jurisdiction: String,
    pub check: ComplianceCheck,
    pub severity: Severity,
    pub message: String,
}

/// Per-check scores, each 0–100 (100 = no findings).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceBreakdown {
    pub asset_restriction: f64,
    pub position_limits: f64,
    pub leverage_limits: f64,
    pub reporting: f64,
    pub disclosure: f64,
}

impl ComplianceBreakdown {
    pub fn mean(&self) -> f64 {
        (self.asset_restriction
            + self.position_limits
            + self.leverage_limits
            + self.reporting
            + self.disclosure)
            / 5.0
    }
}

impl Default for ComplianceBreakdown {
    fn default() -> Self {
        Self {
            asset_restriction: 100.0,
            position_limits: 100.0,
            leverage_limits: 100.0,
            reporting: 100.0,
            disclosure: 100.0,
        }
    }
}

/// Output of the compliance checker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceResult {
    /// False whenever `violations` is non-empty.
    pub compliant: bool,
    /// Mean of the five check scores, 0–100.
    pub score: f64,
    pub tier: ComplianceTier,
    /// Most severe violation, or `Low`/`Medium` when only warnings fired.
    pub severity: Severity,
    pub violations: Vec<ComplianceViolation>,
    pub warnings: Vec<String>,
    pub jurisdictions: Vec<String>,
    pub frameworks: Vec<String>,
    pub breakdown: ComplianceBreakdown,
    pub degraded: bool,
}

impl ComplianceResult {
    /// Conservative stand-in: treated as a critical, non-compliant result.
    pub fn degraded(reason: &str) -> Self {
        Self {
            compliant: false,
            score: 0.0,
            tier: ComplianceTier::NonCompliant,
            severity: Severity::Critical,
            violations: vec![ComplianceViolation {
                jurisdiction: "*".to_string(),
                check: ComplianceCheck::Disclosure,
                severity: Severity::Critical,
                message: "compliance could not be established".to_string(),
            }],
            warnings: vec![format!("Compliance analysis degraded: {reason}")],
            jurisdictions: Vec::new(),
            frameworks: Vec::new(),
            breakdown: ComplianceBreakdown {
                asset_restriction: 0.0,
                position_limits: 0.0,
                leverage_limits: 0.0,
                reporting: 0.0,
                disclosure: 0.0,
            },
            degraded: true,
        }
    }
}
