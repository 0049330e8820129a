//! Aggregation of the three analyzer outputs into one verdict.
//!
//! Every function here is pure. Risk level depends only on the trust score and
//! the sub-assessment severities; recommendation depends only on risk level
//! and trust score.

use aegis_contracts::{
    assessment::{ComplianceResult, PatternDetection, RiskAssessment, Severity},
    result::{Recommendation, RiskLevel},
};

use crate::config::EngineConfig;

/// Everything the trust computation reads.
#[derive(Debug, Clone, Copy)]
pub struct AggregateInputs<'a> {
    pub risk: &'a RiskAssessment,
    pub patterns: &'a PatternDetection,
    pub compliance: &'a ComplianceResult,
    /// Sanitized stated confidence, 0–100.
    pub confidence: Option<f64>,
    pub historical_performance: Option<f64>,
}

/// Linear penalty for stated confidence below the threshold.
pub fn confidence_penalty(confidence: Option<f64>, config: &EngineConfig) -> f64 {
    let threshold = config.confidence_penalty_threshold;
    match confidence {
        Some(c) if c < threshold && threshold > 0.0 => {
            (threshold - c.max(0.0)) / threshold * config.max_confidence_penalty
        }
        _ => 0.0,
    }
}

/// Start at 100 and subtract each source of risk, clamped to [0, 100].
///
/// The score is rounded to two decimals so the signed value is stable.
pub fn trust_score(inputs: &AggregateInputs<'_>, config: &EngineConfig) -> f64 {
    let mut score = 100.0;
    score -= inputs.risk.score;
    score -= inputs.patterns.score;
    if !inputs.compliance.compliant {
        score -= config.compliance_penalty;
    }
    score -= confidence_penalty(inputs.confidence, config);
    if matches!(inputs.historical_performance, Some(p) if p < config.poor_performance_threshold)
    {
        score -= config.poor_performance_penalty;
    }
    let clamped = if score.is_finite() { score.clamp(0.0, 100.0) } else { 0.0 };
    (clamped * 100.0).round() / 100.0
}

fn level_from_trust(trust: f64) -> RiskLevel {
    if trust < 30.0 {
        RiskLevel::Critical
    } else if trust < 50.0 {
        RiskLevel::High
    } else if trust < 70.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Risk level from trust, never looser than the most severe sub-assessments.
pub fn risk_level(trust: f64, severities: &[Severity]) -> RiskLevel {
    severities
        .iter()
        .copied()
        .map(RiskLevel::from)
        .fold(level_from_trust(trust), RiskLevel::max)
}

pub fn recommendation(level: RiskLevel, trust: f64) -> Recommendation {
    if level == RiskLevel::Critical || trust < 20.0 {
        Recommendation::Rejected
    } else if level == RiskLevel::High || trust < 50.0 {
        Recommendation::Warning
    } else {
        Recommendation::Approved
    }
}

/// Merge analyzer warnings in a stable order, dropping duplicates, bounded by `max`.
pub fn collect_warnings<'a>(sources: impl IntoIterator<Item = &'a String>, max: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for warning in sources {
        if out.len() >= max {
            break;
        }
        if !out.iter().any(|w| w == warning) {
            out.push(warning.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use aegis_contracts::assessment::{
        ComplianceBreakdown, ComplianceTier, RiskBreakdown,
    };

    use super::*;

    fn risk(score: f64, severity: Severity) -> RiskAssessment {
        RiskAssessment {
            score,
            severity,
            warnings: vec![],
            breakdown: RiskBreakdown::default(),
            degraded_checks: vec![],
        }
    }

    fn patterns(score: f64, severity: Severity) -> PatternDetection {
        PatternDetection {
            score,
            severity,
            patterns: vec![],
            warnings: vec![],
            degraded: false,
        }
    }

    fn compliance(compliant: bool) -> ComplianceResult {
        ComplianceResult {
            compliant,
            score: 100.0,
            tier: if compliant {
                ComplianceTier::Compliant
            } else {
                ComplianceTier::NonCompliant
            },
            severity: Severity::Low,
            violations: vec![],
            warnings: vec![],
            jurisdictions: vec!["US".to_string()],
            frameworks: vec![],
            breakdown: ComplianceBreakdown::default(),
            degraded: false,
        }
    }

    #[test]
    fn trust_subtracts_every_penalty() {
        let config = EngineConfig::default();
        let r = risk(10.0, Severity::Low);
        let p = patterns(5.0, Severity::Low);
        let c = compliance(false);
        let inputs = AggregateInputs {
            risk: &r,
            patterns: &p,
            compliance: &c,
            confidence: Some(35.0),
            historical_performance: Some(0.4),
        };
        // 100 - 10 - 5 - 20 - 17.5 - 10
        assert_eq!(trust_score(&inputs, &config), 37.5);
    }

    #[test]
    fn trust_is_clamped_at_zero() {
        let config = EngineConfig::default();
        let r = risk(100.0, Severity::Critical);
        let p = patterns(100.0, Severity::Critical);
        let c = compliance(false);
        let inputs = AggregateInputs {
            risk: &r,
            patterns: &p,
            compliance: &c,
            confidence: Some(0.0),
            historical_performance: Some(0.0),
        };
        assert_eq!(trust_score(&inputs, &config), 0.0);
    }

    #[test]
    fn confidence_penalty_is_linear_below_threshold() {
        let config = EngineConfig::default();
        assert_eq!(confidence_penalty(None, &config), 0.0);
        assert_eq!(confidence_penalty(Some(70.0), &config), 0.0);
        assert_eq!(confidence_penalty(Some(0.0), &config), 35.0);
        assert!((confidence_penalty(Some(35.0), &config) - 17.5).abs() < 1e-9);
    }

    #[test]
    fn risk_level_follows_trust_bands() {
        assert_eq!(risk_level(95.0, &[]), RiskLevel::Low);
        assert_eq!(risk_level(69.9, &[]), RiskLevel::Medium);
        assert_eq!(risk_level(49.9, &[]), RiskLevel::High);
        assert_eq!(risk_level(29.9, &[]), RiskLevel::Critical);
    }

    #[test]
    fn risk_level_is_never_looser_than_a_sub_assessment() {
        let level = risk_level(95.0, &[Severity::Low, Severity::High, Severity::Medium]);
        assert_eq!(level, RiskLevel::High);

        let level = risk_level(95.0, &[Severity::Critical, Severity::Low, Severity::Low]);
        assert_eq!(level, RiskLevel::Critical);
    }

    #[test]
    fn recommendation_table() {
        assert_eq!(recommendation(RiskLevel::Critical, 90.0), Recommendation::Rejected);
        assert_eq!(recommendation(RiskLevel::Low, 19.0), Recommendation::Rejected);
        assert_eq!(recommendation(RiskLevel::High, 90.0), Recommendation::Warning);
        assert_eq!(recommendation(RiskLevel::Medium, 45.0), Recommendation::Warning);
        assert_eq!(recommendation(RiskLevel::Medium, 65.0), Recommendation::Approved);
        assert_eq!(recommendation(RiskLevel::Low, 90.0), Recommendation::Approved);
    }

    #[test]
    fn warnings_are_deduplicated_and_bounded() {
        let raw: Vec<String> = (0..30).map(|i| format!("w{}", i % 25)).collect();
        let merged = collect_warnings(&raw, 20);
        assert_eq!(merged.len(), 20);
        assert_eq!(merged[0], "w0");

        let dupes = vec!["a".to_string(), "a".to_string(), "b".to_string()];
        assert_eq!(collect_warnings(&dupes, 20), vec!["a", "b"]);
    }
}
