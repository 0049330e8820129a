//! Named fixture decisions with known verdicts.
//!
//! Each scenario pairs a decision and context with the outcome the default
//! rule tables must produce. They back the workspace tests and the demo.
//!
//! 1. **technical-btc-buy**: small BTC buy with technical reasoning, approved.
//! 2. **guaranteed-profit-claim**: "guaranteed profit" and "risk-free"
//!    reasoning, flagged and not approved.
//! 3. **excessive-leverage**: 150x for a professional investor in the US
//!    (limit 20x), rejected.
//! 4. **reporting-threshold**: a 15,000 buy in the US, compliant with a
//!    reporting warning.

use aegis_contracts::{
    decision::{Decision, InvestorClass, VerificationContext},
    error::AegisResult,
    result::{Recommendation, RiskLevel, SignedVerificationResult},
};

use crate::builder::AegisRuntime;

/// What a scenario's result must satisfy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Expectation {
    /// Approved with at least this trust score.
    Approved { min_trust: f64 },
    /// Not approved, risk level high or critical, and risk plus pattern
    /// score of at least `min_penalty`.
    Flagged { min_penalty: f64 },
    /// Rejected with a compliance violation.
    RejectedForCompliance,
    /// Compliant, with at least one warning.
    CompliantWithWarnings,
}

impl Expectation {
    /// Every unmet condition, as a readable message. Empty means satisfied.
    pub fn failures(&self, signed: &SignedVerificationResult) -> Vec<String> {
        let r = &signed.result;
        let d = &r.details;
        let mut failures = Vec::new();
        let mut require = |ok: bool, message: String| {
            if !ok {
                failures.push(message);
            }
        };

        match *self {
            Expectation::Approved { min_trust } => {
                require(
                    r.recommendation == Recommendation::Approved,
                    format!("expected approved, got {}", r.recommendation.as_str()),
                );
                require(
                    r.trust_score >= min_trust,
                    format!("expected trust >= {min_trust}, got {}", r.trust_score),
                );
            }
            Expectation::Flagged { min_penalty } => {
                let penalty = d.risk_score + d.pattern_score;
                require(
                    r.recommendation != Recommendation::Approved,
                    "expected a non-approved recommendation".to_string(),
                );
                require(
                    r.risk_level >= RiskLevel::High,
                    format!("expected high or critical risk, got {}", r.risk_level.as_str()),
                );
                require(
                    penalty >= min_penalty,
                    format!("expected risk + pattern >= {min_penalty}, got {penalty}"),
                );
            }
            Expectation::RejectedForCompliance => {
                require(
                    r.recommendation == Recommendation::Rejected,
                    format!("expected rejected, got {}", r.recommendation.as_str()),
                );
                require(
                    !d.compliant && d.violation_count > 0,
                    "expected a compliance violation".to_string(),
                );
            }
            Expectation::CompliantWithWarnings => {
                require(d.compliant, "expected a compliant result".to_string());
                require(!r.warnings.is_empty(), "expected at least one warning".to_string());
            }
        }
        failures
    }
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: &'static str,
    pub summary: &'static str,
    pub decision: Decision,
    pub context: Option<VerificationContext>,
    pub expectation: Expectation,
}

#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    pub name: &'static str,
    pub result: SignedVerificationResult,
    pub failures: Vec<String>,
}

impl ScenarioOutcome {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

fn us_context() -> VerificationContext {
    VerificationContext {
        jurisdictions: vec!["US".to_string()],
        ..VerificationContext::default()
    }
}

pub fn technical_btc_buy() -> Scenario {
    let mut decision = Decision::new("buy", "BTC");
    decision.amount = Some(0.1);
    decision.confidence = Some(85.0);
    decision.reasoning = Some("strong technical setup".to_string());
    Scenario {
        name: "technical-btc-buy",
        summary: "Small BTC buy backed by technical reasoning",
        decision,
        context: None,
        expectation: Expectation::Approved { min_trust: 70.0 },
    }
}

pub fn guaranteed_profit_claim() -> Scenario {
    let mut decision = Decision::new("buy", "BTC");
    decision.amount = Some(1.0);
    decision.confidence = Some(90.0);
    decision.reasoning =
        Some("Guaranteed profit on this one, the trade is completely risk-free".to_string());
    Scenario {
        name: "guaranteed-profit-claim",
        summary: "Reasoning promises guaranteed, risk-free returns",
        decision,
        context: None,
        expectation: Expectation::Flagged { min_penalty: 60.0 },
    }
}

pub fn excessive_leverage() -> Scenario {
    let mut decision = Decision::new("buy", "ETH");
    decision.amount = Some(2.0);
    decision.leverage = Some(150.0);
    decision.confidence = Some(80.0);
    Scenario {
        name: "excessive-leverage",
        summary: "150x leverage against a 20x professional limit",
        decision,
        context: Some(VerificationContext {
            investor_class: InvestorClass::Professional,
            ..us_context()
        }),
        expectation: Expectation::RejectedForCompliance,
    }
}

pub fn reporting_threshold() -> Scenario {
    let mut decision = Decision::new("buy", "BTC");
    decision.amount = Some(15_000.0);
    decision.confidence = Some(80.0);
    Scenario {
        name: "reporting-threshold",
        summary: "Amount above the US reporting threshold, otherwise clean",
        decision,
        context: Some(us_context()),
        expectation: Expectation::CompliantWithWarnings,
    }
}

/// All fixtures, in presentation order.
pub fn all() -> Vec<Scenario> {
    vec![
        technical_btc_buy(),
        guaranteed_profit_claim(),
        excessive_leverage(),
        reporting_threshold(),
    ]
}

pub fn by_name(name: &str) -> Option<Scenario> {
    all().into_iter().find(|s| s.name == name)
}

/// Verify one scenario and check its expectation.
pub async fn run(runtime: &AegisRuntime, scenario: &Scenario) -> AegisResult<ScenarioOutcome> {
    let result = runtime
        .engine()
        .verify(scenario.decision.clone(), scenario.context.clone())
        .await?;
    let failures = scenario.expectation.failures(&result);
    Ok(ScenarioOutcome {
        name: scenario.name,
        result,
        failures,
    })
}
