//! Property tests for scoring invariants.

use proptest::prelude::*;

use aegis_contracts::{
    assessment::Severity,
    decision::{Decision, InvestorClass, VerificationContext},
    result::{Recommendation, RiskLevel},
};
use aegis_core::{aggregate, EngineConfig};
use aegis_runtime::{build_default_engine, AegisRuntime};

fn severity() -> impl Strategy<Value = Severity> {
    prop_oneof![
        Just(Severity::Low),
        Just(Severity::Medium),
        Just(Severity::High),
        Just(Severity::Critical),
    ]
}

fn action() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("buy"),
        Just("sell"),
        Just("short"),
        Just("options"),
        Just("limit_buy"),
        Just("hold"),
    ]
    .prop_map(str::to_string)
}

fn asset() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("BTC"),
        Just("ETH"),
        Just("XMR"),
        Just("DOGE2MOON"),
        Just("BTC-PERP"),
        Just("USDT"),
    ]
    .prop_map(str::to_string)
}

fn reasoning() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        Just(Some("strong technical setup with support holding".to_string())),
        Just(Some("guaranteed profit, totally risk-free".to_string())),
        Just(Some("everyone is buying, don't miss out".to_string())),
        Just(Some("bearish downtrend and weakness everywhere".to_string())),
        Just(Some("insider info says pump and dump tonight".to_string())),
    ]
}

prop_compose! {
    fn decision()(
        action in action(),
        asset in asset(),
        amount in prop::option::of(0.01f64..2_000_000.0),
        leverage in prop::option::of(1.0f64..200.0),
        confidence in prop::option::of(0.0f64..=100.0),
        portfolio in prop::option::of(1_000.0f64..5_000_000.0),
        reasoning in reasoning(),
    ) -> Decision {
        let mut d = Decision::new(action, asset);
        d.amount = amount;
        d.leverage = leverage;
        d.confidence = confidence;
        d.portfolio_size = portfolio;
        d.reasoning = reasoning;
        d
    }
}

prop_compose! {
    fn context()(
        jurisdictions in prop::sample::subsequence(vec!["US", "EU", "UK", "SG"], 0..=4),
        professional in any::<bool>(),
        insider in any::<bool>(),
        performance in prop::option::of(0.0f64..=1.0),
    ) -> VerificationContext {
        VerificationContext {
            jurisdictions: jurisdictions.into_iter().map(str::to_string).collect(),
            investor_class: if professional { InvestorClass::Professional } else { InvestorClass::Retail },
            insider_information: insider,
            historical_performance: performance,
            ..VerificationContext::default()
        }
    }
}

fn engine_runtime() -> (tokio::runtime::Runtime, AegisRuntime) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    // slow runners must not hit the degraded path
    let config = EngineConfig {
        analysis_deadline_ms: 5_000,
        ..EngineConfig::default()
    };
    let aegis = build_default_engine(config).unwrap();
    (rt, aegis)
}

// ── Aggregation ─────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn risk_level_is_monotonic_in_trust(
        a in 0.0f64..=100.0,
        b in 0.0f64..=100.0,
        severities in prop::collection::vec(severity(), 0..=3),
    ) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let at_low = aggregate::risk_level(low, &severities);
        let at_high = aggregate::risk_level(high, &severities);
        prop_assert!(at_low >= at_high);
    }

    #[test]
    fn critical_level_is_always_rejected(trust in 0.0f64..=100.0, level in severity()) {
        let level = RiskLevel::from(level);
        let rec = aggregate::recommendation(level, trust);
        if level == RiskLevel::Critical {
            prop_assert_eq!(rec, Recommendation::Rejected);
        }
        if rec == Recommendation::Approved {
            prop_assert!(trust >= 50.0);
            prop_assert!(level <= RiskLevel::Medium);
        }
    }
}

// ── End to end ──────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn verified_results_respect_invariants(d in decision(), ctx in prop::option::of(context())) {
        let (rt, aegis) = engine_runtime();
        let signed = rt.block_on(aegis.engine().verify(d, ctx)).unwrap();
        let r = &signed.result;

        prop_assert!((0.0..=100.0).contains(&r.trust_score));
        if r.risk_level == RiskLevel::Critical {
            prop_assert_eq!(r.recommendation, Recommendation::Rejected);
        }
        if !r.details.compliant {
            prop_assert_ne!(r.recommendation, Recommendation::Approved);
        }
        prop_assert_eq!(r.verified, r.recommendation != Recommendation::Rejected);
        prop_assert!(r.warnings.len() <= 20);
        prop_assert!(aegis.engine().verify_signed(&signed));
    }

    #[test]
    fn verification_is_repeatable(d in decision(), ctx in prop::option::of(context())) {
        let (rt, aegis) = engine_runtime();
        let first = rt.block_on(aegis.engine().verify(d.clone(), ctx.clone())).unwrap();
        let second = rt.block_on(aegis.engine().verify(d, ctx)).unwrap();
        prop_assert_eq!(first.result.trust_score, second.result.trust_score);
        prop_assert_eq!(first.result.risk_level, second.result.risk_level);
        prop_assert_eq!(first.result.recommendation, second.result.recommendation);
    }
}
