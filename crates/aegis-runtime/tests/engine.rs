//! End-to-end tests of the default engine.

use aegis_contracts::{
    decision::{Decision, VerificationContext},
    error::AegisError,
    result::{Recommendation, RiskLevel},
    rules::RulesUpdate,
};
use aegis_core::EngineConfig;
use aegis_crypto::DIGEST_SCHEME;
use aegis_runtime::{build_default_engine, scenarios, AegisRuntime, EngineBuilder};

fn runtime() -> AegisRuntime {
    build_default_engine(EngineConfig::default()).unwrap()
}

fn decision(asset: &str, amount: f64, confidence: f64) -> Decision {
    let mut d = Decision::new("buy", asset);
    d.amount = Some(amount);
    d.confidence = Some(confidence);
    d
}

// ── Fixtures ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn every_fixture_meets_its_expectation() {
    let runtime = runtime();
    for scenario in scenarios::all() {
        let outcome = scenarios::run(&runtime, &scenario).await.unwrap();
        assert!(outcome.passed(), "{}: {:?}", outcome.name, outcome.failures);
    }
}

#[tokio::test]
async fn technical_buy_is_approved_with_high_trust() {
    let runtime = runtime();
    let s = scenarios::technical_btc_buy();
    let signed = runtime.engine().verify(s.decision, s.context).await.unwrap();
    assert_eq!(signed.result.recommendation, Recommendation::Approved);
    assert_eq!(signed.result.risk_level, RiskLevel::Low);
    assert!(signed.result.verified);
    assert!(signed.result.trust_score >= 70.0);
}

#[tokio::test]
async fn scam_language_is_rejected() {
    let runtime = runtime();
    let s = scenarios::guaranteed_profit_claim();
    let signed = runtime.engine().verify(s.decision, s.context).await.unwrap();
    let details = &signed.result.details;
    assert!(details.patterns_detected.contains(&"guaranteed_returns".to_string()));
    assert!(details.patterns_detected.contains(&"risk_free_claim".to_string()));
    assert_eq!(signed.result.risk_level, RiskLevel::Critical);
    assert_eq!(signed.result.recommendation, Recommendation::Rejected);
    assert!(!signed.result.verified);
}

#[tokio::test]
async fn excessive_leverage_breaches_us_limit() {
    let runtime = runtime();
    let s = scenarios::excessive_leverage();
    let signed = runtime.engine().verify(s.decision, s.context).await.unwrap();
    assert!(!signed.result.details.compliant);
    assert_eq!(signed.result.recommendation, Recommendation::Rejected);
    assert!(signed
        .result
        .warnings
        .iter()
        .any(|w| w.contains("[US] Leverage 150x exceeds the 20x professional limit")));
}

#[tokio::test]
async fn reporting_threshold_only_warns() {
    let runtime = runtime();
    let s = scenarios::reporting_threshold();
    let signed = runtime.engine().verify(s.decision, s.context).await.unwrap();
    assert!(signed.result.details.compliant);
    assert_eq!(signed.result.recommendation, Recommendation::Approved);
    assert!(signed.result.warnings.iter().any(|w| w.contains("reporting threshold")));
}

// ── Batch and idempotence ───────────────────────────────────────────────────

#[tokio::test]
async fn batch_matches_sequential_calls() {
    let runtime = runtime();
    let decisions: Vec<Decision> = scenarios::all().into_iter().map(|s| s.decision).collect();
    let context = Some(VerificationContext {
        jurisdictions: vec!["US".to_string(), "EU".to_string()],
        ..VerificationContext::default()
    });

    let batch = runtime
        .engine()
        .verify_batch(decisions.clone(), context.clone())
        .await
        .unwrap();
    assert_eq!(batch.len(), decisions.len());

    for (d, from_batch) in decisions.into_iter().zip(&batch) {
        let single = runtime.engine().verify(d, context.clone()).await.unwrap();
        assert_eq!(single.result.trust_score, from_batch.result.trust_score);
        assert_eq!(single.result.risk_level, from_batch.result.risk_level);
        assert_eq!(single.result.recommendation, from_batch.result.recommendation);
        assert_eq!(single.result.warnings, from_batch.result.warnings);
    }
}

#[tokio::test]
async fn agent_batch_records_history_in_input_order() {
    fn temporal_runtime() -> AegisRuntime {
        let mut rules = aegis_patterns::default_rules().unwrap();
        rules.temporal.enabled = true;
        rules.temporal.burst_threshold = 3;
        rules.temporal.reversal_threshold = 2;
        EngineBuilder::new(EngineConfig::default())
            .pattern_rules(rules)
            .build()
            .unwrap()
    }

    let decisions: Vec<Decision> = ["buy", "sell", "buy", "sell", "buy", "sell"]
        .iter()
        .map(|action| {
            let mut d = Decision::new(*action, "BTC");
            d.amount = Some(1.0);
            d.confidence = Some(80.0);
            d
        })
        .collect();
    let context = Some(VerificationContext {
        agent_id: Some("desk-7".to_string()),
        ..VerificationContext::default()
    });

    let batched = temporal_runtime();
    let batch = batched
        .engine()
        .verify_batch(decisions.clone(), context.clone())
        .await
        .unwrap();

    let sequential = temporal_runtime();
    for (d, from_batch) in decisions.into_iter().zip(&batch) {
        let single = sequential.engine().verify(d, context.clone()).await.unwrap();
        assert_eq!(
            single.result.details.patterns_detected,
            from_batch.result.details.patterns_detected
        );
        assert_eq!(single.result.trust_score, from_batch.result.trust_score);
    }

    let first = &batch[0].result.details.patterns_detected;
    let last = &batch[5].result.details.patterns_detected;
    assert!(!first.contains(&"rapid_fire_trading".to_string()));
    assert!(last.contains(&"rapid_fire_trading".to_string()));
    assert!(last.contains(&"direction_flip_flop".to_string()));
}

#[tokio::test]
async fn repeated_verification_is_idempotent() {
    let runtime = runtime();
    let s = scenarios::reporting_threshold();
    let a = runtime.engine().verify(s.decision.clone(), s.context.clone()).await.unwrap();
    let b = runtime.engine().verify(s.decision, s.context).await.unwrap();
    assert_eq!(a.result.trust_score, b.result.trust_score);
    assert_eq!(a.result.risk_level, b.result.risk_level);
    assert_eq!(a.result.recommendation, b.result.recommendation);
    assert_ne!(a.nonce, b.nonce);
    // the second call is served from the compliance cache
    assert_eq!(runtime.compliance().cache_stats().hits, 1);
}

#[tokio::test]
async fn oversized_batch_is_rejected() {
    let config = EngineConfig {
        max_batch_size: 2,
        ..EngineConfig::default()
    };
    let runtime = build_default_engine(config).unwrap();
    let decisions = vec![decision("BTC", 1.0, 80.0); 3];
    match runtime.engine().verify_batch(decisions, None).await {
        Err(AegisError::BatchTooLarge { size: 3, max: 2 }) => {}
        other => panic!("expected BatchTooLarge, got {:?}", other.map(|v| v.len())),
    }
}

// ── Signatures, attestation, audit ──────────────────────────────────────────

#[tokio::test]
async fn signed_results_verify_and_detect_tampering() {
    let runtime = runtime();
    let signed = runtime.engine().verify(decision("BTC", 1.0, 80.0), None).await.unwrap();
    assert_eq!(signed.signature.algorithm, "ed25519");
    assert!(runtime.engine().verify_signed(&signed));

    let mut tampered = signed.clone();
    tampered.result.recommendation = Recommendation::Warning;
    assert!(!runtime.engine().verify_signed(&tampered));

    let mut replayed = signed.clone();
    replayed.nonce = "00".repeat(16);
    assert!(!runtime.engine().verify_signed(&replayed));
}

#[tokio::test]
async fn signature_from_another_engine_is_rejected() {
    let a = runtime();
    let b = runtime();
    let signed = a.engine().verify(decision("BTC", 1.0, 80.0), None).await.unwrap();
    assert!(!b.engine().verify_signed(&signed));
}

#[tokio::test]
async fn attestation_is_attached_when_enabled() {
    let runtime = runtime();
    let signed = runtime.engine().verify(decision("BTC", 1.0, 80.0), None).await.unwrap();
    assert!(signed.attestation.is_none());

    let config = EngineConfig {
        attestation_enabled: true,
        ..EngineConfig::default()
    };
    let runtime = EngineBuilder::new(config).build().unwrap();
    let signed = runtime.engine().verify(decision("BTC", 1.0, 80.0), None).await.unwrap();
    let attestation = signed.attestation.unwrap();
    assert_eq!(attestation.scheme, DIGEST_SCHEME);
    assert_eq!(attestation.public_inputs[3], signed.result.recommendation.as_str());
}

#[tokio::test]
async fn audit_trail_records_digests_only() {
    let runtime = runtime();
    for scenario in scenarios::all() {
        scenarios::run(&runtime, &scenario).await.unwrap();
    }

    let audit = runtime.audit().unwrap();
    assert_eq!(audit.len(), 4);
    assert!(audit.verify_integrity());

    let log = audit.export_log();
    let exported = format!("{:?}", log);
    assert!(!exported.contains("Guaranteed profit"));
    assert!(log.events[1].record.reasoning_digest.is_some());
}

#[tokio::test]
async fn audit_trail_stays_bounded_under_sustained_load() {
    let config = EngineConfig {
        max_audit_events: 8,
        ..EngineConfig::default()
    };
    let runtime = build_default_engine(config).unwrap();
    for _ in 0..50 {
        runtime.engine().verify(Decision::new("buy", "BTC"), None).await.unwrap();
    }

    let audit = runtime.audit().unwrap();
    assert_eq!(audit.capacity(), 8);
    assert_eq!(audit.len(), 8);
    assert_eq!(audit.total_written(), 50);
    assert!(audit.verify_integrity());
    assert_eq!(audit.export_log().events[0].sequence, 42);
}

// ── Rule updates and statistics ─────────────────────────────────────────────

#[tokio::test]
async fn compliance_update_takes_effect_immediately() {
    let runtime = runtime();
    let mut d = decision("BTC", 1.0, 80.0);
    d.leverage = Some(10.0);

    let before = runtime.engine().verify(d.clone(), None).await.unwrap();
    assert!(!before.result.details.compliant);

    let mut rules = runtime.compliance().rules();
    if let Some(us) = rules.jurisdictions.get_mut("US") {
        us.retail_max_leverage = 50.0;
    }
    runtime
        .engine()
        .update_rules(RulesUpdate {
            compliance: Some(rules),
            ..RulesUpdate::default()
        })
        .unwrap();

    let after = runtime.engine().verify(d, None).await.unwrap();
    assert!(after.result.details.compliant);
}

#[tokio::test]
async fn invalid_update_keeps_previous_rules() {
    let runtime = runtime();
    let mut risk = runtime.risk().rules();
    risk.weights.scam = 0.9;
    let patterns = runtime.patterns().rules();

    let update = RulesUpdate {
        risk: Some(risk),
        patterns: Some(patterns.clone()),
        compliance: None,
    };
    match runtime.engine().update_rules(update) {
        Err(AegisError::Configuration { .. }) => {}
        other => panic!("expected Configuration, got {:?}", other),
    }
    assert_eq!(runtime.risk().rules(), aegis_risk::default_rules().unwrap());
}

#[tokio::test]
async fn statistics_cover_successes_and_failures() {
    let runtime = runtime();
    runtime.engine().verify(decision("BTC", 1.0, 80.0), None).await.unwrap();
    let invalid = decision("BTC", -5.0, 80.0);
    assert!(runtime.engine().verify(invalid, None).await.is_err());

    let stats = runtime.engine().get_statistics();
    assert_eq!(stats.total_verifications, 2);
    assert!((stats.success_rate - 0.5).abs() < 1e-9);
    assert_eq!(stats.risk_distribution.get(&RiskLevel::Low), Some(&1));
    assert_eq!(runtime.risk().stats().calls, 1);
}
