//! The local verification engine.
//!
//! Every call runs the same pipeline, with no network I/O anywhere:
//!
//!   Validate → Sanitize → {Risk ∥ Patterns ∥ Compliance} → Aggregate → Sign → Audit
//!
//! The three analyzers are independent. They run as blocking tasks over a
//! shared, already-sanitized decision and are joined against one deadline.
//! A failed or late analyzer either degrades to a maximum-risk stand-in or
//! fails the call, depending on `FailureMode`; it never degrades toward
//! approval.

use std::{
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::Utc;
use futures::future::try_join_all;
use tokio::{task::JoinError, time::error::Elapsed};
use tracing::{debug, info, warn};

use aegis_contracts::{
    assessment::{ComplianceResult, PatternDetection, RiskAssessment},
    audit::AuditRecord,
    decision::{Decision, VerificationContext},
    error::{AegisError, AegisResult},
    result::{
        EngineStatistics, Recommendation, SignedVerificationResult, VerificationDetails,
        VerificationResult,
    },
    rules::RulesUpdate,
};

use crate::{
    aggregate::{self, AggregateInputs},
    config::{EngineConfig, FailureMode},
    metrics::InMemoryMetrics,
    traits::{
        AttestationGenerator, AuditWriter, ComplianceChecker, InputValidator, MetricsSink,
        PatternDetector, ResultSigner, RiskAnalyzer,
    },
};

/// Version string stamped into every signed result.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

const CHECKS_RUN: [&str; 5] = ["validation", "sanitization", "risk", "patterns", "compliance"];

/// Orchestrates validation, the three analyzers, aggregation, and signing.
///
/// The engine holds no per-call state. Rule tables live inside the analyzers
/// and change only through `update_rules`.
pub struct LocalVerificationEngine {
    config: EngineConfig,
    validator: Arc<dyn InputValidator>,
    risk: Arc<dyn RiskAnalyzer>,
    patterns: Arc<dyn PatternDetector>,
    compliance: Arc<dyn ComplianceChecker>,
    signer: Arc<dyn ResultSigner>,
    attestation: Option<Arc<dyn AttestationGenerator>>,
    audit: Option<Arc<dyn AuditWriter>>,
    metrics: Arc<dyn MetricsSink>,
    started_at: Instant,
}

impl LocalVerificationEngine {
    /// Create an engine from validated configuration and its collaborators.
    ///
    /// Uses an `InMemoryMetrics` sink, no attestation, and no audit writer
    /// until the corresponding `with_*` method is called.
    pub fn new(
        config: EngineConfig,
        validator: Arc<dyn InputValidator>,
        risk: Arc<dyn RiskAnalyzer>,
        patterns: Arc<dyn PatternDetector>,
        compliance: Arc<dyn ComplianceChecker>,
        signer: Arc<dyn ResultSigner>,
    ) -> AegisResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            validator,
            risk,
            patterns,
            compliance,
            signer,
            attestation: None,
            audit: None,
            metrics: Arc::new(InMemoryMetrics::new()),
            started_at: Instant::now(),
        })
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditWriter>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_attestation(mut self, generator: Arc<dyn AttestationGenerator>) -> Self {
        self.attestation = Some(generator);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Verify one decision and return the signed result.
    ///
    /// # Errors
    ///
    /// - `Validation` for malformed input (nothing else runs).
    /// - `Analysis` / `DeadlineExceeded` when an analyzer fails and the engine
    ///   runs fail-closed.
    /// - `Cryptographic` when the result cannot be signed.
    /// - `AuditWriteFailed` when auditing is enabled and the write fails.
    pub async fn verify(
        &self,
        decision: Decision,
        context: Option<VerificationContext>,
    ) -> AegisResult<SignedVerificationResult> {
        let started = Instant::now();
        let outcome = self.run_pipeline(decision, context, started).await;
        let level = outcome.as_ref().ok().map(|s| s.result.risk_level);
        self.metrics.record(started.elapsed(), level);
        outcome
    }

    /// Verify every decision against the same context.
    ///
    /// Results are returned in input order, and each equals what `verify`
    /// would return for that decision alone. The first failing item fails
    /// the batch.
    ///
    /// When the context names an agent, items run one after another so the
    /// agent's decision history is recorded in input order, exactly as a
    /// series of `verify` calls would record it.
    pub async fn verify_batch(
        &self,
        decisions: Vec<Decision>,
        context: Option<VerificationContext>,
    ) -> AegisResult<Vec<SignedVerificationResult>> {
        if decisions.len() > self.config.max_batch_size {
            warn!(
                size = decisions.len(),
                max = self.config.max_batch_size,
                "batch rejected"
            );
            return Err(AegisError::BatchTooLarge {
                size: decisions.len(),
                max: self.config.max_batch_size,
            });
        }

        if context.as_ref().is_some_and(|c| c.agent_id.is_some()) {
            debug!(size = decisions.len(), "verifying agent batch in order");
            let mut results = Vec::with_capacity(decisions.len());
            for decision in decisions {
                results.push(self.verify(decision, context.clone()).await?);
            }
            return Ok(results);
        }

        debug!(size = decisions.len(), "verifying batch");
        try_join_all(
            decisions
                .into_iter()
                .map(|decision| self.verify(decision, context.clone())),
        )
        .await
    }

    /// Replace any subset of the rule tables.
    ///
    /// Every supplied table is validated before any is applied, so a bad
    /// update leaves the rules in service untouched.
    pub fn update_rules(&self, update: RulesUpdate) -> AegisResult<()> {
        update.validate()?;

        let RulesUpdate { risk, patterns, compliance } = update;
        let mut updated = Vec::new();
        if let Some(rules) = risk {
            self.risk.update_rules(rules)?;
            updated.push("risk");
        }
        if let Some(rules) = patterns {
            self.patterns.update_rules(rules)?;
            updated.push("patterns");
        }
        if let Some(rules) = compliance {
            self.compliance.update_rules(rules)?;
            updated.push("compliance");
        }

        info!(tables = ?updated, "rule tables updated");
        Ok(())
    }

    pub fn get_statistics(&self) -> EngineStatistics {
        let snap = self.metrics.snapshot();
        EngineStatistics {
            version: ENGINE_VERSION.to_string(),
            uptime_secs: self.started_at.elapsed().as_secs(),
            total_verifications: snap.total,
            average_latency_ms: snap.average_latency_ms(),
            success_rate: snap.success_rate(),
            risk_distribution: snap.risk_distribution,
        }
    }

    /// Check a signed result produced by this engine's signer.
    pub fn verify_signed(&self, signed: &SignedVerificationResult) -> bool {
        self.signer
            .verify_signature(&signed.result, &signed.nonce, &signed.signature)
    }

    // ── Pipeline ─────────────────────────────────────────────────────────────

    async fn run_pipeline(
        &self,
        decision: Decision,
        context: Option<VerificationContext>,
        started: Instant,
    ) -> AegisResult<SignedVerificationResult> {
        // ── Validate, then sanitize ─────────────────────────────────────────
        if let Err(e) = self.validator.validate(&decision) {
            warn!(error = %e, "decision failed validation");
            return Err(e);
        }
        let decision = Arc::new(self.validator.sanitize(decision));
        let context = Arc::new(context);

        debug!(
            action = %decision.action,
            asset = %decision.asset,
            "decision sanitized, running analyzers"
        );

        // ── Fan out ─────────────────────────────────────────────────────────
        let (risk, patterns, compliance) =
            self.run_analyzers(Arc::clone(&decision), Arc::clone(&context)).await?;

        // ── Aggregate ───────────────────────────────────────────────────────
        let result = self.aggregate(
            &decision,
            context.as_ref().as_ref(),
            &risk,
            &patterns,
            &compliance,
        );

        // ── Sign ────────────────────────────────────────────────────────────
        let nonce = self.signer.generate_nonce();
        let signature = self.signer.sign_result(&result, &nonce)?;
        let fingerprint = self.signer.hash_decision(&decision);
        let verification_id = self.verification_id(&fingerprint, &result);

        let attestation = match (&self.attestation, self.config.attestation_enabled) {
            (Some(generator), true) => Some(generator.attest(&result)?),
            _ => None,
        };

        // ── Audit ───────────────────────────────────────────────────────────
        if self.config.audit_enabled {
            if let Some(audit) = &self.audit {
                let record = self.audit_record(&verification_id, fingerprint, &decision, &result);
                audit.write(&record)?;
            }
        }

        info!(
            verification_id = %verification_id,
            trust_score = result.trust_score,
            risk_level = result.risk_level.as_str(),
            recommendation = result.recommendation.as_str(),
            "verification complete"
        );

        Ok(SignedVerificationResult {
            verification_id,
            result,
            signature,
            nonce,
            processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            engine_version: ENGINE_VERSION.to_string(),
            attestation,
        })
    }

    async fn run_analyzers(
        &self,
        decision: Arc<Decision>,
        context: Arc<Option<VerificationContext>>,
    ) -> AegisResult<(RiskAssessment, PatternDetection, ComplianceResult)> {
        let deadline = tokio::time::Instant::now()
            + Duration::from_millis(self.config.analysis_deadline_ms);

        let risk_task = {
            let analyzer = Arc::clone(&self.risk);
            let (d, c) = (Arc::clone(&decision), Arc::clone(&context));
            tokio::task::spawn_blocking(move || analyzer.analyze(&d, c.as_ref().as_ref()))
        };
        let pattern_task = {
            let detector = Arc::clone(&self.patterns);
            let (d, c) = (Arc::clone(&decision), Arc::clone(&context));
            tokio::task::spawn_blocking(move || detector.detect(&d, c.as_ref().as_ref()))
        };
        let compliance_task = {
            let checker = Arc::clone(&self.compliance);
            let (d, c) = (decision, context);
            tokio::task::spawn_blocking(move || checker.check(&d, c.as_ref().as_ref()))
        };

        let (risk, patterns, compliance) = tokio::join!(
            bounded(deadline, risk_task),
            bounded(deadline, pattern_task),
            bounded(deadline, compliance_task),
        );

        Ok((
            self.settle("risk", risk, RiskAssessment::degraded)?,
            self.settle("patterns", patterns, PatternDetection::degraded)?,
            self.settle("compliance", compliance, ComplianceResult::degraded)?,
        ))
    }

    /// Turn one analyzer outcome into a value or an error per `FailureMode`.
    fn settle<T>(
        &self,
        component: &str,
        outcome: Result<Result<AegisResult<T>, JoinError>, Elapsed>,
        fallback: fn(&str) -> T,
    ) -> AegisResult<T> {
        let (reason, late) = match outcome {
            Ok(Ok(Ok(value))) => return Ok(value),
            Ok(Ok(Err(e))) => (e.to_string(), false),
            Ok(Err(join)) if join.is_panic() => ("analyzer panicked".to_string(), false),
            Ok(Err(_)) => ("analyzer task was cancelled".to_string(), false),
            Err(_) => ("analyzer exceeded the deadline".to_string(), true),
        };

        warn!(component, reason = %reason, mode = ?self.config.failure_mode, "analyzer failed");
        match self.config.failure_mode {
            FailureMode::Degrade => Ok(fallback(&reason)),
            FailureMode::FailClosed if late => Err(AegisError::DeadlineExceeded {
                component: component.to_string(),
                deadline_ms: self.config.analysis_deadline_ms,
            }),
            FailureMode::FailClosed => Err(AegisError::analysis(component, reason)),
        }
    }

    fn aggregate(
        &self,
        decision: &Decision,
        context: Option<&VerificationContext>,
        risk: &RiskAssessment,
        patterns: &PatternDetection,
        compliance: &ComplianceResult,
    ) -> VerificationResult {
        let inputs = AggregateInputs {
            risk,
            patterns,
            compliance,
            confidence: decision.confidence,
            historical_performance: context.and_then(|c| c.historical_performance),
        };
        let trust_score = aggregate::trust_score(&inputs, &self.config);
        let risk_level = aggregate::risk_level(
            trust_score,
            &[risk.severity, patterns.severity, compliance.severity],
        );
        let recommendation = aggregate::recommendation(risk_level, trust_score);

        let mut engine_warnings = Vec::new();
        if aggregate::confidence_penalty(decision.confidence, &self.config) > 0.0 {
            engine_warnings.push("Low stated confidence reduces trust".to_string());
        }
        if inputs
            .historical_performance
            .is_some_and(|p| p < self.config.poor_performance_threshold)
        {
            engine_warnings.push("Poor historical performance reduces trust".to_string());
        }

        let violation_messages: Vec<String> =
            compliance.violations.iter().map(|v| v.message.clone()).collect();
        let warnings = aggregate::collect_warnings(
            violation_messages
                .iter()
                .chain(&risk.warnings)
                .chain(&patterns.warnings)
                .chain(&compliance.warnings)
                .chain(&engine_warnings),
            self.config.max_warnings,
        );

        let mut degraded_checks = risk.degraded_checks.clone();
        if patterns.degraded {
            degraded_checks.push("patterns".to_string());
        }
        if compliance.degraded {
            degraded_checks.push("compliance".to_string());
        }

        VerificationResult {
            verified: recommendation != Recommendation::Rejected,
            trust_score,
            risk_level,
            recommendation,
            warnings,
            timestamp: Utc::now(),
            details: VerificationDetails {
                checks_run: CHECKS_RUN.iter().map(|s| s.to_string()).collect(),
                risk_score: risk.score,
                risk_severity: Some(risk.severity),
                pattern_score: patterns.score,
                pattern_severity: Some(patterns.severity),
                patterns_detected: patterns.patterns.iter().map(|p| p.name.clone()).collect(),
                compliance_score: compliance.score,
                compliant: compliance.compliant,
                violation_count: compliance.violations.len(),
                jurisdictions: compliance.jurisdictions.clone(),
                frameworks: compliance.frameworks.clone(),
                degraded_checks,
            },
        }
    }

    /// Deterministic id over the decision fingerprint and the verdict.
    ///
    /// Amounts and free text never reach the fingerprint, so the id cannot be
    /// used to recover trading intent.
    fn verification_id(&self, fingerprint: &str, result: &VerificationResult) -> String {
        let material = format!(
            "{}|{:.2}|{}|{}|{}",
            fingerprint,
            result.trust_score,
            result.risk_level.as_str(),
            result.recommendation.as_str(),
            result.timestamp.to_rfc3339(),
        );
        let mut id = self.signer.digest(material.as_bytes());
        id.truncate(32);
        id
    }

    fn audit_record(
        &self,
        verification_id: &str,
        decision_fingerprint: String,
        decision: &Decision,
        result: &VerificationResult,
    ) -> AuditRecord {
        AuditRecord {
            verification_id: verification_id.to_string(),
            decision_fingerprint,
            action: decision.action.clone(),
            asset: decision.asset.clone(),
            trust_score: result.trust_score,
            risk_level: result.risk_level,
            recommendation: result.recommendation,
            warning_count: result.warnings.len(),
            reasoning_digest: decision
                .reasoning
                .as_ref()
                .map(|r| self.signer.digest(r.as_bytes())),
            strategy_digest: decision
                .strategy
                .as_ref()
                .map(|s| self.signer.digest(s.as_bytes())),
            degraded_checks: result.details.degraded_checks.clone(),
            timestamp: result.timestamp,
        }
    }
}

/// Await `task` no later than `deadline`.
async fn bounded<F: Future>(
    deadline: tokio::time::Instant,
    task: F,
) -> Result<F::Output, Elapsed> {
    tokio::time::timeout_at(deadline, task).await
}

// ── Tests ────────────────────────────────────────────────────────────────────
