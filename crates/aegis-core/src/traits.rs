//! Trait definitions for the Aegis verification pipeline.
//!
//! The engine talks to every collaborator through one of these seams:
//!
//! - `InputValidator`:       rejects malformed input, then sanitizes it
//! - `RiskAnalyzer`:         scores scam language, assets, size, leverage
//! - `PatternDetector`:      scores manipulation, bias, and inconsistency
//! - `ComplianceChecker`:    evaluates jurisdiction rules
//! - `ResultSigner`:         nonces, digests, and result signatures
//! - `AttestationGenerator`: optional shareable summary of a result
//! - `AuditWriter`:          optional local audit trail
//! - `MetricsSink`:          engine-wide counters
//!
//! Analyzers are pure with respect to a single call: they read the sanitized
//! decision and their rule table, and return an assessment. The engine runs
//! them concurrently, so implementations must be `Send + Sync`.

use std::time::Duration;

use aegis_contracts::{
    assessment::{ComplianceResult, PatternDetection, RiskAssessment},
    audit::AuditRecord,
    decision::{Decision, VerificationContext},
    error::AegisResult,
    result::{Attestation, RiskLevel, Signature, VerificationResult},
    rules::{ComplianceRules, PatternRules, RiskRules},
};

use crate::metrics::MetricsSnapshot;

/// First gate: validation fails fast, sanitization normalizes what passed.
pub trait InputValidator: Send + Sync {
    /// Reject malformed or out-of-range input. No partial result is produced.
    fn validate(&self, decision: &Decision) -> AegisResult<()>;

    /// Normalize strings, bound free text, clamp confidence, and strip
    /// sensitive metadata. Called only on decisions that passed `validate`.
    fn sanitize(&self, decision: Decision) -> Decision;
}

/// Scores a decision for scam language, risky assets, size, and leverage.
pub trait RiskAnalyzer: Send + Sync {
    /// Produce a best-effort assessment. An absent context is not an error.
    fn analyze(
        &self,
        decision: &Decision,
        context: Option<&VerificationContext>,
    ) -> AegisResult<RiskAssessment>;

    /// Swap in a new rule table. The table has already been validated.
    fn update_rules(&self, rules: RiskRules) -> AegisResult<()>;
}

/// Scores reasoning, strategy, and behavior for suspicious patterns.
pub trait PatternDetector: Send + Sync {
    fn detect(
        &self,
        decision: &Decision,
        context: Option<&VerificationContext>,
    ) -> AegisResult<PatternDetection>;

    fn update_rules(&self, rules: PatternRules) -> AegisResult<()>;
}

/// Evaluates a decision against jurisdiction-specific rules.
pub trait ComplianceChecker: Send + Sync {
    fn check(
        &self,
        decision: &Decision,
        context: Option<&VerificationContext>,
    ) -> AegisResult<ComplianceResult>;

    /// Swap in a new rule table. Implementations that cache results must
    /// invalidate the cache as part of the swap.
    fn update_rules(&self, rules: ComplianceRules) -> AegisResult<()>;
}

/// Integrity primitives the engine needs to release a result.
pub trait ResultSigner: Send + Sync {
    /// Algorithm identifier written into every `Signature`.
    fn algorithm(&self) -> &str;

    /// A fresh, single-use, hex-encoded nonce.
    fn generate_nonce(&self) -> String;

    /// Hex digest of arbitrary bytes.
    fn digest(&self, data: &[u8]) -> String;

    /// Fingerprint of the decision's non-sensitive identifying fields.
    fn hash_decision(&self, decision: &Decision) -> String;

    /// Sign the aggregated, non-sensitive fields of `result` together with `nonce`.
    fn sign_result(&self, result: &VerificationResult, nonce: &str) -> AegisResult<Signature>;

    /// Return true only if the signature is authentic, uses this signer's
    /// algorithm, and is not older than the configured maximum age.
    fn verify_signature(
        &self,
        result: &VerificationResult,
        nonce: &str,
        signature: &Signature,
    ) -> bool;
}

/// Produces a privacy-preserving attestation of a result.
///
/// Pluggable so a real proof system can replace the default digest without
/// touching the engine.
pub trait AttestationGenerator: Send + Sync {
    fn attest(&self, result: &VerificationResult) -> AegisResult<Attestation>;
}

/// Append-only local audit sink.
pub trait AuditWriter: Send + Sync {
    /// Append one record. A failed write fails the verification.
    fn write(&self, record: &AuditRecord) -> AegisResult<()>;
}

/// Owned, injectable statistics sink.
pub trait MetricsSink: Send + Sync {
    /// Record one `verify` call. `outcome` is `None` when the call failed.
    fn record(&self, latency: Duration, outcome: Option<RiskLevel>);

    fn snapshot(&self) -> MetricsSnapshot;
}
