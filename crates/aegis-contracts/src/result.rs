//! Verification outputs.
//!
//! `SignedVerificationResult` is the only artifact released past the trust
//! boundary. Nothing in this module holds raw reasoning, strategy, metadata,
//! or amounts; every field is safe to log and transmit.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::assessment::Severity;

/// Categorical risk tier of a verified decision. Ordered from safest to riskiest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl From<Severity> for RiskLevel {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Low => RiskLevel::Low,
            Severity::Medium => RiskLevel::Medium,
            Severity::High => RiskLevel::High,
            Severity::Critical => RiskLevel::Critical,
        }
    }
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

/// Final disposition of a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Approved,
    Warning,
    Rejected,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Approved => "approved",
            Recommendation::Warning => "warning",
            Recommendation::Rejected => "rejected",
        }
    }
}

/// Summary of which sub-checks ran and what they concluded.
///
/// Holds scores, counts, and rule names only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationDetails {
    pub checks_run: Vec<String>,
    pub risk_score: f64,
    pub risk_severity: Option<Severity>,
    pub pattern_score: f64,
    pub pattern_severity: Option<Severity>,
    pub patterns_detected: Vec<String>,
    pub compliance_score: f64,
    pub compliant: bool,
    pub violation_count: usize,
    pub jurisdictions: Vec<String>,
    pub frameworks: Vec<String>,
    /// Analyzers or sub-checks that fell back to maximum risk.
    pub degraded_checks: Vec<String>,
}

/// The aggregated verdict for one decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// True unless the recommendation is `Rejected`. A `Warning` result is
    /// verified too, so this does not mean `Approved`; read
    /// `recommendation` for that.
    pub verified: bool,
    /// 0–100, higher is safer.
    pub trust_score: f64,
    pub risk_level: RiskLevel,
    pub recommendation: Recommendation,
    /// At most `max_warnings` entries (20 by default).
    pub warnings: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub details: VerificationDetails,
}

/// A detached signature over the non-sensitive fields of a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Algorithm identifier, e.g. "ed25519".
    pub algorithm: String,
    /// Hex-encoded signature bytes.
    pub value: String,
    /// Hex fingerprint of the signer's public key.
    pub public_key_fingerprint: String,
    pub signed_at: DateTime<Utc>,
}

/// A shareable summary of a result produced by an `AttestationGenerator`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    /// Scheme identifier. The default generator reports "sha256-digest".
    pub scheme: String,
    /// Hex-encoded attestation payload.
    pub payload: String,
    /// Public inputs the attestation commits to, in commitment order.
    pub public_inputs: Vec<String>,
}

/// The signed, releasable verification artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedVerificationResult {
    /// Deterministic id derived from the decision fingerprint and the result.
    pub verification_id: String,
    pub result: VerificationResult,
    pub signature: Signature,
    /// Single-use nonce bound into the signature.
    pub nonce: String,
    pub processing_time_ms: f64,
    pub engine_version: String,
    pub attestation: Option<Attestation>,
}

/// Engine-wide statistics reported by `get_statistics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStatistics {
    pub version: String,
    pub uptime_secs: u64,
    pub total_verifications: u64,
    pub average_latency_ms: f64,
    /// Fraction of calls that returned a signed result, 0–1.
    pub success_rate: f64,
    pub risk_distribution: BTreeMap<RiskLevel, u64>,
}
