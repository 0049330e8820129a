//! Audit record written once per verification.
//!
//! The record carries digests of the free-text fields, never the text itself,
//! so the audit trail can be retained without holding trading rationale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::result::{Recommendation, RiskLevel};

/// An immutable record of one verification, appended to the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub verification_id: String,
    /// Hash of the decision's non-sensitive identifying fields.
    pub decision_fingerprint: String,
    pub action: String,
    pub asset: String,
    pub trust_score: f64,
    pub risk_level: RiskLevel,
    pub recommendation: Recommendation,
    pub warning_count: usize,
    /// SHA-256 hex of the sanitized reasoning, if any.
    pub reasoning_digest: Option<String>,
    /// SHA-256 hex of the sanitized strategy, if any.
    pub strategy_digest: Option<String>,
    pub degraded_checks: Vec<String>,
    pub timestamp: DateTime<Utc>,
}
