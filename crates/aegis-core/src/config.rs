//! Engine configuration.
//!
//! `EngineConfig` is deserialized from TOML. Every field has a default, so a
//! partial file only overrides what it names:
//!
//! ```toml
//! max_batch_size = 50
//! failure_mode = "fail-closed"
//!
//! [validation]
//! strict_mode = true
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use aegis_contracts::error::{AegisError, AegisResult};

/// What the engine does when an analyzer errors, panics, or misses the deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureMode {
    /// Substitute a maximum-risk assessment for the failed analyzer.
    #[default]
    Degrade,
    /// Fail the whole verification with a sanitized error.
    FailClosed,
}

/// Input validation and sanitization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Reject unknown action keywords and values above the hard ceilings.
    pub strict_mode: bool,
    /// Characters kept from `reasoning` after sanitization.
    pub max_reasoning_length: usize,
    /// Characters kept from `strategy` after sanitization.
    pub max_strategy_length: usize,
    pub max_amount_ceiling: f64,
    pub max_leverage_ceiling: f64,
    /// Metadata keys containing any of these substrings (case-insensitive) are dropped.
    pub sensitive_metadata_keys: Vec<String>,
    pub known_actions: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            strict_mode: false,
            max_reasoning_length: 2000,
            max_strategy_length: 1000,
            max_amount_ceiling: 1e12,
            max_leverage_ceiling: 1000.0,
            sensitive_metadata_keys: [
                "private_key",
                "privatekey",
                "secret",
                "seed",
                "mnemonic",
                "password",
                "passphrase",
                "api_key",
                "apikey",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            known_actions: [
                "buy",
                "sell",
                "hold",
                "limit_buy",
                "limit_sell",
                "market_buy",
                "market_sell",
                "long",
                "short",
                "close",
                "swap",
                "stake",
                "unstake",
                "options",
                "futures",
                "margin",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Top-level engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_batch_size: usize,
    /// Upper bound on `VerificationResult::warnings`.
    pub max_warnings: usize,
    /// Shared deadline for the three concurrent analyzers.
    pub analysis_deadline_ms: u64,
    pub failure_mode: FailureMode,
    /// Stated confidence below this is penalized linearly.
    pub confidence_penalty_threshold: f64,
    /// Penalty at zero stated confidence.
    pub max_confidence_penalty: f64,
    /// Trust subtracted for a non-compliant decision.
    pub compliance_penalty: f64,
    /// Historical performance below this is penalized.
    pub poor_performance_threshold: f64,
    pub poor_performance_penalty: f64,
    pub audit_enabled: bool,
    /// Audit events kept in memory; the oldest are evicted first.
    pub max_audit_events: usize,
    pub attestation_enabled: bool,
    /// Signatures older than this fail verification.
    pub max_signature_age_secs: u64,
    pub validation: ValidationConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 100,
            max_warnings: 20,
            analysis_deadline_ms: 250,
            failure_mode: FailureMode::Degrade,
            confidence_penalty_threshold: 70.0,
            max_confidence_penalty: 35.0,
            compliance_penalty: 20.0,
            poor_performance_threshold: 0.5,
            poor_performance_penalty: 10.0,
            audit_enabled: true,
            max_audit_events: 1024,
            attestation_enabled: false,
            max_signature_age_secs: 300,
            validation: ValidationConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse `s` as TOML and validate the result.
    pub fn from_toml_str(s: &str) -> AegisResult<Self> {
        let config: Self = toml::from_str(s)
            .map_err(|e| AegisError::configuration(format!("failed to parse engine TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read the file at `path` and parse it as engine configuration.
    pub fn from_file(path: &Path) -> AegisResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AegisError::configuration(format!(
                "failed to read engine config '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> AegisResult<()> {
        if self.max_batch_size == 0 {
            return Err(AegisError::configuration("max_batch_size must be positive"));
        }
        if self.max_warnings == 0 {
            return Err(AegisError::configuration("max_warnings must be positive"));
        }
        if self.audit_enabled && self.max_audit_events == 0 {
            return Err(AegisError::configuration("max_audit_events must be positive"));
        }
        if self.analysis_deadline_ms == 0 {
            return Err(AegisError::configuration("analysis_deadline_ms must be positive"));
        }
        if !(0.0..=100.0).contains(&self.confidence_penalty_threshold) {
            return Err(AegisError::configuration(
                "confidence_penalty_threshold must be within 0..=100",
            ));
        }
        let v = &self.validation;
        if v.max_reasoning_length == 0 || v.max_strategy_length == 0 {
            return Err(AegisError::configuration("text length limits must be positive"));
        }
        if !(v.max_amount_ceiling > 0.0 && v.max_leverage_ceiling > 0.0) {
            return Err(AegisError::configuration("hard ceilings must be positive"));
        }
        Ok(())
    }
}
