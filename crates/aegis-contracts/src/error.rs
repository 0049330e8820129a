//! Error types for the Aegis verification pipeline.
//!
//! All fallible operations return `AegisResult<T>`. Messages built through the
//! constructor helpers are redacted before they are stored, so an error can be
//! logged or returned to a caller without leaking key material that happened
//! to appear in untrusted input.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Runs of 32 or more hex characters look like keys, seeds, or signatures.
static SECRET_LIKE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?i)[0-9a-f]{32,}").ok());

/// Placeholder substituted for anything that looks like key material.
pub const REDACTED: &str = "[REDACTED]";

/// The unified error type for the Aegis engine.
#[derive(Debug, Error)]
pub enum AegisError {
    /// The decision or context is malformed or out of range. The caller must
    /// fix the input; no partial result is produced.
    #[error("validation error: {reason}")]
    Validation { reason: String },

    /// Signing, verification, encryption, or key handling failed.
    ///
    /// Fatal for the call: a result that cannot be signed is never released.
    #[error("cryptographic error: {reason}")]
    Cryptographic { reason: String },

    /// A rule table or engine configuration is invalid.
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    /// An analyzer failed internally and the engine runs fail-closed.
    #[error("{component} analysis failed: {reason}")]
    Analysis { component: String, reason: String },

    /// An analyzer did not finish before the verification deadline.
    #[error("{component} analysis exceeded the {deadline_ms}ms deadline")]
    DeadlineExceeded { component: String, deadline_ms: u64 },

    /// The local audit trail could not record the verification.
    #[error("audit write failed: {reason}")]
    AuditWriteFailed { reason: String },

    /// A batch exceeded the configured maximum size.
    #[error("batch of {size} decisions exceeds the maximum of {max}")]
    BatchTooLarge { size: usize, max: usize },
}

impl AegisError {
    /// Build a `Validation` error with a redacted message.
    pub fn validation(reason: impl AsRef<str>) -> Self {
        Self::Validation {
            reason: redact_secrets(reason.as_ref()),
        }
    }

    /// Build a `Configuration` error with a redacted message.
    pub fn configuration(reason: impl AsRef<str>) -> Self {
        Self::Configuration {
            reason: redact_secrets(reason.as_ref()),
        }
    }

    /// Build a `Cryptographic` error with a redacted message.
    pub fn cryptographic(reason: impl AsRef<str>) -> Self {
        Self::Cryptographic {
            reason: redact_secrets(reason.as_ref()),
        }
    }

    /// Build an `Analysis` error with a redacted message.
    pub fn analysis(component: impl Into<String>, reason: impl AsRef<str>) -> Self {
        Self::Analysis {
            component: component.into(),
            reason: redact_secrets(reason.as_ref()),
        }
    }
}

/// Convenience alias used throughout the Aegis crates.
pub type AegisResult<T> = Result<T, AegisError>;

/// Replace every run of 32+ hex characters in `message` with `[REDACTED]`.
pub fn redact_secrets(message: &str) -> String {
    match SECRET_LIKE.as_ref() {
        Some(re) => re.replace_all(message, REDACTED).into_owned(),
        None => message.to_string(),
    }
}
