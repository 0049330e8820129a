//! # aegis-contracts
//!
//! Shared types, rule tables, and contracts for the Aegis local
//! decision-verification engine.
//!
//! All crates in the workspace import from here. Business logic lives in the
//! analyzer and engine crates; this crate only defines data, rule-table
//! validation, and the error type.

pub mod assessment;
pub mod audit;
pub mod decision;
pub mod error;
pub mod result;
pub mod rules;

#[cfg(test)]
mod tests {
    use super::*;
    use error::{redact_secrets, AegisError, REDACTED};
    use rules::{compile_pattern, ComplianceRules, RulesUpdate};

    // ── Redaction ────────────────────────────────────────────────────────────

    #[test]
    fn redaction_hides_long_hex_runs() {
        let key = "a".repeat(64);
        let msg = redact_secrets(&format!("bad key {key} supplied"));
        assert_eq!(msg, format!("bad key {REDACTED} supplied"));
    }

    #[test]
    fn redaction_keeps_short_hex() {
        let msg = redact_secrets("asset deadbeef is unknown");
        assert_eq!(msg, "asset deadbeef is unknown");
    }

    #[test]
    fn validation_constructor_redacts() {
        let err = AegisError::validation(format!("seed {} rejected", "0f".repeat(20)));
        let msg = err.to_string();
        assert!(msg.contains("validation error"));
        assert!(msg.contains(REDACTED));
        assert!(!msg.contains("0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f"));
    }

    // ── Error display ────────────────────────────────────────────────────────

    #[test]
    fn error_batch_too_large_display() {
        let err = AegisError::BatchTooLarge { size: 150, max: 100 };
        let msg = err.to_string();
        assert!(msg.contains("150"));
        assert!(msg.contains("100"));
    }

    #[test]
    fn error_deadline_display() {
        let err = AegisError::DeadlineExceeded {
            component: "pattern".to_string(),
            deadline_ms: 250,
        };
        assert_eq!(err.to_string(), "pattern analysis exceeded the 250ms deadline");
    }

    // ── Rule tables ──────────────────────────────────────────────────────────

    #[test]
    fn compile_pattern_is_case_insensitive() {
        let re = compile_pattern(r"risk[\s-]?free").unwrap();
        assert!(re.is_match("totally RISK-FREE"));
    }

    #[test]
    fn compile_pattern_rejects_bad_syntax() {
        match compile_pattern("(unclosed") {
            Err(AegisError::Configuration { reason }) => {
                assert!(reason.contains("invalid pattern"), "got: {reason}");
            }
            other => panic!("expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn compliance_rules_require_known_default_jurisdiction() {
        let toml = r#"
            default_jurisdictions = ["ZZ"]
            cache_capacity = 16
            [jurisdictions]
        "#;
        match ComplianceRules::from_toml_str(toml) {
            Err(AegisError::Configuration { reason }) => {
                assert!(reason.contains("ZZ"), "got: {reason}");
            }
            other => panic!("expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn malformed_toml_is_a_configuration_error() {
        match ComplianceRules::from_toml_str("not toml ][") {
            Err(AegisError::Configuration { reason }) => {
                assert!(reason.contains("failed to parse compliance rules TOML"));
            }
            other => panic!("expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn empty_rules_update_validates() {
        let update = RulesUpdate::default();
        assert!(update.is_empty());
        assert!(update.validate().is_ok());
    }
}
