//! Structural validation of untrusted JSON before it becomes a typed value.
//!
//! Inbound decisions and contexts are checked against a JSON Schema document
//! with the `jsonschema` crate. All violations are collected so the caller
//! sees the full failure set in one pass; only a conforming document is
//! deserialized.

use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::warn;

use aegis_contracts::{
    decision::{Decision, VerificationContext},
    error::{AegisError, AegisResult},
};

fn optional(kind: &str) -> Value {
    json!({ "type": [kind, "null"] })
}

fn optional_positive() -> Value {
    json!({ "type": ["number", "null"], "exclusiveMinimum": 0 })
}

static DECISION_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "required": ["action", "asset"],
        "properties": {
            "action": { "type": "string", "minLength": 1, "maxLength": 64 },
            "asset": { "type": "string", "minLength": 1, "maxLength": 64 },
            "amount": optional_positive(),
            "price": optional_positive(),
            "leverage": optional_positive(),
            "reasoning": optional("string"),
            "strategy": optional("string"),
            "timeframe": optional("string"),
            "confidence": { "type": ["number", "null"], "minimum": 0, "maximum": 100 },
            "stop_loss": optional_positive(),
            "take_profit": optional_positive(),
            "portfolio_size": optional_positive(),
            "metadata": { "type": "object" }
        }
    })
});

static CONTEXT_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "jurisdictions": {
                "type": "array",
                "items": { "type": "string", "minLength": 1, "maxLength": 8 }
            },
            "market_data": {
                "type": ["object", "null"],
                "properties": {
                    "price": optional("number"),
                    "volume_24h": optional("number"),
                    "volatility": optional("number")
                }
            },
            "historical_performance": {
                "type": ["number", "null"], "minimum": 0, "maximum": 1
            },
            "market_condition": optional("string"),
            "insider_information": { "type": "boolean" },
            "conflict_of_interest": { "type": "boolean" },
            "market_influence": { "type": "boolean" },
            "recent_trade_count": { "type": ["integer", "null"], "minimum": 0 },
            "timestamp": { "type": ["string", "null"] },
            "agent_id": optional("string"),
            "investor_class": { "enum": ["retail", "professional"] }
        }
    })
});

/// Validate `document` against `schema`, returning every violation.
fn structural_errors(schema: &Value, document: &Value) -> AegisResult<Vec<String>> {
    let validator = jsonschema::validator_for(schema).map_err(|e| {
        AegisError::configuration(format!("invalid JSON Schema document: {e}"))
    })?;
    Ok(validator
        .iter_errors(document)
        .map(|error| format!("at '{}': {}", error.instance_path, error))
        .collect())
}

fn parse<T: DeserializeOwned>(what: &str, schema: &Value, document: &Value) -> AegisResult<T> {
    let errors = structural_errors(schema, document)?;
    if !errors.is_empty() {
        warn!(what, violations = errors.len(), "structural validation failed");
        return Err(AegisError::validation(format!(
            "{what} failed schema validation: {}",
            errors.join("; ")
        )));
    }
    serde_json::from_value(document.clone())
        .map_err(|e| AegisError::validation(format!("{what} could not be decoded: {e}")))
}

/// Check an untrusted decision document and decode it.
pub fn parse_decision(document: &Value) -> AegisResult<Decision> {
    parse("decision", &DECISION_SCHEMA, document)
}

/// Check an untrusted context document and decode it.
pub fn parse_context(document: &Value) -> AegisResult<VerificationContext> {
    parse("context", &CONTEXT_SCHEMA, document)
}
