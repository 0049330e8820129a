//! Semantic validation and sanitization of typed decisions.
//!
//! `DecisionValidator` implements the `InputValidator` trait from `aegis-core`.
//! Validation fails on the first problem found; sanitization never fails and
//! is only applied to decisions that passed validation.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use aegis_contracts::{
    decision::Decision,
    error::{AegisError, AegisResult},
};
use aegis_core::{config::ValidationConfig, traits::InputValidator};

/// Characters kept in an asset symbol besides ASCII alphanumerics.
const ASSET_PUNCTUATION: &[char] = &['-', '_', '/', '.'];

/// The Aegis input validator.
pub struct DecisionValidator {
    config: ValidationConfig,
}

impl DecisionValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    fn check_positive(field: &str, value: Option<f64>) -> AegisResult<()> {
        match value {
            Some(v) if !(v.is_finite() && v > 0.0) => Err(AegisError::validation(format!(
                "{field} must be a positive finite number"
            ))),
            _ => Ok(()),
        }
    }

    fn is_sensitive(&self, key: &str) -> bool {
        let key = key.to_ascii_lowercase();
        self.config
            .sensitive_metadata_keys
            .iter()
            .any(|marker| key.contains(marker.as_str()))
    }

    /// Drop sensitive keys at every nesting level.
    fn strip_metadata(&self, map: Map<String, Value>) -> Map<String, Value> {
        map.into_iter()
            .filter(|(key, _)| !self.is_sensitive(key))
            .map(|(key, value)| match value {
                Value::Object(inner) => (key, Value::Object(self.strip_metadata(inner))),
                other => (key, other),
            })
            .collect()
    }
}

impl Default for DecisionValidator {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}

/// Lowercase, with whitespace runs and hyphens folded to underscores.
pub fn normalize_action(action: &str) -> String {
    action
        .trim()
        .to_lowercase()
        .replace('-', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

pub fn normalize_asset(asset: &str) -> String {
    asset
        .trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || ASSET_PUNCTUATION.contains(c))
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Trim and bound free text on a char boundary. Empty text becomes `None`.
fn bound_text(text: Option<String>, max_chars: usize) -> Option<String> {
    let trimmed = text?.trim().to_string();
    if trimmed.is_empty() {
        return None;
    }
    Some(match trimmed.char_indices().nth(max_chars) {
        Some((cut, _)) => trimmed[..cut].to_string(),
        None => trimmed,
    })
}

impl InputValidator for DecisionValidator {
    fn validate(&self, decision: &Decision) -> AegisResult<()> {
        if decision.action.trim().is_empty() {
            return Err(AegisError::validation("action is required"));
        }
        if normalize_asset(&decision.asset).is_empty() {
            return Err(AegisError::validation("asset is required"));
        }

        Self::check_positive("amount", decision.amount)?;
        Self::check_positive("leverage", decision.leverage)?;
        Self::check_positive("price", decision.price)?;
        Self::check_positive("stop_loss", decision.stop_loss)?;
        Self::check_positive("take_profit", decision.take_profit)?;
        Self::check_positive("portfolio_size", decision.portfolio_size)?;

        if decision.confidence.is_some_and(f64::is_nan) {
            return Err(AegisError::validation("confidence must be a number"));
        }

        if self.config.strict_mode {
            let action = normalize_action(&decision.action);
            if !self.config.known_actions.iter().any(|a| *a == action) {
                warn!(action = %action, "unknown action rejected in strict mode");
                return Err(AegisError::validation(format!("unknown action '{action}'")));
            }
            if decision.amount.is_some_and(|a| a > self.config.max_amount_ceiling) {
                return Err(AegisError::validation(format!(
                    "amount exceeds the hard ceiling of {}",
                    self.config.max_amount_ceiling
                )));
            }
            if decision.leverage.is_some_and(|l| l > self.config.max_leverage_ceiling) {
                return Err(AegisError::validation(format!(
                    "leverage exceeds the hard ceiling of {}",
                    self.config.max_leverage_ceiling
                )));
            }
        }

        Ok(())
    }

    fn sanitize(&self, decision: Decision) -> Decision {
        let metadata_keys = decision.metadata.len();
        let metadata = self.strip_metadata(decision.metadata);
        if metadata.len() < metadata_keys {
            debug!(
                dropped = metadata_keys - metadata.len(),
                "sensitive metadata keys removed"
            );
        }

        Decision {
            action: normalize_action(&decision.action),
            asset: normalize_asset(&decision.asset),
            reasoning: bound_text(decision.reasoning, self.config.max_reasoning_length),
            strategy: bound_text(decision.strategy, self.config.max_strategy_length),
            timeframe: decision
                .timeframe
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty()),
            confidence: decision.confidence.map(|c| c.clamp(0.0, 100.0)),
            metadata,
            ..decision
        }
    }
}
