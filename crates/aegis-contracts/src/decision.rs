//! Decision and context types.
//!
//! These are the untrusted inputs of a verification. Every field except
//! `action` and `asset` is optional; the validator enforces ranges and the
//! sanitizer normalizes strings before any analyzer sees a `Decision`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A proposed trading or agent action submitted for verification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Decision {
    /// Action keyword, e.g. "buy", "sell", "hold", "limit_buy", "options".
    pub action: String,
    /// Asset symbol, e.g. "BTC" or "ETH-PERP".
    pub asset: String,
    /// Notional amount in the account currency.
    pub amount: Option<f64>,
    pub price: Option<f64>,
    pub leverage: Option<f64>,
    /// Free-text rationale. Sensitive: never copied into results or audit records.
    pub reasoning: Option<String>,
    /// Free-text strategy description. Sensitive, same handling as `reasoning`.
    pub strategy: Option<String>,
    pub timeframe: Option<String>,
    /// Stated confidence, 0–100.
    pub confidence: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub portfolio_size: Option<f64>,
    /// Arbitrary caller metadata. Known-sensitive keys are stripped by the sanitizer.
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Decision {
    /// Minimal decision with only the two required fields set.
    pub fn new(action: impl Into<String>, asset: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            asset: asset.into(),
            ..Self::default()
        }
    }

    /// Classify the action keyword by market direction.
    pub fn direction(&self) -> Direction {
        Direction::of(&self.action)
    }

    /// Reasoning and strategy joined for whole-text scans.
    pub fn narrative(&self) -> String {
        let mut text = String::new();
        for part in [&self.reasoning, &self.strategy].into_iter().flatten() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(part);
        }
        text
    }
}

/// Market direction implied by an action keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
    Neutral,
}

impl Direction {
    /// Map an action keyword to its direction. Unknown keywords are neutral.
    pub fn of(action: &str) -> Self {
        match action {
            "buy" | "limit_buy" | "market_buy" | "long" | "stake" => Direction::Long,
            "sell" | "limit_sell" | "market_sell" | "short" | "close" | "unstake" => {
                Direction::Short
            }
            _ => Direction::Neutral,
        }
    }
}

/// Snapshot of market data supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketData {
    pub price: Option<f64>,
    pub volume_24h: Option<f64>,
    /// Daily volatility as a fraction (0.05 = 5%).
    pub volatility: Option<f64>,
}

/// Retail and professional investors are held to different leverage ceilings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvestorClass {
    #[default]
    Retail,
    Professional,
}

/// Optional context accompanying a decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationContext {
    /// Jurisdiction codes overriding the configured default set, e.g. ["US", "EU"].
    pub jurisdictions: Vec<String>,
    pub market_data: Option<MarketData>,
    /// Ratio of profitable to total past decisions, 0–1.
    pub historical_performance: Option<f64>,
    pub market_condition: Option<String>,
    pub insider_information: bool,
    pub conflict_of_interest: bool,
    pub market_influence: bool,
    /// Trades placed by the agent in the last hour.
    pub recent_trade_count: Option<u32>,
    pub timestamp: Option<DateTime<Utc>>,
    /// Stable agent identifier; enables the per-agent decision history.
    pub agent_id: Option<String>,
    pub investor_class: InvestorClass,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_classifies_known_keywords() {
        assert_eq!(Direction::of("buy"), Direction::Long);
        assert_eq!(Direction::of("limit_buy"), Direction::Long);
        assert_eq!(Direction::of("short"), Direction::Short);
        assert_eq!(Direction::of("market_sell"), Direction::Short);
        assert_eq!(Direction::of("hold"), Direction::Neutral);
        assert_eq!(Direction::of("options"), Direction::Neutral);
    }

    #[test]
    fn narrative_joins_present_fields() {
        let mut decision = Decision::new("buy", "BTC");
        assert_eq!(decision.narrative(), "");

        decision.strategy = Some("swing".to_string());
        assert_eq!(decision.narrative(), "swing");

        decision.reasoning = Some("breakout".to_string());
        assert_eq!(decision.narrative(), "breakout\nswing");
    }

    #[test]
    fn decision_deserializes_with_only_required_fields() {
        let decision: Decision =
            serde_json::from_str(r#"{ "action": "buy", "asset": "ETH" }"#).unwrap();
        assert_eq!(decision.action, "buy");
        assert_eq!(decision.asset, "ETH");
        assert!(decision.amount.is_none());
        assert!(decision.metadata.is_empty());
    }

    #[test]
    fn context_defaults_to_retail() {
        let ctx: VerificationContext = serde_json::from_str("{}").unwrap();
        assert_eq!(ctx.investor_class, InvestorClass::Retail);
        assert!(ctx.jurisdictions.is_empty());
        assert!(!ctx.insider_information);
    }
}
