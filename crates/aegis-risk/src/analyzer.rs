//! Rule-based risk analyzer.
//!
//! `RuleBasedRiskAnalyzer` implements the `RiskAnalyzer` trait from
//! `aegis-core`. Seven independent sub-checks each produce a 0–100 sub-score:
//!
//! | Check      | Source                                   | Cap |
//! |------------|------------------------------------------|-----|
//! | scam       | scam patterns over reasoning + strategy  | 100 |
//! | token      | risk-token set and symbol-shape rules    | 100 |
//! | amount     | amount relative to `max_amount`          |  50 |
//! | leverage   | leverage relative to `max_leverage`      |  60 |
//! | action     | per-keyword lookup table                 | 100 |
//! | volatility | market data, else asset-name heuristics  |  30 |
//! | context    | performance, timing, trade frequency     |  40 |
//!
//! The weighted sum is the risk score. Severity is critical when the scam or
//! token sub-score reaches 80 even if the weighted score is low.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};

use chrono::Timelike;
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use aegis_contracts::{
    assessment::{RiskAssessment, RiskBreakdown, Severity},
    decision::{Decision, VerificationContext},
    error::AegisResult,
    rules::{compile_pattern, RiskRules},
};
use aegis_core::traits::RiskAnalyzer;

/// The embedded default rule table.
pub const DEFAULT_RULES: &str = include_str!("../rules/default.toml");

/// Parse the embedded default rule table.
pub fn default_rules() -> AegisResult<RiskRules> {
    RiskRules::from_toml_str(DEFAULT_RULES)
}

const AMOUNT_CAP: f64 = 50.0;
const LEVERAGE_CAP: f64 = 60.0;
const VOLATILITY_CAP: f64 = 30.0;
const CONTEXT_CAP: f64 = 40.0;
const CRITICAL_SUB_SCORE: f64 = 80.0;

/// A validated rule table with its patterns compiled.
struct CompiledRiskRules {
    rules: RiskRules,
    scam: Vec<Regex>,
}

impl CompiledRiskRules {
    fn compile(rules: RiskRules) -> AegisResult<Self> {
        rules.validate()?;
        let scam = rules
            .scam_patterns
            .iter()
            .map(|p| compile_pattern(p))
            .collect::<AegisResult<Vec<_>>>()?;
        Ok(Self { rules, scam })
    }

    fn is_major(&self, symbol: &str) -> bool {
        self.rules.major_assets.iter().any(|a| a == symbol)
    }

    fn is_meme(&self, symbol: &str) -> bool {
        self.rules.meme_markers.iter().any(|m| symbol.contains(m.as_str()))
    }
}

/// Point-in-time analyzer counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskAnalyzerStats {
    pub calls: u64,
    /// Calls that completed with no degraded sub-check.
    pub successes: u64,
    pub average_latency_us: f64,
    pub low: u64,
    pub medium: u64,
    pub high: u64,
    pub critical: u64,
}

#[derive(Default)]
struct Counters {
    calls: AtomicU64,
    successes: AtomicU64,
    latency_us: AtomicU64,
    by_severity: [AtomicU64; 4],
}

impl Counters {
    fn record(&self, started: Instant, assessment: &RiskAssessment) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if assessment.degraded_checks.is_empty() {
            self.successes.fetch_add(1, Ordering::Relaxed);
        }
        let micros = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        self.latency_us.fetch_add(micros, Ordering::Relaxed);
        self.by_severity[assessment.severity as usize].fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> RiskAnalyzerStats {
        let calls = self.calls.load(Ordering::Relaxed);
        let latency = self.latency_us.load(Ordering::Relaxed);
        RiskAnalyzerStats {
            calls,
            successes: self.successes.load(Ordering::Relaxed),
            average_latency_us: if calls == 0 { 0.0 } else { latency as f64 / calls as f64 },
            low: self.by_severity[Severity::Low as usize].load(Ordering::Relaxed),
            medium: self.by_severity[Severity::Medium as usize].load(Ordering::Relaxed),
            high: self.by_severity[Severity::High as usize].load(Ordering::Relaxed),
            critical: self.by_severity[Severity::Critical as usize].load(Ordering::Relaxed),
        }
    }
}

/// Scores one decision. Collects warnings and degraded checks as it goes.
struct Scoring<'a> {
    rules: &'a CompiledRiskRules,
    decision: &'a Decision,
    context: Option<&'a VerificationContext>,
    warnings: Vec<String>,
    degraded: Vec<String>,
}

impl Scoring<'_> {
    fn base_symbol(&self) -> &str {
        self.decision
            .asset
            .split(['-', '/'])
            .next()
            .unwrap_or(&self.decision.asset)
    }

    fn scam(&self) -> (f64, usize) {
        let text = self.decision.narrative();
        if text.is_empty() {
            return (0.0, 0);
        }
        let hits = self.rules.scam.iter().filter(|re| re.is_match(&text)).count();
        let score = (hits as f64 * self.rules.rules.scam_penalty).min(100.0);
        (score, hits)
    }

    fn token(&self) -> f64 {
        let asset = &self.decision.asset;
        let symbol = self.base_symbol();
        let risky = &self.rules.rules.risk_tokens;
        if risky.iter().any(|t| t == asset || t == symbol) {
            return 100.0;
        }
        if self.rules.is_major(symbol) {
            return 0.0;
        }

        let mut score: f64 = 0.0;
        if self.rules.is_meme(symbol) {
            score += 40.0;
        }
        if symbol.len() > 6 {
            score += 20.0;
        }
        if symbol.chars().any(|c| c.is_ascii_digit()) {
            score += 20.0;
        }
        score.min(100.0)
    }

    fn amount(&self) -> f64 {
        let Some(amount) = self.decision.amount else {
            return 0.0;
        };
        let ratio = amount / self.rules.rules.max_amount;
        let score: f64 = if ratio >= 1.0 {
            50.0
        } else if ratio >= 0.75 {
            35.0
        } else if ratio >= 0.5 {
            20.0
        } else if ratio >= 0.25 {
            10.0
        } else {
            0.0
        };
        score.min(AMOUNT_CAP)
    }

    fn leverage(&self) -> f64 {
        let leverage = match self.decision.leverage {
            Some(l) if l > 1.0 => l,
            _ => return 0.0,
        };
        let ratio = leverage / self.rules.rules.max_leverage;
        let score: f64 = if ratio > 2.0 {
            60.0
        } else if ratio > 1.0 {
            50.0
        } else if ratio >= 0.75 {
            35.0
        } else if ratio >= 0.5 {
            20.0
        } else {
            10.0
        };
        score.min(LEVERAGE_CAP)
    }

    fn action(&self) -> f64 {
        self.rules
            .rules
            .action_risk
            .get(&self.decision.action)
            .copied()
            .unwrap_or(self.rules.rules.default_action_risk)
    }

    fn volatility(&mut self) -> f64 {
        let reported = self
            .context
            .and_then(|c| c.market_data.as_ref())
            .and_then(|m| m.volatility);

        let score: f64 = match reported {
            Some(v) if !v.is_finite() || v < 0.0 => {
                self.degrade("volatility", "Market volatility data is malformed");
                VOLATILITY_CAP
            }
            Some(v) if v > 0.10 => 30.0,
            Some(v) if v > 0.05 => 20.0,
            Some(v) if v > 0.02 => 10.0,
            Some(_) => 0.0,
            None => {
                let symbol = self.base_symbol();
                if self.rules.is_major(symbol) {
                    10.0
                } else if self.rules.is_meme(symbol) {
                    30.0
                } else {
                    15.0
                }
            }
        };
        score.min(VOLATILITY_CAP)
    }

    fn context(&mut self) -> f64 {
        let Some(ctx) = self.context else {
            return 0.0;
        };
        let compiled: &CompiledRiskRules = self.rules;
        let rules = &compiled.rules;
        let mut score: f64 = 0.0;

        match ctx.historical_performance {
            Some(p) if !(0.0..=1.0).contains(&p) => {
                self.degrade("context", "Historical performance data is malformed");
                return CONTEXT_CAP;
            }
            Some(p) if p < rules.poor_performance_ratio * 0.6 => score += 20.0,
            Some(p) if p < rules.poor_performance_ratio => score += 10.0,
            _ => {}
        }

        if let Some(ts) = ctx.timestamp {
            let [start, end] = rules.off_hours_utc;
            let hour = ts.hour();
            let off_hours = if start <= end {
                (start..end).contains(&hour)
            } else {
                hour >= start || hour < end
            };
            if off_hours {
                score += 10.0;
            }
        }

        if let Some(count) = ctx.recent_trade_count {
            if count > rules.high_trade_frequency.saturating_mul(2) {
                score += 20.0;
            } else if count > rules.high_trade_frequency {
                score += 10.0;
            }
        }

        score.min(CONTEXT_CAP)
    }

    fn degrade(&mut self, check: &str, message: &str) {
        warn!(check, "risk sub-check degraded to its maximum");
        self.degraded.push(check.to_string());
        self.warnings
            .push(format!("{message}; assuming maximum {check} risk"));
    }

    fn warn_if(&mut self, score: f64, message: impl FnOnce() -> String) {
        if score >= self.rules.rules.warning_threshold {
            self.warnings.push(message());
        }
    }

    fn run(mut self) -> RiskAssessment {
        let (scam, hits) = self.scam();
        let token = self.token();
        let amount = self.amount();
        let leverage = self.leverage();
        let action = self.action();
        let volatility = self.volatility();
        let context = self.context();

        self.warn_if(scam, || format!("Scam-like language detected ({hits} pattern match(es))"));
        self.warn_if(token, || {
            if token >= 100.0 {
                "Asset is on the high-risk token list".to_string()
            } else {
                "Asset symbol shows speculative characteristics".to_string()
            }
        });
        self.warn_if(amount, || "Amount is large relative to the configured maximum".to_string());
        let max_leverage = self.rules.rules.max_leverage;
        let stated_leverage = self.decision.leverage;
        self.warn_if(leverage, || match stated_leverage {
            Some(l) if l > max_leverage => {
                format!("Leverage {l}x exceeds the configured maximum of {max_leverage}x")
            }
            _ => "Leverage is elevated".to_string(),
        });
        let keyword = self.decision.action.clone();
        self.warn_if(action, || format!("Action '{keyword}' carries elevated risk"));
        self.warn_if(volatility, || "Asset volatility is elevated".to_string());
        self.warn_if(context, || "Recent trading context raises risk".to_string());

        let w = &self.rules.rules.weights;
        let weighted = scam * w.scam
            + token * w.token
            + amount * w.amount
            + leverage * w.leverage
            + action * w.action
            + volatility * w.volatility
            + context * w.context;
        let score = (weighted.clamp(0.0, 100.0) * 100.0).round() / 100.0;

        let severity = if scam >= CRITICAL_SUB_SCORE || token >= CRITICAL_SUB_SCORE {
            Severity::Critical
        } else {
            Severity::from_score(score)
        };

        RiskAssessment {
            score,
            severity,
            warnings: self.warnings,
            breakdown: RiskBreakdown {
                scam,
                token,
                amount,
                leverage,
                action,
                volatility,
                context,
            },
            degraded_checks: self.degraded,
        }
    }
}

/// The Aegis risk analyzer.
///
/// Rules sit behind a read-write lock holding an `Arc`, so an update swaps
/// the whole table while in-flight calls finish on the one they started with.
pub struct RuleBasedRiskAnalyzer {
    rules: RwLock<Arc<CompiledRiskRules>>,
    counters: Counters,
}

impl RuleBasedRiskAnalyzer {
    /// Build an analyzer from `rules`, validating and compiling them.
    pub fn new(rules: RiskRules) -> AegisResult<Self> {
        Ok(Self {
            rules: RwLock::new(Arc::new(CompiledRiskRules::compile(rules)?)),
            counters: Counters::default(),
        })
    }

    pub fn with_default_rules() -> AegisResult<Self> {
        Self::new(default_rules()?)
    }

    pub fn stats(&self) -> RiskAnalyzerStats {
        self.counters.snapshot()
    }

    /// Copy of the rule table currently in service.
    pub fn rules(&self) -> RiskRules {
        self.rules.read().rules.clone()
    }
}

impl RiskAnalyzer for RuleBasedRiskAnalyzer {
    fn analyze(
        &self,
        decision: &Decision,
        context: Option<&VerificationContext>,
    ) -> AegisResult<RiskAssessment> {
        let started = Instant::now();
        let rules = self.rules.read().clone();

        let assessment = Scoring {
            rules: &rules,
            decision,
            context,
            warnings: Vec::new(),
            degraded: Vec::new(),
        }
        .run();

        debug!(
            asset = %decision.asset,
            score = assessment.score,
            severity = ?assessment.severity,
            "risk analysis complete"
        );
        self.counters.record(started, &assessment);
        Ok(assessment)
    }

    fn update_rules(&self, rules: RiskRules) -> AegisResult<()> {
        let compiled = CompiledRiskRules::compile(rules)?;
        *self.rules.write() = Arc::new(compiled);
        info!("risk rules replaced");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use aegis_contracts::{decision::MarketData, error::AegisError};

    use super::*;

    fn analyzer() -> RuleBasedRiskAnalyzer {
        RuleBasedRiskAnalyzer::with_default_rules().unwrap()
    }

    fn with_reasoning(text: &str) -> Decision {
        let mut d = Decision::new("buy", "BTC");
        d.reasoning = Some(text.to_string());
        d
    }

    // ── Default table ────────────────────────────────────────────────────────

    #[test]
    fn default_rules_parse_and_validate() {
        let rules = default_rules().unwrap();
        assert_eq!(rules.max_leverage, 20.0);
        assert!((rules.weights.total() - 1.0).abs() < 1e-9);
        assert_eq!(rules.action_risk.get("options"), Some(&30.0));
        assert_eq!(rules.action_risk.get("limit_buy"), Some(&5.0));
    }

    // ── Sub-checks ───────────────────────────────────────────────────────────

    #[test]
    fn plain_major_asset_buy_is_low_risk() {
        let mut d = with_reasoning("strong technical setup");
        d.amount = Some(0.1);
        let a = analyzer().analyze(&d, None).unwrap();

        assert_eq!(a.breakdown.scam, 0.0);
        assert_eq!(a.breakdown.token, 0.0);
        assert_eq!(a.breakdown.action, 10.0);
        assert_eq!(a.breakdown.volatility, 10.0);
        assert_eq!(a.score, 1.0);
        assert_eq!(a.severity, Severity::Low);
        assert!(a.warnings.is_empty());
    }

    #[test]
    fn each_scam_phrase_adds_the_penalty() {
        let a = analyzer()
            .analyze(&with_reasoning("Guaranteed profit and totally RISK-FREE"), None)
            .unwrap();
        assert_eq!(a.breakdown.scam, 70.0);
        assert!(a.warnings.iter().any(|w| w.contains("2 pattern")));
        assert!(a.warnings.iter().all(|w| !w.contains("Guaranteed")));
    }

    #[test]
    fn scam_score_is_capped_and_critical() {
        let text = "guaranteed returns, risk free, can't lose, double your money, free money";
        let a = analyzer().analyze(&with_reasoning(text), None).unwrap();
        assert_eq!(a.breakdown.scam, 100.0);
        assert_eq!(a.severity, Severity::Critical);
    }

    #[test]
    fn listed_risk_token_is_critical() {
        let a = analyzer().analyze(&Decision::new("buy", "SAFEMOON"), None).unwrap();
        assert_eq!(a.breakdown.token, 100.0);
        assert_eq!(a.severity, Severity::Critical);
    }

    #[test]
    fn symbol_shape_heuristics_accumulate() {
        let a = analyzer().analyze(&Decision::new("buy", "BABYDOGE2"), None).unwrap();
        // meme marker + long symbol + digit
        assert_eq!(a.breakdown.token, 80.0);
        assert_eq!(a.breakdown.volatility, 30.0);
    }

    #[test]
    fn derivative_suffix_uses_base_symbol() {
        let a = analyzer().analyze(&Decision::new("buy", "ETH-PERP"), None).unwrap();
        assert_eq!(a.breakdown.token, 0.0);
    }

    #[test]
    fn amount_thresholds_are_progressive() {
        let cases = [(10_000.0, 0.0), (30_000.0, 10.0), (60_000.0, 20.0), (80_000.0, 35.0), (5e6, 50.0)];
        for (amount, expected) in cases {
            let mut d = Decision::new("buy", "BTC");
            d.amount = Some(amount);
            let a = analyzer().analyze(&d, None).unwrap();
            assert_eq!(a.breakdown.amount, expected, "amount {amount}");
        }
    }

    #[test]
    fn leverage_far_above_max_hits_the_cap() {
        let mut d = Decision::new("buy", "BTC");
        d.leverage = Some(150.0);
        let a = analyzer().analyze(&d, None).unwrap();
        assert_eq!(a.breakdown.leverage, 60.0);
        assert!(a.warnings.iter().any(|w| w.contains("150x exceeds")));
    }

    #[test]
    fn unknown_action_uses_default_risk() {
        let a = analyzer().analyze(&Decision::new("bridge", "BTC"), None).unwrap();
        assert_eq!(a.breakdown.action, 20.0);
        assert!(a.warnings.iter().any(|w| w.contains("'bridge'")));
    }

    #[test]
    fn market_volatility_overrides_heuristics() {
        let ctx = VerificationContext {
            market_data: Some(MarketData { volatility: Some(0.12), ..MarketData::default() }),
            ..VerificationContext::default()
        };
        let a = analyzer().analyze(&Decision::new("buy", "BTC"), Some(&ctx)).unwrap();
        assert_eq!(a.breakdown.volatility, 30.0);
    }

    #[test]
    fn malformed_market_data_degrades_the_check() {
        let ctx = VerificationContext {
            market_data: Some(MarketData { volatility: Some(f64::NAN), ..MarketData::default() }),
            ..VerificationContext::default()
        };
        let analyzer = analyzer();
        let a = analyzer.analyze(&Decision::new("buy", "BTC"), Some(&ctx)).unwrap();
        assert_eq!(a.breakdown.volatility, 30.0);
        assert_eq!(a.degraded_checks, vec!["volatility"]);
        assert!(a.warnings.iter().any(|w| w.contains("malformed")));
        assert_eq!(analyzer.stats().successes, 0);
    }

    #[test]
    fn context_signals_are_capped() {
        let ctx = VerificationContext {
            historical_performance: Some(0.1),
            recent_trade_count: Some(50),
            timestamp: Some(Utc.with_ymd_and_hms(2024, 3, 1, 3, 0, 0).unwrap()),
            ..VerificationContext::default()
        };
        let a = analyzer().analyze(&Decision::new("buy", "BTC"), Some(&ctx)).unwrap();
        assert_eq!(a.breakdown.context, 40.0);
    }

    #[test]
    fn daytime_moderate_context_scores_partially() {
        let ctx = VerificationContext {
            historical_performance: Some(0.4),
            recent_trade_count: Some(12),
            timestamp: Some(Utc.with_ymd_and_hms(2024, 3, 1, 14, 0, 0).unwrap()),
            ..VerificationContext::default()
        };
        let a = analyzer().analyze(&Decision::new("buy", "BTC"), Some(&ctx)).unwrap();
        assert_eq!(a.breakdown.context, 20.0);
    }

    // ── Rules and statistics ─────────────────────────────────────────────────

    #[test]
    fn update_swaps_rules() {
        let analyzer = analyzer();
        let mut rules = analyzer.rules();
        rules.max_leverage = 200.0;
        analyzer.update_rules(rules).unwrap();

        let mut d = Decision::new("buy", "BTC");
        d.leverage = Some(150.0);
        let a = analyzer.analyze(&d, None).unwrap();
        assert_eq!(a.breakdown.leverage, 35.0);
    }

    #[test]
    fn invalid_update_keeps_prior_rules() {
        let analyzer = analyzer();
        let mut rules = analyzer.rules();
        rules.scam_patterns.push("(unclosed".to_string());

        match analyzer.update_rules(rules) {
            Err(AegisError::Configuration { reason }) => assert!(reason.contains("invalid pattern")),
            other => panic!("expected Configuration error, got {:?}", other),
        }
        assert_eq!(analyzer.rules(), default_rules().unwrap());
    }

    #[test]
    fn stats_track_calls_and_severity() {
        let analyzer = analyzer();
        analyzer.analyze(&Decision::new("buy", "BTC"), None).unwrap();
        analyzer.analyze(&Decision::new("buy", "RUG"), None).unwrap();

        let stats = analyzer.stats();
        assert_eq!(stats.calls, 2);
        assert_eq!(stats.successes, 2);
        assert_eq!(stats.low, 1);
        assert_eq!(stats.critical, 1);
    }
}
