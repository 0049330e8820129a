//! Regex-table pattern detector.
//!
//! `RegexPatternDetector` implements the `PatternDetector` trait from
//! `aegis-core`. Detection runs four independent passes:
//!
//! 1. **Reasoning**: the reasoning text against the reasoning table.
//! 2. **Strategy**: the strategy text against the strategy table.
//! 3. **Behavioral**: heuristics over the decision's numbers and phrasing:
//!    overconfidence, reasoning contradicting the action, herd phrasing,
//!    oversized positions, poor risk/reward, timeframe/strategy mismatch.
//! 4. **Temporal**: rapid-fire trading and direction flip-flopping, read
//!    from a bounded per-agent history. Runs only when enabled in the rule
//!    table and the context names an agent.
//!
//! The score is the capped sum of `weight × confidence` over every match,
//! adjusted for stated confidence at either extreme.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use regex::Regex;
use tracing::{debug, info};

use aegis_contracts::{
    assessment::{DetectedPattern, PatternCategory, PatternDetection, PatternSource, Severity},
    decision::{Decision, Direction, VerificationContext},
    error::AegisResult,
    rules::{compile_pattern, BehavioralRules, PatternRule, PatternRules, TemporalRules},
};
use aegis_core::traits::PatternDetector;

use crate::history::{AgentHistory, HistoryEntry};

/// The embedded default rule table.
pub const DEFAULT_RULES: &str = include_str!("../rules/default.toml");

pub fn default_rules() -> AegisResult<PatternRules> {
    PatternRules::from_toml_str(DEFAULT_RULES)
}

const MIN_MATCH_CONFIDENCE: f64 = 0.5;

// ── Compiled tables ──────────────────────────────────────────────────────────

struct CompiledPattern {
    rule: PatternRule,
    regex: Regex,
}

struct CompiledBehavioral {
    rules: BehavioralRules,
    bearish: Regex,
    bullish: Regex,
    herd: Regex,
    short_timeframe: Regex,
    long_timeframe: Regex,
    long_horizon: Regex,
    short_horizon: Regex,
}

struct CompiledPatternRules {
    source: PatternRules,
    reasoning: Vec<CompiledPattern>,
    strategy: Vec<CompiledPattern>,
    behavioral: CompiledBehavioral,
}

fn compile_table(table: &[PatternRule]) -> AegisResult<Vec<CompiledPattern>> {
    table
        .iter()
        .map(|rule| {
            Ok(CompiledPattern {
                regex: compile_pattern(&rule.pattern)?,
                rule: rule.clone(),
            })
        })
        .collect()
}

impl CompiledPatternRules {
    fn compile(source: PatternRules) -> AegisResult<Self> {
        source.validate()?;
        let b = &source.behavioral;
        let behavioral = CompiledBehavioral {
            bearish: compile_pattern(&b.bearish_terms)?,
            bullish: compile_pattern(&b.bullish_terms)?,
            herd: compile_pattern(&b.herd_terms)?,
            short_timeframe: compile_pattern(&b.short_timeframe)?,
            long_timeframe: compile_pattern(&b.long_timeframe)?,
            long_horizon: compile_pattern(&b.long_horizon_strategy)?,
            short_horizon: compile_pattern(&b.short_horizon_strategy)?,
            rules: b.clone(),
        };
        Ok(Self {
            reasoning: compile_table(&source.reasoning)?,
            strategy: compile_table(&source.strategy)?,
            behavioral,
            source,
        })
    }
}

/// Fraction of `text` covered by matches of `regex`, mapped onto 0.5–1.0.
///
/// Returns `None` when nothing matched.
fn match_confidence(regex: &Regex, text: &str) -> Option<f64> {
    let covered: usize = regex.find_iter(text).map(|m| m.len()).sum();
    if covered == 0 {
        return None;
    }
    let ratio = covered as f64 / text.len() as f64;
    Some((MIN_MATCH_CONFIDENCE + ratio).min(1.0))
}

fn behavioral(
    name: &str,
    severity: Severity,
    weight: f64,
    confidence: f64,
    description: &str,
) -> DetectedPattern {
    DetectedPattern {
        name: name.to_string(),
        category: PatternCategory::Behavioral,
        source: PatternSource::Behavioral,
        severity,
        weight,
        confidence: confidence.clamp(MIN_MATCH_CONFIDENCE, 1.0),
        description: description.to_string(),
    }
}

// ── Passes ───────────────────────────────────────────────────────────────────

fn scan(table: &[CompiledPattern], text: Option<&str>, source: PatternSource) -> Vec<DetectedPattern> {
    let Some(text) = text.filter(|t| !t.is_empty()) else {
        return Vec::new();
    };
    table
        .iter()
        .filter_map(|p| {
            match_confidence(&p.regex, text).map(|confidence| DetectedPattern {
                name: p.rule.name.clone(),
                category: p.rule.category,
                source,
                severity: p.rule.severity,
                weight: p.rule.weight,
                confidence,
                description: p.rule.description.clone(),
            })
        })
        .collect()
}

fn behavioral_pass(b: &CompiledBehavioral, decision: &Decision) -> Vec<DetectedPattern> {
    let rules = &b.rules;
    let mut found = Vec::new();
    let narrative = decision.narrative();

    // ── Overconfidence ──────────────────────────────────────────────────────
    if decision.confidence.is_some_and(|c| c > rules.overconfidence_threshold) {
        found.push(behavioral(
            "overconfidence",
            Severity::Medium,
            15.0,
            1.0,
            "Stated confidence is implausibly high",
        ));
    }

    // ── Reasoning contradicts action ────────────────────────────────────────
    if let Some(reasoning) = decision.reasoning.as_deref() {
        let bearish = b.bearish.find_iter(reasoning).count();
        let bullish = b.bullish.find_iter(reasoning).count();
        let (against, with) = match decision.direction() {
            Direction::Long => (bearish, bullish),
            Direction::Short => (bullish, bearish),
            Direction::Neutral => (0, 0),
        };
        if against > with {
            found.push(behavioral(
                "reasoning_action_contradiction",
                Severity::High,
                25.0,
                (against - with) as f64 / against as f64,
                "Reasoning argues against the proposed action",
            ));
        }
    }

    // ── Herd mentality ──────────────────────────────────────────────────────
    if let Some(confidence) = match_confidence(&b.herd, &narrative) {
        found.push(behavioral(
            "herd_mentality",
            Severity::Medium,
            15.0,
            confidence,
            "Follows the crowd rather than analysis",
        ));
    }

    // ── Position size ───────────────────────────────────────────────────────
    if let (Some(amount), Some(portfolio)) = (decision.amount, decision.portfolio_size) {
        let fraction = amount / portfolio;
        if fraction > rules.position_critical_fraction {
            found.push(behavioral(
                "excessive_position_size",
                Severity::High,
                30.0,
                1.0,
                "Position exceeds half of the portfolio",
            ));
        } else if fraction > rules.position_warning_fraction {
            found.push(behavioral(
                "large_position_size",
                Severity::Medium,
                15.0,
                1.0,
                "Position is a large share of the portfolio",
            ));
        }
    }

    // ── Risk/reward ─────────────────────────────────────────────────────────
    if let (Some(price), Some(stop), Some(take)) =
        (decision.price, decision.stop_loss, decision.take_profit)
    {
        let (risk, reward) = match decision.direction() {
            Direction::Short => (stop - price, price - take),
            _ => (price - stop, take - price),
        };
        if risk > 0.0 && reward / risk < rules.min_risk_reward {
            found.push(behavioral(
                "poor_risk_reward",
                Severity::Medium,
                20.0,
                1.0,
                "Potential reward is small relative to the risk taken",
            ));
        }
    }

    // ── Timeframe vs strategy ───────────────────────────────────────────────
    if let Some(timeframe) = decision.timeframe.as_deref() {
        let mismatch = (b.short_timeframe.is_match(timeframe) && b.long_horizon.is_match(&narrative))
            || (b.long_timeframe.is_match(timeframe) && b.short_horizon.is_match(&narrative));
        if mismatch {
            found.push(behavioral(
                "timeframe_strategy_mismatch",
                Severity::Low,
                10.0,
                1.0,
                "Timeframe does not fit the stated strategy",
            ));
        }
    }

    found
}

fn temporal_pass(
    history: &AgentHistory,
    rules: &TemporalRules,
    decision: &Decision,
    context: Option<&VerificationContext>,
) -> Vec<DetectedPattern> {
    let Some(ctx) = context else {
        return Vec::new();
    };
    let Some(agent) = ctx.agent_id.as_deref() else {
        return Vec::new();
    };

    let entry = HistoryEntry {
        at: ctx.timestamp.unwrap_or_else(Utc::now),
        asset: decision.asset.clone(),
        direction: decision.direction(),
    };
    let signals = history.record(agent, entry, rules);

    let mut found = Vec::new();
    if signals.decisions_in_window >= rules.burst_threshold {
        found.push(DetectedPattern {
            source: PatternSource::Temporal,
            ..behavioral(
                "rapid_fire_trading",
                Severity::Medium,
                20.0,
                1.0,
                "Unusually many decisions in a short window",
            )
        });
    }
    if signals.reversals >= rules.reversal_threshold {
        found.push(DetectedPattern {
            source: PatternSource::Temporal,
            ..behavioral(
                "direction_flip_flop",
                Severity::High,
                25.0,
                1.0,
                "Repeatedly reverses direction on the same asset",
            )
        });
    }
    found
}

/// Extra risk for stated confidence at either extreme.
fn confidence_adjustment(confidence: Option<f64>, rules: &BehavioralRules) -> f64 {
    match confidence {
        Some(c) if c < 30.0 => 15.0,
        Some(c) if c < rules.low_confidence_threshold => 10.0,
        Some(c) if c > rules.overconfidence_threshold => 10.0,
        _ => 0.0,
    }
}

// ── Detector ─────────────────────────────────────────────────────────────────

/// The Aegis pattern detector.
pub struct RegexPatternDetector {
    rules: RwLock<Arc<CompiledPatternRules>>,
    history: AgentHistory,
}

impl RegexPatternDetector {
    pub fn new(rules: PatternRules) -> AegisResult<Self> {
        let history = AgentHistory::new(rules.temporal.max_agents);
        Ok(Self {
            rules: RwLock::new(Arc::new(CompiledPatternRules::compile(rules)?)),
            history,
        })
    }

    pub fn with_default_rules() -> AegisResult<Self> {
        Self::new(default_rules()?)
    }

    /// Copy of the rule table currently in service.
    pub fn rules(&self) -> PatternRules {
        self.rules.read().source.clone()
    }

    /// Number of agents with a live history window.
    pub fn tracked_agents(&self) -> usize {
        self.history.len()
    }
}

impl PatternDetector for RegexPatternDetector {
    fn detect(
        &self,
        decision: &Decision,
        context: Option<&VerificationContext>,
    ) -> AegisResult<PatternDetection> {
        let rules = self.rules.read().clone();

        let mut patterns = scan(&rules.reasoning, decision.reasoning.as_deref(), PatternSource::Reasoning);
        patterns.extend(scan(&rules.strategy, decision.strategy.as_deref(), PatternSource::Strategy));
        patterns.extend(behavioral_pass(&rules.behavioral, decision));
        let temporal = &rules.source.temporal;
        if temporal.enabled {
            patterns.extend(temporal_pass(&self.history, temporal, decision, context));
        }

        let matched: f64 = patterns.iter().map(DetectedPattern::contribution).sum();
        let adjustment = confidence_adjustment(decision.confidence, &rules.behavioral.rules);
        let score = (matched.min(100.0) + adjustment).clamp(0.0, 100.0);
        let score = (score * 100.0).round() / 100.0;

        let severity = if patterns.iter().any(|p| p.severity == Severity::Critical) {
            Severity::Critical
        } else {
            Severity::from_score(score)
        };

        let mut warnings: Vec<String> = patterns
            .iter()
            .filter(|p| p.weight > 0.0)
            .map(|p| format!("Pattern '{}' detected: {}", p.name, p.description))
            .collect();
        if decision
            .confidence
            .is_some_and(|c| c < rules.behavioral.rules.low_confidence_threshold)
        {
            warnings.push("Stated confidence is low".to_string());
        }

        debug!(
            asset = %decision.asset,
            matches = patterns.len(),
            score,
            severity = ?severity,
            "pattern detection complete"
        );

        Ok(PatternDetection {
            score,
            severity,
            patterns,
            warnings,
            degraded: false,
        })
    }

    fn update_rules(&self, rules: PatternRules) -> AegisResult<()> {
        let max_agents = rules.temporal.max_agents;
        let enabled = rules.temporal.enabled;
        let compiled = CompiledPatternRules::compile(rules)?;
        *self.rules.write() = Arc::new(compiled);

        if enabled {
            self.history.resize(max_agents);
        } else {
            self.history.clear();
        }
        info!(temporal = enabled, "pattern rules replaced");
        Ok(())
    }
}
