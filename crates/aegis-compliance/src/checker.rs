//! Jurisdiction compliance checker.
//!
//! `JurisdictionComplianceChecker` implements the `ComplianceChecker` trait
//! from `aegis-core`.
//!
//! Results are cached in a bounded LRU keyed by every decision and context
//! field the checks read. Each rule table carries a generation number, and
//! the cache remembers which generation its entries belong to:
//!
//! - a lookup only hits when the cache generation matches the rules in use;
//! - a result computed under an older generation is never inserted;
//! - `update_rules` bumps the generation and clears the cache.

use std::{
    num::NonZeroUsize,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use aegis_contracts::{
    assessment::{ComplianceBreakdown, ComplianceResult, ComplianceTier, Severity},
    decision::{Decision, InvestorClass, VerificationContext},
    error::AegisResult,
    rules::ComplianceRules,
};
use aegis_core::traits::ComplianceChecker;

use crate::checks;

/// The embedded default rule table.
pub const DEFAULT_RULES: &str = include_str!("../rules/default.toml");

pub fn default_rules() -> AegisResult<ComplianceRules> {
    ComplianceRules::from_toml_str(DEFAULT_RULES)
}

/// Everything a compliance verdict depends on besides the rule table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    asset: String,
    action: String,
    amount: Option<u64>,
    leverage: Option<u64>,
    portfolio_size: Option<u64>,
    jurisdictions: Vec<String>,
    investor: InvestorClass,
    insider: bool,
    conflict: bool,
    influence: bool,
}

impl CacheKey {
    fn new(decision: &Decision, context: Option<&VerificationContext>, requested: &[String]) -> Self {
        Self {
            asset: decision.asset.clone(),
            action: decision.action.clone(),
            amount: decision.amount.map(f64::to_bits),
            leverage: decision.leverage.map(f64::to_bits),
            portfolio_size: decision.portfolio_size.map(f64::to_bits),
            jurisdictions: requested.to_vec(),
            investor: context.map(|c| c.investor_class).unwrap_or_default(),
            insider: context.is_some_and(|c| c.insider_information),
            conflict: context.is_some_and(|c| c.conflict_of_interest),
            influence: context.is_some_and(|c| c.market_influence),
        }
    }
}

struct LoadedRules {
    rules: ComplianceRules,
    generation: u64,
}

struct ResultCache {
    generation: u64,
    entries: LruCache<CacheKey, ComplianceResult>,
}

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

fn capacity(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap_or(NonZeroUsize::MIN)
}

/// Longest jurisdiction code kept from a context. Codes flow into warnings
/// and cache keys.
const MAX_JURISDICTION_CODE_LEN: usize = 16;

/// Uppercase alphanumerics, `-` and `_`, bounded in length.
fn normalize_jurisdiction(code: &str) -> String {
    code.trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(MAX_JURISDICTION_CODE_LEN)
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Normalized jurisdiction codes requested by the context, in order, deduplicated.
fn requested_jurisdictions(context: Option<&VerificationContext>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for code in context.map(|c| c.jurisdictions.as_slice()).unwrap_or_default() {
        let code = normalize_jurisdiction(code);
        if !code.is_empty() && !out.contains(&code) {
            out.push(code);
        }
    }
    out
}

/// Resolve requested codes against the table. Unknown codes are reported;
/// if none are known, the configured defaults apply.
fn resolve(rules: &ComplianceRules, requested: &[String]) -> (Vec<String>, Vec<String>) {
    let mut notes = Vec::new();
    let known: Vec<String> = requested
        .iter()
        .filter(|code| {
            let found = rules.jurisdictions.contains_key(code.as_str());
            if !found {
                notes.push(format!("No compliance rules for jurisdiction '{code}'"));
            }
            found
        })
        .cloned()
        .collect();

    if known.is_empty() {
        (rules.default_jurisdictions.clone(), notes)
    } else {
        (known, notes)
    }
}

fn evaluate(
    rules: &ComplianceRules,
    decision: &Decision,
    context: Option<&VerificationContext>,
    requested: &[String],
) -> ComplianceResult {
    let (jurisdictions, mut warnings) = resolve(rules, requested);

    let mut frameworks: Vec<String> = Vec::new();
    let mut breakdown = ComplianceBreakdown::default();
    let mut violations = Vec::new();

    for code in &jurisdictions {
        let Some(j) = rules.jurisdictions.get(code) else {
            continue;
        };
        for framework in &j.frameworks {
            if !frameworks.contains(framework) {
                frameworks.push(framework.clone());
            }
        }

        let found = checks::evaluate(code, j, decision, context);
        let b = &found.breakdown;
        breakdown.asset_restriction = breakdown.asset_restriction.min(b.asset_restriction);
        breakdown.position_limits = breakdown.position_limits.min(b.position_limits);
        breakdown.leverage_limits = breakdown.leverage_limits.min(b.leverage_limits);
        breakdown.reporting = breakdown.reporting.min(b.reporting);
        breakdown.disclosure = breakdown.disclosure.min(b.disclosure);
        violations.extend(found.violations);
        for w in found.warnings {
            if !warnings.contains(&w) {
                warnings.push(w);
            }
        }
    }

    let score = (breakdown.mean() * 100.0).round() / 100.0;
    let (tier, severity) = match violations.iter().map(|v| v.severity).max() {
        Some(worst) => (ComplianceTier::NonCompliant, worst),
        None if warnings.is_empty() => (ComplianceTier::Compliant, Severity::Low),
        None if score < 80.0 => (ComplianceTier::CompliantWithWarnings, Severity::Medium),
        None => (ComplianceTier::CompliantWithWarnings, Severity::Low),
    };

    ComplianceResult {
        compliant: violations.is_empty(),
        score,
        tier,
        severity,
        violations,
        warnings,
        jurisdictions,
        frameworks,
        breakdown,
        degraded: false,
    }
}

/// The Aegis compliance checker.
pub struct JurisdictionComplianceChecker {
    rules: RwLock<Arc<LoadedRules>>,
    cache: Mutex<ResultCache>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl JurisdictionComplianceChecker {
    pub fn new(rules: ComplianceRules) -> AegisResult<Self> {
        rules.validate()?;
        let cache = ResultCache {
            generation: 0,
            entries: LruCache::new(capacity(rules.cache_capacity)),
        };
        Ok(Self {
            rules: RwLock::new(Arc::new(LoadedRules { rules, generation: 0 })),
            cache: Mutex::new(cache),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    pub fn with_default_rules() -> AegisResult<Self> {
        Self::new(default_rules()?)
    }

    pub fn rules(&self) -> ComplianceRules {
        self.rules.read().rules.clone()
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.lock().entries.len(),
        }
    }
}

impl ComplianceChecker for JurisdictionComplianceChecker {
    fn check(
        &self,
        decision: &Decision,
        context: Option<&VerificationContext>,
    ) -> AegisResult<ComplianceResult> {
        let loaded = self.rules.read().clone();
        let requested = requested_jurisdictions(context);
        let key = CacheKey::new(decision, context, &requested);

        {
            let mut cache = self.cache.lock();
            if cache.generation == loaded.generation {
                if let Some(hit) = cache.entries.get(&key) {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(hit.clone());
                }
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let result = evaluate(&loaded.rules, decision, context, &requested);
        if !result.compliant {
            warn!(
                asset = %decision.asset,
                violations = result.violations.len(),
                "compliance violations found"
            );
        }
        debug!(
            score = result.score,
            tier = ?result.tier,
            jurisdictions = ?result.jurisdictions,
            "compliance check complete"
        );

        let mut cache = self.cache.lock();
        if cache.generation == loaded.generation {
            cache.entries.put(key, result.clone());
        }
        Ok(result)
    }

    fn update_rules(&self, rules: ComplianceRules) -> AegisResult<()> {
        rules.validate()?;
        let cache_capacity = rules.cache_capacity;

        let generation = {
            let mut current = self.rules.write();
            let generation = current.generation + 1;
            *current = Arc::new(LoadedRules { rules, generation });
            generation
        };

        let mut cache = self.cache.lock();
        cache.entries.clear();
        cache.entries.resize(capacity(cache_capacity));
        cache.generation = generation;

        info!(generation, "compliance rules replaced, cache invalidated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use aegis_contracts::assessment::ComplianceCheck;

    use super::*;

    fn checker() -> JurisdictionComplianceChecker {
        JurisdictionComplianceChecker::with_default_rules().unwrap()
    }

    fn ctx(jurisdictions: &[&str]) -> VerificationContext {
        VerificationContext {
            jurisdictions: jurisdictions.iter().map(|s| s.to_string()).collect(),
            ..VerificationContext::default()
        }
    }

    // ── Resolution ───────────────────────────────────────────────────────────

    #[test]
    fn defaults_apply_without_context() {
        let result = checker().check(&Decision::new("buy", "BTC"), None).unwrap();
        assert!(result.compliant);
        assert_eq!(result.tier, ComplianceTier::Compliant);
        assert_eq!(result.jurisdictions, vec!["US"]);
        assert_eq!(result.frameworks, vec!["SEC", "CFTC", "FinCEN"]);
        assert_eq!(result.score, 100.0);
    }

    #[test]
    fn context_override_is_normalized_and_deduplicated() {
        let c = ctx(&[" eu", "UK", "EU"]);
        let result = checker().check(&Decision::new("buy", "BTC"), Some(&c)).unwrap();
        assert_eq!(result.jurisdictions, vec!["EU", "UK"]);
        assert!(result.frameworks.contains(&"MiCA".to_string()));
        assert!(result.frameworks.contains(&"FCA".to_string()));
    }

    #[test]
    fn unknown_jurisdiction_falls_back_to_defaults() {
        let c = ctx(&["XX"]);
        let result = checker().check(&Decision::new("buy", "BTC"), Some(&c)).unwrap();
        assert_eq!(result.jurisdictions, vec!["US"]);
        assert!(result.warnings[0].contains("'XX'"));
        assert_eq!(result.tier, ComplianceTier::CompliantWithWarnings);
    }

    #[test]
    fn oversized_jurisdiction_code_is_bounded_in_warnings() {
        let long = format!(" zz<script>{}", "Q".repeat(4096));
        let c = ctx(&[long.as_str()]);
        let result = checker().check(&Decision::new("buy", "BTC"), Some(&c)).unwrap();
        assert_eq!(result.jurisdictions, vec!["US"]);
        assert_eq!(
            result.warnings[0],
            "No compliance rules for jurisdiction 'ZZSCRIPTQQQQQQQQ'"
        );
        assert!(result.warnings.iter().all(|w| w.len() < 80));
    }

    #[test]
    fn punctuation_only_codes_are_ignored() {
        let c = ctx(&["<>", "!!", "eu"]);
        let result = checker().check(&Decision::new("buy", "BTC"), Some(&c)).unwrap();
        assert_eq!(result.jurisdictions, vec!["EU"]);
        assert!(result.warnings.iter().all(|w| !w.contains("jurisdiction")));
    }

    // ── Aggregation ──────────────────────────────────────────────────────────

    #[test]
    fn reporting_threshold_is_compliant_with_warnings() {
        let mut d = Decision::new("buy", "BTC");
        d.amount = Some(15_000.0);
        let result = checker().check(&d, None).unwrap();
        assert!(result.compliant);
        assert_eq!(result.tier, ComplianceTier::CompliantWithWarnings);
        assert_eq!(result.severity, Severity::Low);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.breakdown.reporting, 85.0);
    }

    #[test]
    fn strictest_jurisdiction_sets_each_check_score() {
        let mut d = Decision::new("buy", "BTC");
        d.leverage = Some(3.0);
        // 3x is fine for US retail (4x) but breaches EU retail (2x)
        let result = checker().check(&d, Some(&ctx(&["US", "EU"]))).unwrap();
        assert!(!result.compliant);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].jurisdiction, "EU");
        assert_eq!(result.violations[0].check, ComplianceCheck::LeverageLimits);
        assert_eq!(result.breakdown.leverage_limits, 60.0);
        assert_eq!(result.tier, ComplianceTier::NonCompliant);
        assert_eq!(result.severity, Severity::High);
    }

    #[test]
    fn excessive_leverage_is_critical() {
        let mut d = Decision::new("buy", "BTC");
        d.leverage = Some(150.0);
        let result = checker().check(&d, None).unwrap();
        assert_eq!(result.severity, Severity::Critical);
        assert!(!result.compliant);
    }

    // ── Cache ────────────────────────────────────────────────────────────────

    #[test]
    fn identical_inputs_hit_the_cache() {
        let checker = checker();
        let d = Decision::new("buy", "BTC");
        let first = checker.check(&d, None).unwrap();
        let second = checker.check(&d, None).unwrap();
        assert_eq!(first, second);

        let stats = checker.cache_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn different_context_flags_miss_the_cache() {
        let checker = checker();
        let d = Decision::new("buy", "BTC");
        checker.check(&d, None).unwrap();
        let insider = VerificationContext {
            insider_information: true,
            ..VerificationContext::default()
        };
        let result = checker.check(&d, Some(&insider)).unwrap();
        assert!(!result.compliant);
        assert_eq!(checker.cache_stats().misses, 2);
    }

    #[test]
    fn update_invalidates_cached_verdicts() {
        let checker = checker();
        let mut d = Decision::new("buy", "BTC");
        d.leverage = Some(10.0);
        assert!(!checker.check(&d, None).unwrap().compliant);

        let mut rules = checker.rules();
        if let Some(us) = rules.jurisdictions.get_mut("US") {
            us.retail_max_leverage = 50.0;
        }
        checker.update_rules(rules).unwrap();
        assert_eq!(checker.cache_stats().entries, 0);

        assert!(checker.check(&d, None).unwrap().compliant);
    }

    #[test]
    fn cache_is_bounded() {
        let mut rules = default_rules().unwrap();
        rules.cache_capacity = 2;
        let checker = JurisdictionComplianceChecker::new(rules).unwrap();
        for asset in ["BTC", "ETH", "SOL", "ADA"] {
            checker.check(&Decision::new("buy", asset), None).unwrap();
        }
        assert_eq!(checker.cache_stats().entries, 2);
    }

    #[test]
    fn invalid_update_is_rejected() {
        let checker = checker();
        let mut rules = checker.rules();
        rules.default_jurisdictions = vec!["ZZ".to_string()];
        assert!(checker.update_rules(rules).is_err());
        assert_eq!(checker.rules(), default_rules().unwrap());
    }
}
