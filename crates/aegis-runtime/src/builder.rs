//! Assembles a `LocalVerificationEngine` from the default Aegis components.

use std::{path::Path, sync::Arc};

use tracing::info;
use uuid::Uuid;

use aegis_audit::InMemoryAuditWriter;
use aegis_compliance::JurisdictionComplianceChecker;
use aegis_contracts::{
    error::AegisResult,
    rules::{ComplianceRules, PatternRules, RiskRules},
};
use aegis_core::{traits::MetricsSink, EngineConfig, LocalVerificationEngine};
use aegis_crypto::{CryptographicProvider, DigestAttestationGenerator};
use aegis_patterns::RegexPatternDetector;
use aegis_risk::RuleBasedRiskAnalyzer;
use aegis_validate::DecisionValidator;

/// A built engine plus handles to the components callers inspect directly.
pub struct AegisRuntime {
    engine: LocalVerificationEngine,
    risk: Arc<RuleBasedRiskAnalyzer>,
    patterns: Arc<RegexPatternDetector>,
    compliance: Arc<JurisdictionComplianceChecker>,
    provider: Arc<CryptographicProvider>,
    audit: Option<Arc<InMemoryAuditWriter>>,
}

impl AegisRuntime {
    pub fn engine(&self) -> &LocalVerificationEngine {
        &self.engine
    }

    pub fn risk(&self) -> &RuleBasedRiskAnalyzer {
        &self.risk
    }

    pub fn patterns(&self) -> &RegexPatternDetector {
        &self.patterns
    }

    pub fn compliance(&self) -> &JurisdictionComplianceChecker {
        &self.compliance
    }

    pub fn provider(&self) -> &CryptographicProvider {
        &self.provider
    }

    /// The audit trail, present when `audit_enabled` is set.
    pub fn audit(&self) -> Option<&InMemoryAuditWriter> {
        self.audit.as_deref()
    }
}

/// Builder over `EngineConfig` and optional rule-table overrides.
///
/// Anything not overridden uses the embedded default tables and a freshly
/// generated signing key.
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    risk_rules: Option<RiskRules>,
    pattern_rules: Option<PatternRules>,
    compliance_rules: Option<ComplianceRules>,
    signing_key: Option<[u8; 32]>,
    metrics: Option<Arc<dyn MetricsSink>>,
}

impl EngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Start from a TOML engine configuration file.
    pub fn from_file(path: &Path) -> AegisResult<Self> {
        Ok(Self::new(EngineConfig::from_file(path)?))
    }

    pub fn risk_rules(mut self, rules: RiskRules) -> Self {
        self.risk_rules = Some(rules);
        self
    }

    pub fn pattern_rules(mut self, rules: PatternRules) -> Self {
        self.pattern_rules = Some(rules);
        self
    }

    pub fn compliance_rules(mut self, rules: ComplianceRules) -> Self {
        self.compliance_rules = Some(rules);
        self
    }

    /// Sign with a persisted Ed25519 secret instead of a generated one.
    pub fn signing_key(mut self, secret: [u8; 32]) -> Self {
        self.signing_key = Some(secret);
        self
    }

    pub fn metrics(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(sink);
        self
    }

    pub fn build(self) -> AegisResult<AegisRuntime> {
        let config = self.config;
        config.validate()?;

        let risk = Arc::new(match self.risk_rules {
            Some(rules) => RuleBasedRiskAnalyzer::new(rules)?,
            None => RuleBasedRiskAnalyzer::with_default_rules()?,
        });
        let patterns = Arc::new(match self.pattern_rules {
            Some(rules) => RegexPatternDetector::new(rules)?,
            None => RegexPatternDetector::with_default_rules()?,
        });
        let compliance = Arc::new(match self.compliance_rules {
            Some(rules) => JurisdictionComplianceChecker::new(rules)?,
            None => JurisdictionComplianceChecker::with_default_rules()?,
        });

        let max_age = config.max_signature_age_secs;
        let provider = Arc::new(match self.signing_key {
            Some(secret) => CryptographicProvider::from_bytes(&secret, max_age),
            None => CryptographicProvider::generate(max_age),
        });

        let audit = config.audit_enabled.then(|| {
            Arc::new(InMemoryAuditWriter::with_capacity(
                format!("aegis-{}", Uuid::new_v4()),
                config.max_audit_events,
            ))
        });
        let validator = Arc::new(DecisionValidator::new(config.validation.clone()));

        let mut engine = LocalVerificationEngine::new(
            config,
            validator,
            risk.clone(),
            patterns.clone(),
            compliance.clone(),
            provider.clone(),
        )?
        .with_attestation(Arc::new(DigestAttestationGenerator));
        if let Some(audit) = &audit {
            engine = engine.with_audit(audit.clone());
        }
        if let Some(metrics) = self.metrics {
            engine = engine.with_metrics(metrics);
        }

        info!(
            fingerprint = %provider.fingerprint(),
            audit = audit.is_some(),
            attestation = engine.config().attestation_enabled,
            "verification engine ready"
        );

        Ok(AegisRuntime {
            engine,
            risk,
            patterns,
            compliance,
            provider,
            audit,
        })
    }
}

/// Build an engine with every default component.
pub fn build_default_engine(config: EngineConfig) -> AegisResult<AegisRuntime> {
    EngineBuilder::new(config).build()
}
