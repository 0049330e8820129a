//! The five per-jurisdiction checks.
//!
//! Every check starts at 100 and loses points per finding. A breach of a
//! limit is a violation under mandatory enforcement and a warning under
//! advisory enforcement. Insider information is a violation in every mode.

use aegis_contracts::{
    assessment::{ComplianceBreakdown, ComplianceCheck, ComplianceViolation, Severity},
    decision::{Decision, InvestorClass, VerificationContext},
    rules::{AssetPolicy, EnforcementMode, JurisdictionRules},
};

const CRITICAL_PENALTY: f64 = 60.0;
const HIGH_PENALTY: f64 = 40.0;
const WARNING_PENALTY: f64 = 15.0;

/// Findings for one jurisdiction.
#[derive(Debug, Default)]
pub(crate) struct Findings {
    pub breakdown: ComplianceBreakdown,
    pub violations: Vec<ComplianceViolation>,
    pub warnings: Vec<String>,
}

impl Findings {
    fn deduct(&mut self, check: ComplianceCheck, points: f64) {
        let b = &mut self.breakdown;
        let slot = match check {
            ComplianceCheck::AssetRestriction => &mut b.asset_restriction,
            ComplianceCheck::PositionLimits => &mut b.position_limits,
            ComplianceCheck::LeverageLimits => &mut b.leverage_limits,
            ComplianceCheck::Reporting => &mut b.reporting,
            ComplianceCheck::Disclosure => &mut b.disclosure,
        };
        *slot = (*slot - points).max(0.0);
    }

    fn violation(&mut self, code: &str, check: ComplianceCheck, severity: Severity, message: String) {
        let penalty = if severity == Severity::Critical {
            CRITICAL_PENALTY
        } else {
            HIGH_PENALTY
        };
        self.deduct(check, penalty);
        self.violations.push(ComplianceViolation {
            jurisdiction: code.to_string(),
            check,
            severity,
            message,
        });
    }

    fn warning(&mut self, check: ComplianceCheck, message: String) {
        self.deduct(check, WARNING_PENALTY);
        self.warnings.push(message);
    }
}

struct Evaluation<'a> {
    code: &'a str,
    rules: &'a JurisdictionRules,
    decision: &'a Decision,
    investor: InvestorClass,
    findings: Findings,
}

impl Evaluation<'_> {
    /// A limit breach: violation when mandatory, warning when advisory.
    fn breach(&mut self, check: ComplianceCheck, severity: Severity, message: String) {
        match self.rules.enforcement {
            EnforcementMode::Mandatory => {
                self.findings.violation(self.code, check, severity, message)
            }
            EnforcementMode::Advisory => self.findings.warning(check, format!("{message} (advisory)")),
        }
    }

    fn warn(&mut self, check: ComplianceCheck, message: String) {
        self.findings.warning(check, message);
    }

    fn apply_policy(&mut self, policy: AssetPolicy, prohibited: String, warned: String) {
        match policy {
            AssetPolicy::Prohibit => self.breach(ComplianceCheck::AssetRestriction, Severity::High, prohibited),
            AssetPolicy::Warn => self.warn(ComplianceCheck::AssetRestriction, warned),
            AssetPolicy::Allow => {}
        }
    }

    fn asset_restriction(&mut self) {
        let code = self.code;
        let asset = self.decision.asset.as_str();
        let base = asset.split(['-', '/']).next().unwrap_or(asset);

        if self.rules.restricted_assets.iter().any(|r| r == asset || r == base) {
            self.breach(
                ComplianceCheck::AssetRestriction,
                Severity::Critical,
                format!("[{code}] Asset '{asset}' is restricted"),
            );
        }

        let derivative = self.rules.derivative_markers.iter().any(|m| asset.contains(m.as_str()))
            || self.rules.derivative_actions.iter().any(|a| *a == self.decision.action);
        if derivative {
            // Derivative bans target retail investors.
            let policy = match (self.rules.derivative_policy, self.investor) {
                (AssetPolicy::Prohibit, InvestorClass::Professional) => AssetPolicy::Warn,
                (policy, _) => policy,
            };
            self.apply_policy(
                policy,
                format!("[{code}] Derivative products are prohibited for retail investors"),
                format!("[{code}] Derivative product; additional risk disclosure applies"),
            );
        }

        if self.rules.stablecoin_markers.iter().any(|m| asset.contains(m.as_str())) {
            self.apply_policy(
                self.rules.stablecoin_policy,
                format!("[{code}] Stablecoin '{asset}' is not authorised"),
                format!("[{code}] Stablecoin '{asset}' is subject to additional restrictions"),
            );
        }
    }

    fn position_limits(&mut self) {
        let code = self.code;
        let Some(amount) = self.decision.amount else {
            return;
        };
        let near = self.rules.near_limit_ratio;

        let cap = self.rules.max_position_size;
        if amount > cap {
            self.breach(
                ComplianceCheck::PositionLimits,
                Severity::High,
                format!("[{code}] Position size exceeds the jurisdiction limit"),
            );
        } else if amount >= cap * near {
            self.warn(
                ComplianceCheck::PositionLimits,
                format!("[{code}] Position size is near the jurisdiction limit"),
            );
        }

        if let Some(portfolio) = self.decision.portfolio_size.filter(|p| *p > 0.0) {
            let concentration = amount / portfolio;
            let max = self.rules.max_concentration;
            let pct = (max * 100.0).round();
            if concentration > max {
                self.breach(
                    ComplianceCheck::PositionLimits,
                    Severity::High,
                    format!("[{code}] Position exceeds the {pct}% portfolio concentration limit"),
                );
            } else if concentration >= max * near {
                self.warn(
                    ComplianceCheck::PositionLimits,
                    format!("[{code}] Position is near the {pct}% portfolio concentration limit"),
                );
            }
        }
    }

    fn leverage_limits(&mut self) {
        let code = self.code;
        let leverage = match self.decision.leverage {
            Some(l) if l > 1.0 => l,
            _ => return,
        };
        let (limit, class) = match self.investor {
            InvestorClass::Retail => (self.rules.retail_max_leverage, "retail"),
            InvestorClass::Professional => (self.rules.professional_max_leverage, "professional"),
        };

        if leverage > limit {
            let severity = if leverage >= limit * 2.0 {
                Severity::Critical
            } else {
                Severity::High
            };
            self.breach(
                ComplianceCheck::LeverageLimits,
                severity,
                format!("[{code}] Leverage {leverage}x exceeds the {limit}x {class} limit"),
            );
        } else if leverage >= limit * self.rules.near_limit_ratio {
            self.warn(
                ComplianceCheck::LeverageLimits,
                format!("[{code}] Leverage is near the {limit}x {class} limit"),
            );
        }
    }

    fn reporting(&mut self) {
        let code = self.code;
        if self
            .decision
            .amount
            .is_some_and(|a| a >= self.rules.reporting_threshold)
        {
            self.warn(
                ComplianceCheck::Reporting,
                format!("[{code}] Amount meets the reporting threshold; regulatory reporting may be required"),
            );
        }
    }

    fn disclosure(&mut self, context: Option<&VerificationContext>) {
        let code = self.code;
        let Some(ctx) = context else {
            return;
        };
        if ctx.insider_information {
            self.findings.violation(
                code,
                ComplianceCheck::Disclosure,
                Severity::Critical,
                format!("[{code}] Trading on insider information is prohibited"),
            );
        }
        if ctx.conflict_of_interest {
            self.warn(
                ComplianceCheck::Disclosure,
                format!("[{code}] Conflict of interest must be disclosed"),
            );
        }
        if ctx.market_influence {
            self.warn(
                ComplianceCheck::Disclosure,
                format!("[{code}] Potential market influence must be disclosed"),
            );
        }
    }
}

/// Run all five checks for one jurisdiction.
pub(crate) fn evaluate(
    code: &str,
    rules: &JurisdictionRules,
    decision: &Decision,
    context: Option<&VerificationContext>,
) -> Findings {
    let mut eval = Evaluation {
        code,
        rules,
        decision,
        investor: context.map(|c| c.investor_class).unwrap_or_default(),
        findings: Findings::default(),
    };
    eval.asset_restriction();
    eval.position_limits();
    eval.leverage_limits();
    eval.reporting();
    eval.disclosure(context);
    eval.findings
}
