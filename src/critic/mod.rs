//! Critic validator
//!
//! Rule-based review of a finished session log against the profile it was
//! built from. Deterministic: no generated text takes part in scoring.

pub mod rules;

use crate::error::CollaborationError;
use crate::models::{
    AgentMessage, HallucinationFlag, IssueCategory, Severity, ValidationError, ValidationResult,
    ValidationStatus,
};
use crate::profile::FinancialProfile;
use crate::Result;
use tracing::{error, info};

pub const CRITIC_ID: &str = "critic_agent";

/// Moderate concerns tolerated before clarification is needed.
const MAX_MODERATE_CONCERNS: usize = 2;

/// Which result list a rule's findings land in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Critical,
    Moderate,
    Minor,
    /// Hallucination flags only; no errors
    Advisory,
}

#[derive(Debug, Default)]
pub struct RuleOutcome {
    pub errors: Vec<ValidationError>,
    pub hallucinations: Vec<HallucinationFlag>,
}

pub trait CriticRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn tier(&self) -> Tier;

    fn check(&self, messages: &[AgentMessage], profile: &FinancialProfile) -> RuleOutcome;
}

pub struct CriticValidator {
    rules: Vec<Box<dyn CriticRule>>,
}

impl CriticValidator {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn add_rule(&mut self, rule: Box<dyn CriticRule>) {
        self.rules.push(rule);
    }

    /// Never fails: an internal error becomes a terminal REQUIRES_REVISION.
    pub fn validate(&self, messages: &[AgentMessage], profile: &FinancialProfile) -> ValidationResult {
        match self.try_validate(messages, profile) {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Critic failed, forcing revision");
                failure_result(&e)
            }
        }
    }

    pub fn try_validate(
        &self,
        messages: &[AgentMessage],
        profile: &FinancialProfile,
    ) -> Result<ValidationResult> {
        if !profile.is_well_formed() {
            return Err(CollaborationError::ValidationFailed(
                "profile carries non-finite figures".to_string(),
            ));
        }

        let mut critical_errors = Vec::new();
        let mut moderate_concerns = Vec::new();
        let mut minor_suggestions = Vec::new();
        let mut hallucination_flags = Vec::new();

        for rule in &self.rules {
            let outcome = rule.check(messages, profile);
            if !outcome.errors.is_empty() || !outcome.hallucinations.is_empty() {
                info!(
                    rule = rule.name(),
                    findings = outcome.errors.len(),
                    flags = outcome.hallucinations.len(),
                    "Critic rule fired"
                );
            }

            match rule.tier() {
                Tier::Critical => critical_errors.extend(outcome.errors),
                Tier::Moderate => moderate_concerns.extend(outcome.errors),
                Tier::Minor => minor_suggestions.extend(outcome.errors),
                Tier::Advisory => {}
            }
            hallucination_flags.extend(outcome.hallucinations);
        }

        let validation_status = status_for(critical_errors.len(), moderate_concerns.len());
        let confidence = confidence_score(
            critical_errors.len(),
            moderate_concerns.len(),
            minor_suggestions.len(),
        );

        let overall_assessment = format!(
            "{} after reviewing {} messages: {} critical, {} moderate, {} minor, {} hallucination flag(s).",
            match validation_status {
                ValidationStatus::Approved => "Approved",
                ValidationStatus::NeedsClarification => "Needs clarification",
                ValidationStatus::RequiresRevision => "Requires revision",
            },
            messages.len(),
            critical_errors.len(),
            moderate_concerns.len(),
            minor_suggestions.len(),
            hallucination_flags.len()
        );

        info!(
            status = ?validation_status,
            confidence = confidence,
            critical = critical_errors.len(),
            moderate = moderate_concerns.len(),
            minor = minor_suggestions.len(),
            "Validation completed"
        );

        Ok(ValidationResult {
            validation_status,
            confidence_score: confidence,
            critical_errors,
            moderate_concerns,
            minor_suggestions,
            hallucination_flags,
            overall_assessment,
        })
    }
}

impl Default for CriticValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Critic with every built-in rule registered.
pub fn create_default_critic() -> CriticValidator {
    let mut critic = CriticValidator::new();
    critic.add_rule(Box::new(rules::DataConsistencyRule));
    critic.add_rule(Box::new(rules::ContradictionRule));
    critic.add_rule(Box::new(rules::UnrealisticAssumptionRule));
    critic.add_rule(Box::new(rules::MissingRiskAssessmentRule));
    critic.add_rule(Box::new(rules::SpecificityRule));
    critic.add_rule(Box::new(rules::HallucinationRule));
    critic
}

pub fn status_for(critical: usize, moderate: usize) -> ValidationStatus {
    if critical > 0 {
        ValidationStatus::RequiresRevision
    } else if moderate > MAX_MODERATE_CONCERNS {
        ValidationStatus::NeedsClarification
    } else {
        ValidationStatus::Approved
    }
}

/// 80 less 20 per critical, 10 per moderate and 5 per minor finding, within 0-100.
pub fn confidence_score(critical: usize, moderate: usize, minor: usize) -> u8 {
    let score = 80 - 20 * critical as i64 - 10 * moderate as i64 - 5 * minor as i64;
    score.clamp(0, 100) as u8
}

fn failure_result(e: &CollaborationError) -> ValidationResult {
    ValidationResult {
        validation_status: ValidationStatus::RequiresRevision,
        confidence_score: 0,
        critical_errors: vec![ValidationError {
            category: IssueCategory::ValidatorFailure,
            description: format!("Validation process failed: {}", e),
            location: CRITIC_ID.to_string(),
            impact: Severity::High,
            suggested_correction: "Review the recommendation manually".to_string(),
        }],
        moderate_concerns: Vec::new(),
        minor_suggestions: Vec::new(),
        hallucination_flags: Vec::new(),
        overall_assessment: "Validation could not be completed".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConfidenceLevel, MessageType};
    use crate::profile::ProfileInputs;
    use serde_json::json;

    fn profile() -> FinancialProfile {
        FinancialProfile::from_inputs(ProfileInputs {
            monthly_income: 80935.0,
            monthly_expenses: 65000.0,
            ..Default::default()
        })
    }

    fn analysis(agent_id: &str, content: &str) -> AgentMessage {
        AgentMessage::new(agent_id, MessageType::Analysis, content, ConfidenceLevel::Medium)
    }

    struct Fixed(Tier, usize);

    impl CriticRule for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn tier(&self) -> Tier {
            self.0
        }

        fn check(&self, _: &[AgentMessage], _: &FinancialProfile) -> RuleOutcome {
            let errors = (0..self.1)
                .map(|i| ValidationError {
                    category: IssueCategory::UnrealisticAssumption,
                    description: format!("finding {}", i),
                    location: "test_agent".to_string(),
                    impact: Severity::Medium,
                    suggested_correction: String::new(),
                })
                .collect();
            RuleOutcome {
                errors,
                hallucinations: Vec::new(),
            }
        }
    }

    #[test]
    fn test_income_mismatch_requires_revision() {
        let msg = analysis("cash_flow_agent", "Income looks fine.")
            .with_data("monthly_income", json!(80935.0 + 1500.0));

        let result = create_default_critic().validate(&[msg], &profile());
        assert_eq!(result.validation_status, ValidationStatus::RequiresRevision);
        assert!(result
            .critical_errors
            .iter()
            .any(|e| e.category == IssueCategory::DataInconsistency));
    }

    #[test]
    fn test_three_moderate_concerns_need_clarification() {
        let mut critic = CriticValidator::new();
        critic.add_rule(Box::new(Fixed(Tier::Moderate, 3)));

        let result = critic.validate(&[], &profile());
        assert!(result.critical_errors.is_empty());
        assert_eq!(result.moderate_concerns.len(), 3);
        assert_eq!(result.validation_status, ValidationStatus::NeedsClarification);
        assert_eq!(result.confidence_score, 50);
    }

    #[test]
    fn test_two_moderate_concerns_still_approved() {
        let mut critic = CriticValidator::new();
        critic.add_rule(Box::new(Fixed(Tier::Moderate, 2)));
        critic.add_rule(Box::new(Fixed(Tier::Minor, 1)));

        let result = critic.validate(&[], &profile());
        assert!(result.is_approved());
        assert_eq!(result.confidence_score, 55);
    }

    #[test]
    fn test_confidence_score_formula() {
        for critical in 0..6 {
            for moderate in 0..6 {
                for minor in 0..6 {
                    let expected = (80 - 20 * critical as i64 - 10 * moderate as i64
                        - 5 * minor as i64)
                        .clamp(0, 100) as u8;
                    assert_eq!(confidence_score(critical, moderate, minor), expected);
                }
            }
        }
        assert_eq!(confidence_score(0, 0, 0), 80);
        assert_eq!(confidence_score(5, 0, 0), 0);
    }

    #[test]
    fn test_validator_failure_is_never_approved() {
        let broken = FinancialProfile::from_inputs(ProfileInputs {
            monthly_income: f64::INFINITY,
            ..Default::default()
        });

        let result = create_default_critic().validate(&[], &broken);
        assert_eq!(result.validation_status, ValidationStatus::RequiresRevision);
        assert_eq!(result.confidence_score, 0);
        assert_eq!(result.critical_errors.len(), 1);
        assert_eq!(result.critical_errors[0].category, IssueCategory::ValidatorFailure);
        assert_eq!(result.critical_errors[0].location, CRITIC_ID);
        assert!(result.critical_errors[0]
            .description
            .starts_with("Validation process failed"));
    }

    #[test]
    fn test_clean_log_is_approved() {
        let msg = analysis(
            "cash_flow_agent",
            "Cash flow: income ₹80,935, expenses ₹65,000, monthly surplus ₹15,935.",
        )
        .with_data("calculations", json!({ "monthly_income": 80935.0 }));

        let result = create_default_critic().validate(&[msg], &profile());
        assert!(result.is_approved());
        assert_eq!(result.confidence_score, 80);
        assert!(result.hallucination_flags.is_empty());
    }
}
