//! Built-in critic rules.

use super::{CriticRule, RuleOutcome, Tier};
use crate::models::{
    AgentMessage, HallucinationFlag, HallucinationKind, IssueCategory, MessageType, Severity,
    ValidationError,
};
use crate::profile::{format_currency, FinancialProfile};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

lazy_static! {
    static ref CURRENCY_AMOUNT: Regex =
        Regex::new(r"(?i)(₹\s?\d[\d,]*|\brs\.?\s?\d[\d,]*|\binr\s?\d[\d,]*)")
            .expect("valid currency regex");
    static ref TIME_UNIT: Regex =
        Regex::new(r"(?i)\b(days?|weeks?|months?|years?|monthly|weekly|yearly|annually)\b")
            .expect("valid time unit regex");
    static ref SIP_TOKEN: Regex = Regex::new(r"(?i)\bsips?\b").expect("valid sip regex");
    static ref ANNUAL_PERCENT: Regex = Regex::new(
        r"(?i)(\d+(?:\.\d+)?)\s*%\s*(?:annual|annually|per annum|p\.a\.|a year|per year|yearly)"
    )
    .expect("valid annual rate regex");
}

/// Rupee tolerance for a claimed figure against the profile.
pub const CLAIM_TOLERANCE: f64 = 1000.0;

/// Proposed change above this share of its baseline is unrealistic.
pub const MAX_DELTA_SHARE: f64 = 0.5;

/// Annual return above which a claim is an unrealistic projection.
pub const MAX_ANNUAL_RETURN: f64 = 20.0;

const RISK_TOKENS: &[&str] = &["risk", "volatil", "diversif", "downside"];

const ACTION_VERBS: &[&str] = &["increase", "recommend"];

/// Messages the content rules read; the critic never grades its own output.
fn reviewed(messages: &[AgentMessage]) -> impl Iterator<Item = &AgentMessage> {
    messages
        .iter()
        .filter(|m| m.message_type != MessageType::Validation)
}

/// Content followed by each recommendation, as separate items.
fn statements(message: &AgentMessage) -> Vec<&str> {
    let mut items = vec![message.content.as_str()];
    items.extend(message.data_list("recommendations"));
    items
}

fn issue(
    category: IssueCategory,
    description: String,
    location: &str,
    impact: Severity,
    suggested_correction: &str,
) -> ValidationError {
    ValidationError {
        category,
        description,
        location: location.to_string(),
        impact,
        suggested_correction: suggested_correction.to_string(),
    }
}

//
// ================= Critical =================
//

pub struct DataConsistencyRule;

impl DataConsistencyRule {
    fn profile_figures(profile: &FinancialProfile) -> [(&'static str, f64); 6] {
        [
            ("monthly_income", profile.monthly_income()),
            ("monthly_expenses", profile.monthly_expenses()),
            ("discretionary_income", profile.discretionary_income()),
            ("total_debt", profile.total_debt),
            ("net_worth", profile.net_worth),
            ("portfolio_value", profile.portfolio_value),
        ]
    }
}

impl CriticRule for DataConsistencyRule {
    fn name(&self) -> &'static str {
        "data_consistency"
    }

    fn tier(&self) -> Tier {
        Tier::Critical
    }

    fn check(&self, messages: &[AgentMessage], profile: &FinancialProfile) -> RuleOutcome {
        let mut outcome = RuleOutcome::default();

        for message in reviewed(messages) {
            for (key, actual) in Self::profile_figures(profile) {
                for claimed in message.numeric_claims(key) {
                    if (claimed - actual).abs() > CLAIM_TOLERANCE {
                        outcome.errors.push(issue(
                            IssueCategory::DataInconsistency,
                            format!(
                                "{} claimed as {} but the profile shows {}",
                                key,
                                format_currency(claimed),
                                format_currency(actual)
                            ),
                            &message.agent_id,
                            Severity::High,
                            "Use the figure from the verified financial profile",
                        ));
                    }
                }
            }
        }
        outcome
    }
}

pub struct ContradictionRule;

impl ContradictionRule {
    fn raises_sip(text: &str) -> bool {
        text.contains("increase") && SIP_TOKEN.is_match(text)
    }

    fn raises_emergency_fund(text: &str) -> bool {
        text.contains("increase") && text.contains("emergency fund")
    }

    /// Agent pairs a CONSENSUS message has already sequenced.
    fn resolved_pairs(messages: &[AgentMessage]) -> HashSet<(String, String)> {
        let mut pairs = HashSet::new();
        for consensus in messages
            .iter()
            .filter(|m| m.message_type == MessageType::Consensus)
        {
            let entries = consensus
                .supporting_data
                .get("resolved_conflicts")
                .and_then(Value::as_array);
            for entry in entries.into_iter().flatten() {
                let proposer = entry.get("proposer").and_then(Value::as_str);
                let challenger = entry.get("challenger").and_then(Value::as_str);
                if let (Some(a), Some(b)) = (proposer, challenger) {
                    pairs.insert((a.to_string(), b.to_string()));
                    pairs.insert((b.to_string(), a.to_string()));
                }
            }
        }
        pairs
    }
}

impl CriticRule for ContradictionRule {
    fn name(&self) -> &'static str {
        "logical_contradiction"
    }

    fn tier(&self) -> Tier {
        Tier::Critical
    }

    fn check(&self, messages: &[AgentMessage], _profile: &FinancialProfile) -> RuleOutcome {
        let mut outcome = RuleOutcome::default();
        let resolved = Self::resolved_pairs(messages);

        let candidates: Vec<(&AgentMessage, String)> = reviewed(messages)
            .filter(|m| m.message_type != MessageType::Consensus)
            .map(|m| (m, m.searchable_text()))
            .collect();

        let mut reported: HashSet<(String, String)> = HashSet::new();
        for (sip_side, sip_text) in &candidates {
            if !Self::raises_sip(sip_text) {
                continue;
            }
            for (reserve_side, reserve_text) in &candidates {
                if sip_side.agent_id == reserve_side.agent_id
                    || !Self::raises_emergency_fund(reserve_text)
                {
                    continue;
                }
                let pair = (sip_side.agent_id.clone(), reserve_side.agent_id.clone());
                if resolved.contains(&pair) || !reported.insert(pair) {
                    continue;
                }
                outcome.errors.push(issue(
                    IssueCategory::LogicalContradiction,
                    format!(
                        "{} proposes increasing the SIP while {} proposes increasing emergency \
                         fund contributions over the same period",
                        sip_side.agent_id, reserve_side.agent_id
                    ),
                    &reserve_side.agent_id,
                    Severity::High,
                    "Sequence the two actions or state which one takes priority",
                ));
            }
        }
        outcome
    }
}

//
// ================= Moderate =================
//

pub struct UnrealisticAssumptionRule;

/// (baseline, proposed change) key pairs.
const DELTA_CLAIMS: &[(&str, &str)] = &[
    ("current_monthly_sip", "proposed_sip_increase"),
    ("monthly_expenses", "proposed_expense_reduction"),
];

impl CriticRule for UnrealisticAssumptionRule {
    fn name(&self) -> &'static str {
        "unrealistic_assumption"
    }

    fn tier(&self) -> Tier {
        Tier::Moderate
    }

    fn check(&self, messages: &[AgentMessage], _profile: &FinancialProfile) -> RuleOutcome {
        let mut outcome = RuleOutcome::default();

        for message in reviewed(messages) {
            for (baseline_key, delta_key) in DELTA_CLAIMS {
                let (Some(baseline), Some(delta)) = (
                    message.numeric_claim(baseline_key),
                    message.numeric_claim(delta_key),
                ) else {
                    continue;
                };
                if baseline > 0.0 && delta.abs() > baseline * MAX_DELTA_SHARE {
                    outcome.errors.push(issue(
                        IssueCategory::UnrealisticAssumption,
                        format!(
                            "{} of {} is more than half of the {} baseline of {}",
                            delta_key,
                            format_currency(delta),
                            baseline_key,
                            format_currency(baseline)
                        ),
                        &message.agent_id,
                        Severity::Medium,
                        "Propose a gradual change of at most half the current amount",
                    ));
                }
            }
        }
        outcome
    }
}

pub struct MissingRiskAssessmentRule;

impl CriticRule for MissingRiskAssessmentRule {
    fn name(&self) -> &'static str {
        "missing_risk_assessment"
    }

    fn tier(&self) -> Tier {
        Tier::Moderate
    }

    fn check(&self, messages: &[AgentMessage], _profile: &FinancialProfile) -> RuleOutcome {
        let mut outcome = RuleOutcome::default();

        for message in reviewed(messages) {
            let text = message.searchable_text();
            if text.contains("invest") && !RISK_TOKENS.iter().any(|t| text.contains(t)) {
                outcome.errors.push(issue(
                    IssueCategory::MissingRiskAssessment,
                    "Investment guidance without any mention of risk".to_string(),
                    &message.agent_id,
                    Severity::Medium,
                    "State the market risk and how diversification limits it",
                ));
            }
        }
        outcome
    }
}

//
// ================= Minor =================
//

pub struct SpecificityRule;

impl CriticRule for SpecificityRule {
    fn name(&self) -> &'static str {
        "specificity"
    }

    fn tier(&self) -> Tier {
        Tier::Minor
    }

    fn check(&self, messages: &[AgentMessage], _profile: &FinancialProfile) -> RuleOutcome {
        let mut outcome = RuleOutcome::default();

        for message in reviewed(messages) {
            for statement in statements(message) {
                let lower = statement.to_lowercase();
                if !ACTION_VERBS.iter().any(|v| lower.contains(v)) {
                    continue;
                }
                if !CURRENCY_AMOUNT.is_match(statement) {
                    outcome.errors.push(issue(
                        IssueCategory::LackOfSpecificity,
                        format!("Action without a rupee amount: \"{}\"", statement),
                        &message.agent_id,
                        Severity::Low,
                        "Name the exact amount in rupees",
                    ));
                }
                if !TIME_UNIT.is_match(statement) {
                    outcome.errors.push(issue(
                        IssueCategory::MissingTimeline,
                        format!("Action without a time frame: \"{}\"", statement),
                        &message.agent_id,
                        Severity::Low,
                        "Say over how many months or years the action applies",
                    ));
                }
            }
        }
        outcome
    }
}

//
// ================= Hallucination =================
//

pub struct HallucinationRule;

impl CriticRule for HallucinationRule {
    fn name(&self) -> &'static str {
        "hallucination"
    }

    fn tier(&self) -> Tier {
        Tier::Advisory
    }

    fn check(&self, messages: &[AgentMessage], profile: &FinancialProfile) -> RuleOutcome {
        let mut outcome = RuleOutcome::default();

        for message in reviewed(messages) {
            let text = message.searchable_text();

            if (text.contains("market return") || text.contains("annual return"))
                && !message.supporting_data.contains_key("market_data")
            {
                outcome.hallucinations.push(HallucinationFlag {
                    kind: HallucinationKind::UnsupportedMarketClaim,
                    description: "Return claim without supporting market data".to_string(),
                    severity: Severity::Medium,
                    location: message.agent_id.clone(),
                });
            }

            for captures in ANNUAL_PERCENT.captures_iter(&text) {
                let rate = captures
                    .get(1)
                    .and_then(|m| m.as_str().parse::<f64>().ok())
                    .unwrap_or(0.0);
                if rate > MAX_ANNUAL_RETURN {
                    outcome.hallucinations.push(HallucinationFlag {
                        kind: HallucinationKind::UnrealisticProjection,
                        description: format!("Projected {}% yearly return is unrealistic", rate),
                        severity: Severity::High,
                        location: message.agent_id.clone(),
                    });
                }
            }

            if text.contains("insurance") && profile.insurance_coverage.is_none() {
                outcome.hallucinations.push(HallucinationFlag {
                    kind: HallucinationKind::MissingDomainData,
                    description: "Insurance discussed but no insurance data is on record"
                        .to_string(),
                    severity: Severity::Medium,
                    location: message.agent_id.clone(),
                });
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConfidenceLevel;
    use crate::profile::ProfileInputs;
    use serde_json::json;

    fn profile() -> FinancialProfile {
        FinancialProfile::from_inputs(ProfileInputs {
            monthly_income: 80935.0,
            monthly_expenses: 65000.0,
            ..Default::default()
        })
    }

    fn message(agent_id: &str, message_type: MessageType, content: &str) -> AgentMessage {
        AgentMessage::new(agent_id, message_type, content, ConfidenceLevel::Medium)
    }

    #[test]
    fn test_claim_within_tolerance_passes() {
        let msg = message("cash_flow_agent", MessageType::Analysis, "ok")
            .with_data("calculations", json!({ "monthly_income": 81500.0 }));
        assert!(DataConsistencyRule.check(&[msg], &profile()).errors.is_empty());
    }

    #[test]
    fn test_generated_metric_is_checked() {
        let msg = message("cash_flow_agent", MessageType::Analysis, "ok")
            .with_data("generated_metrics", json!({ "monthly_expenses": 40000.0 }));
        let outcome = DataConsistencyRule.check(&[msg], &profile());
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].category, IssueCategory::DataInconsistency);
    }

    #[test]
    fn test_contradiction_between_agents() {
        let messages = vec![
            message(
                "investment_agent",
                MessageType::Proposal,
                "Increase the SIP by ₹5,000 per month",
            ),
            message(
                "cash_flow_agent",
                MessageType::Challenge,
                "Increase emergency fund contributions to ₹7,900 per month for 31 months",
            ),
        ];
        let outcome = ContradictionRule.check(&messages, &profile());
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].location, "cash_flow_agent");
    }

    #[test]
    fn test_contradiction_resolved_by_consensus() {
        let messages = vec![
            message(
                "investment_agent",
                MessageType::Proposal,
                "Increase the SIP by ₹5,000 per month",
            ),
            message(
                "cash_flow_agent",
                MessageType::Challenge,
                "Increase emergency fund contributions to ₹7,900 per month for 31 months",
            ),
            message("coordinator_agent", MessageType::Consensus, "sequenced").with_data(
                "resolved_conflicts",
                json!([{ "proposer": "investment_agent", "challenger": "cash_flow_agent" }]),
            ),
        ];
        assert!(ContradictionRule.check(&messages, &profile()).errors.is_empty());
    }

    #[test]
    fn test_same_agent_is_not_a_contradiction() {
        let msg = message(
            "cash_flow_agent",
            MessageType::Analysis,
            "Increase the SIP and increase the emergency fund",
        );
        assert!(ContradictionRule.check(&[msg], &profile()).errors.is_empty());
    }

    #[test]
    fn test_sip_step_over_half_is_unrealistic() {
        let msg = message("investment_agent", MessageType::Proposal, "x")
            .with_data("current_monthly_sip", json!(10000.0))
            .with_data("proposed_sip_increase", json!(6000.0));
        assert_eq!(UnrealisticAssumptionRule.check(&[msg], &profile()).errors.len(), 1);

        let half = message("investment_agent", MessageType::Proposal, "x")
            .with_data("current_monthly_sip", json!(10000.0))
            .with_data("proposed_sip_increase", json!(5000.0));
        assert!(UnrealisticAssumptionRule.check(&[half], &profile()).errors.is_empty());
    }

    #[test]
    fn test_investment_without_risk_language() {
        let bare = message("investment_agent", MessageType::Analysis, "Invest more in equity funds.");
        let hedged = message(
            "investment_agent",
            MessageType::Analysis,
            "Invest more, keeping the portfolio diversified.",
        );
        assert_eq!(MissingRiskAssessmentRule.check(&[bare], &profile()).errors.len(), 1);
        assert!(MissingRiskAssessmentRule.check(&[hedged], &profile()).errors.is_empty());
    }

    #[test]
    fn test_vague_action_flags_amount_and_timeline() {
        let msg = message("debt_agent", MessageType::Analysis, "Increase your repayments.");
        let outcome = SpecificityRule.check(&[msg], &profile());
        let categories: Vec<_> = outcome.errors.iter().map(|e| e.category).collect();
        assert_eq!(
            categories,
            vec![IssueCategory::LackOfSpecificity, IssueCategory::MissingTimeline]
        );

        let specific = message(
            "debt_agent",
            MessageType::Analysis,
            "Increase repayments by ₹4,700 for 48 months.",
        );
        assert!(SpecificityRule.check(&[specific], &profile()).errors.is_empty());
    }

    #[test]
    fn test_hallucination_flags() {
        let msg = message(
            "wealth_agent",
            MessageType::Analysis,
            "Expect a 24% annual return from equity, and your insurance is enough.",
        );
        let outcome = HallucinationRule.check(&[msg], &profile());
        let kinds: Vec<_> = outcome.hallucinations.iter().map(|h| h.kind).collect();
        assert_eq!(
            kinds,
            vec![
                HallucinationKind::UnsupportedMarketClaim,
                HallucinationKind::UnrealisticProjection,
                HallucinationKind::MissingDomainData,
            ]
        );
        assert_eq!(outcome.hallucinations[1].severity, Severity::High);
    }

    #[test]
    fn test_market_data_supports_return_claim() {
        let msg = message("investment_agent", MessageType::Analysis, "The market return was 12%.")
            .with_data("market_data", json!({ "nifty_1y": 12.0 }));
        assert!(HallucinationRule.check(&[msg], &profile()).hallucinations.is_empty());
    }
}
