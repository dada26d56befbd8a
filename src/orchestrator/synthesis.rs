//! Final synthesis: the user-facing recommendation text.
//!
//! Two templates, chosen by the sign of net worth. Every figure quoted comes
//! straight from the profile; the consensus plan and the primary
//! specialist's analysis are appended as written.

use crate::agents::cash_flow;
use crate::error::CollaborationError;
use crate::models::{CollaborativeSession, MessageType};
use crate::profile::{format_currency, EmergencyFundTier, FinancialProfile};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanTemplate {
    /// Negative net worth
    DebtRemediation,
    SavingsGrowth,
}

impl PlanTemplate {
    pub fn for_profile(profile: &FinancialProfile) -> Self {
        if profile.net_worth < 0.0 {
            PlanTemplate::DebtRemediation
        } else {
            PlanTemplate::SavingsGrowth
        }
    }
}

pub fn synthesize(session: &CollaborativeSession) -> Result<String> {
    let profile = session.profile();
    if !profile.is_well_formed() {
        return Err(CollaborationError::Protocol(
            "profile carries non-finite figures".to_string(),
        ));
    }

    let mut text = match PlanTemplate::for_profile(profile) {
        PlanTemplate::DebtRemediation => debt_remediation(profile),
        PlanTemplate::SavingsGrowth => savings_growth(profile),
    };

    let agreed: Vec<&str> = session
        .messages()
        .iter()
        .rev()
        .find(|m| m.message_type == MessageType::Consensus)
        .map(|m| m.data_list("recommendations"))
        .unwrap_or_default();
    if !agreed.is_empty() {
        text.push_str("\nAgreed plan:\n");
        for (i, step) in agreed.iter().enumerate() {
            text.push_str(&format!("{}. {}\n", i + 1, step));
        }
    }

    let primary = session.context().primary_specialist;
    if let Some(lead) = session.messages().iter().find(|m| {
        m.message_type == MessageType::Analysis && m.agent_id == primary.agent_id()
    }) {
        text.push_str(&format!(
            "\nLead insight ({}): {}\n",
            primary.display_name(),
            lead.content
        ));
    }

    Ok(text.trim_end().to_string())
}

fn debt_remediation(profile: &FinancialProfile) -> String {
    let surplus = profile.discretionary_income();
    let mut text = format!(
        "Debt remediation plan\n\nNet worth is {} with {} of debt outstanding (debt-to-income \
         {:.1}%). Monthly income is {}, expenses are {}, leaving {} each month.\n\n",
        format_currency(profile.net_worth),
        format_currency(profile.total_debt),
        profile.debt_to_income_ratio * 100.0,
        format_currency(profile.monthly_income()),
        format_currency(profile.monthly_expenses()),
        format_currency(surplus)
    );

    if surplus > 0.0 {
        text.push_str(&format!(
            "1. Put {} per month toward the highest-interest balance until it is cleared.\n",
            format_currency((surplus * 0.5).floor())
        ));
    } else {
        text.push_str(&format!(
            "1. Spending exceeds income by {}; cut discretionary categories before anything else.\n",
            format_currency(-surplus)
        ));
    }
    text.push_str(&format!(
        "2. Keep at least {} (one month of expenses) in liquid savings as a buffer.\n",
        format_currency(profile.monthly_expenses())
    ));
    text.push_str(
        "3. Take on no new borrowing and hold new investment contributions until net worth is positive.\n",
    );
    text
}

fn savings_growth(profile: &FinancialProfile) -> String {
    let mut text = format!(
        "Savings and growth plan\n\nNet worth is {}. Monthly income is {}, expenses are {}, \
         leaving {} each month (savings rate {:.1}%). The emergency reserve covers {:.1} months \
         of expenses ({}).\n\n",
        format_currency(profile.net_worth),
        format_currency(profile.monthly_income()),
        format_currency(profile.monthly_expenses()),
        format_currency(profile.discretionary_income()),
        cash_flow::savings_rate(profile),
        profile.emergency_fund_months,
        profile.emergency_fund_tier
    );

    let mut step = 1;
    match profile.emergency_fund_tier {
        EmergencyFundTier::Adequate => text.push_str(&format!(
            "{}. Keep the emergency reserve at {} or more.\n",
            step,
            format_currency(profile.emergency_fund_target())
        )),
        _ => text.push_str(&format!(
            "{}. Bring the emergency reserve to {} (six months of expenses); the gap is {}.\n",
            step,
            format_currency(profile.emergency_fund_target()),
            format_currency(profile.emergency_fund_shortfall())
        )),
    }
    step += 1;

    if profile.total_debt > 0.0 {
        text.push_str(&format!(
            "{}. Keep servicing the {} of outstanding debt (debt-to-income {:.1}%).\n",
            step,
            format_currency(profile.total_debt),
            profile.debt_to_income_ratio * 100.0
        ));
        step += 1;
    }

    let capacity = cash_flow::investment_capacity(profile);
    if capacity > 0.0 {
        text.push_str(&format!(
            "{}. Direct up to {} per month to long-term goals in diversified holdings that match \
             your risk tolerance.\n",
            step,
            format_currency(capacity)
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::Specialist;
    use crate::models::{AgentMessage, ConfidenceLevel, SessionContext};
    use crate::profile::ProfileInputs;
    use std::sync::Arc;

    fn session(profile: FinancialProfile) -> CollaborativeSession {
        CollaborativeSession::new(
            "s",
            "q",
            SessionContext {
                profile: Arc::new(profile),
                primary_specialist: Specialist::CashFlow,
                prior_turns: vec![],
            },
            4,
        )
    }

    #[test]
    fn test_negative_net_worth_selects_debt_template() {
        let profile = FinancialProfile::from_inputs(ProfileInputs {
            monthly_income: 50000.0,
            monthly_expenses: 45000.0,
            net_worth: -50000.0,
            total_debt: 300000.0,
            ..Default::default()
        });
        assert_eq!(PlanTemplate::for_profile(&profile), PlanTemplate::DebtRemediation);

        let text = synthesize(&session(profile)).unwrap();
        assert!(text.starts_with("Debt remediation plan"));
        assert!(text.contains("-₹50,000"));
        assert!(!text.contains("Savings and growth plan"));
    }

    #[test]
    fn test_growth_template_quotes_profile_figures() {
        let profile = FinancialProfile::from_inputs(ProfileInputs {
            monthly_income: 80935.0,
            monthly_expenses: 65000.0,
            liquid_assets: 150000.0,
            net_worth: 540000.0,
            ..Default::default()
        });
        let mut s = session(profile);
        s.record(AgentMessage::new(
            "cash_flow_agent",
            MessageType::Analysis,
            "Surplus is ₹15,935.",
            ConfidenceLevel::Low,
        ));

        let text = synthesize(&s).unwrap();
        assert!(text.starts_with("Savings and growth plan"));
        assert!(text.contains("₹15,935"));
        assert!(text.contains("₹390,000"));
        assert!(text.contains("Lead insight (Cash Flow Analyst): Surplus is ₹15,935."));
    }

    #[test]
    fn test_rejects_non_finite_profile() {
        let profile = FinancialProfile::from_inputs(ProfileInputs {
            monthly_income: f64::NAN,
            ..Default::default()
        });
        assert!(synthesize(&session(profile)).is_err());
    }
}
