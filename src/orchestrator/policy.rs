//! Conflict-resolution policy applied during consensus building.

use crate::agents::ProposalKind;
use crate::profile::format_currency;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPolicy {
    /// Reserves and debt reduction before larger investment contributions
    #[default]
    RiskMitigationFirst,
    /// Growth proposals go ahead; risk actions use what is left
    GrowthFirst,
}

impl ResolutionPolicy {
    pub fn statement(&self) -> &'static str {
        match self {
            ResolutionPolicy::RiskMitigationFirst => {
                "risk mitigation before growth: building reserves and paying down debt take \
                 priority over raising investment contributions"
            }
            ResolutionPolicy::GrowthFirst => {
                "growth before risk mitigation: investment increases go ahead and reserve \
                 building uses the remaining surplus"
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionPolicy::RiskMitigationFirst => "risk_first",
            ResolutionPolicy::GrowthFirst => "growth_first",
        }
    }

    pub fn resolve(&self, conflict: &Conflict) -> Resolution {
        let defers_proposal = match self {
            ResolutionPolicy::RiskMitigationFirst => true,
            ResolutionPolicy::GrowthFirst => !conflict.proposal_kind.is_growth(),
        };

        let action = action_label(&conflict.action);
        let proposal = proposal_label(conflict.proposal_kind);

        let plan_step = if defers_proposal {
            format!(
                "Prioritize {}: set aside {} per month for {} months, then increase {} by {}",
                action,
                format_currency(conflict.challenge_amount),
                conflict.duration_months,
                proposal,
                format_currency(conflict.proposal_amount)
            )
        } else {
            format!(
                "Increase {} by {} now and direct the remaining surplus to {} over the next {} months",
                proposal,
                format_currency(conflict.proposal_amount),
                action,
                conflict.duration_months
            )
        };

        Resolution {
            proposer: conflict.proposer.clone(),
            challenger: conflict.challenger.clone(),
            outcome: if defers_proposal {
                ResolutionOutcome::Sequenced
            } else {
                ResolutionOutcome::ProposalFirst
            },
            plan_step,
        }
    }
}

impl FromStr for ResolutionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "risk_first" | "risk_mitigation_first" | "risk" => Ok(ResolutionPolicy::RiskMitigationFirst),
            "growth_first" | "growth" => Ok(ResolutionPolicy::GrowthFirst),
            other => Err(format!("unknown resolution policy: {}", other)),
        }
    }
}

fn action_label(action: &str) -> &str {
    match action {
        "build_emergency_fund" => "the emergency fund",
        "reduce_debt" => "debt repayment",
        "build_liquidity_buffer" => "a liquidity buffer",
        other => other,
    }
}

fn proposal_label(kind: ProposalKind) -> &'static str {
    match kind {
        ProposalKind::IncreaseSip => "the monthly SIP",
        ProposalKind::AccelerateDebtRepayment => "monthly debt repayment",
    }
}

/// A challenged proposal, as read back from the session log.
#[derive(Debug, Clone)]
pub struct Conflict {
    pub proposer: String,
    pub proposal_kind: ProposalKind,
    pub proposal_amount: f64,
    pub challenger: String,
    pub action: String,
    pub challenge_amount: f64,
    pub duration_months: u32,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionOutcome {
    /// Challenger's action first, proposal afterwards
    Sequenced,
    ProposalFirst,
}

#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub proposer: String,
    pub challenger: String,
    pub outcome: ResolutionOutcome,
    pub plan_step: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sip_conflict() -> Conflict {
        Conflict {
            proposer: "investment_agent".into(),
            proposal_kind: ProposalKind::IncreaseSip,
            proposal_amount: 7500.0,
            challenger: "cash_flow_agent".into(),
            action: "build_emergency_fund".into(),
            challenge_amount: 7900.0,
            duration_months: 31,
        }
    }

    #[test]
    fn test_risk_first_sequences_growth() {
        let resolution = ResolutionPolicy::RiskMitigationFirst.resolve(&sip_conflict());
        assert_eq!(resolution.outcome, ResolutionOutcome::Sequenced);
        assert!(resolution.plan_step.starts_with("Prioritize the emergency fund"));
        assert!(resolution.plan_step.contains("₹7,900"));
        assert!(resolution.plan_step.contains("then increase the monthly SIP by ₹7,500"));
    }

    #[test]
    fn test_growth_first_lets_sip_proceed() {
        let resolution = ResolutionPolicy::GrowthFirst.resolve(&sip_conflict());
        assert_eq!(resolution.outcome, ResolutionOutcome::ProposalFirst);
        assert!(resolution.plan_step.starts_with("Increase the monthly SIP by ₹7,500 now"));
    }

    #[test]
    fn test_parse_policy() {
        assert_eq!("growth_first".parse(), Ok(ResolutionPolicy::GrowthFirst));
        assert_eq!("RISK_FIRST".parse(), Ok(ResolutionPolicy::RiskMitigationFirst));
        assert!("yolo".parse::<ResolutionPolicy>().is_err());
    }
}
