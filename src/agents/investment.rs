//! Investment analyst: portfolio size, contribution rate, SIP proposals.

use super::{cash_flow, floor_hundred, round2, Precomputed, Proposal, ProposalKind, Specialist};
use crate::profile::{format_currency, FinancialProfile, PortfolioPerformance};
use serde_json::{json, Map};

pub const INSTRUCTIONS: &str = "You are the Investment Analyst in a team of financial specialists. \
Review the user's mutual fund portfolio, how much of their income they invest each month and \
whether the allocation is diversified. Every suggestion must mention the associated risk. Use only \
the verified figures you are given.";

/// Monthly investing as a share of income the analyst aims for.
const TARGET_INVESTMENT_RATIO: f64 = 20.0;

/// Largest SIP step, relative to the current SIP, the analyst will propose.
const MAX_SIP_STEP_SHARE: f64 = 0.5;

/// SIP step for someone not investing yet, relative to income.
const STARTER_SIP_SHARE: f64 = 0.1;

fn performance_label(performance: PortfolioPerformance) -> &'static str {
    match performance {
        PortfolioPerformance::Good => "good",
        PortfolioPerformance::Moderate => "moderate",
        PortfolioPerformance::NoInvestments => "no investments",
        PortfolioPerformance::Unknown => "unknown",
    }
}

pub fn investment_ratio(profile: &FinancialProfile) -> f64 {
    if profile.monthly_income() > 0.0 {
        profile.monthly_investment / profile.monthly_income() * 100.0
    } else {
        0.0
    }
}

/// Proposed monthly SIP increase, bounded by surplus capacity and by half the current SIP.
pub fn proposed_sip_step(profile: &FinancialProfile) -> f64 {
    let capacity = cash_flow::investment_capacity(profile);
    let ceiling = if profile.monthly_investment > 0.0 {
        profile.monthly_investment * MAX_SIP_STEP_SHARE
    } else {
        profile.monthly_income() * STARTER_SIP_SHARE
    };
    floor_hundred(capacity.min(ceiling))
}

pub fn precompute(profile: &FinancialProfile) -> Precomputed {
    let ratio = investment_ratio(profile);
    let capacity = cash_flow::investment_capacity(profile);

    let mut calculations = Map::new();
    calculations.insert("portfolio_value".into(), json!(profile.portfolio_value));
    calculations.insert("scheme_count".into(), json!(profile.scheme_count));
    calculations.insert("invested_assets".into(), json!(profile.invested_assets));
    calculations.insert("current_monthly_sip".into(), json!(profile.monthly_investment));
    calculations.insert("investment_ratio".into(), json!(round2(ratio)));
    calculations.insert("target_investment_ratio".into(), json!(TARGET_INVESTMENT_RATIO));
    calculations.insert("monthly_investment_capacity".into(), json!(round2(capacity)));

    let mut recommendations = Vec::new();
    let mut risks = Vec::new();
    let mut opportunities = Vec::new();

    match profile.portfolio_performance {
        PortfolioPerformance::NoInvestments | PortfolioPerformance::Unknown => {
            let starter = proposed_sip_step(profile);
            if starter > 0.0 {
                recommendations.push(format!(
                    "Start a diversified SIP of {} per month within 3 months, sized to your risk tolerance",
                    format_currency(starter)
                ));
            }
        }
        _ => {
            if profile.scheme_count < 3 {
                recommendations.push(
                    "Spread new SIP money across at least 3 schemes over the next 6 months to diversify risk"
                        .to_string(),
                );
                risks.push(format!(
                    "Concentration risk: the portfolio holds only {} scheme(s)",
                    profile.scheme_count
                ));
            }
        }
    }

    if ratio > 0.0 && ratio < TARGET_INVESTMENT_RATIO && capacity > 0.0 {
        opportunities.push(format!(
            "Investing {:.1}% of income against a {:.0}% target leaves room to grow contributions",
            ratio, TARGET_INVESTMENT_RATIO
        ));
    }

    let summary = if profile.portfolio_value > 0.0 {
        format!(
            "Investments: mutual fund purchases of {} across {} scheme(s) ({} performance band), \
             with a monthly SIP of about {} ({:.1}% of income against a {:.0}% target). Equity funds \
             carry market risk, so any change should keep the allocation diversified.",
            format_currency(profile.portfolio_value),
            profile.scheme_count,
            performance_label(profile.portfolio_performance),
            format_currency(profile.monthly_investment),
            ratio,
            TARGET_INVESTMENT_RATIO
        )
    } else {
        format!(
            "Investments: no mutual fund activity was found. Monthly capacity for new investing is \
             about {}, and any start should match the user's risk tolerance.",
            format_currency(capacity)
        )
    };

    Precomputed {
        calculations,
        recommendations,
        risks,
        opportunities,
        summary,
    }
}

/// Raise the SIP when there is surplus to do it.
pub fn propose(profile: &FinancialProfile) -> Option<Proposal> {
    let step = proposed_sip_step(profile);
    if step <= 0.0 {
        return None;
    }

    let current = profile.monthly_investment;
    let content = if current > 0.0 {
        format!(
            "Increase the monthly SIP by {} (from {} to {}) starting next month, keeping market \
             risk within the current diversified allocation.",
            format_currency(step),
            format_currency(current),
            format_currency(current + step)
        )
    } else {
        format!(
            "Increase monthly investing from nothing to a {} SIP starting next month, in a \
             diversified fund that matches the user's risk tolerance.",
            format_currency(step)
        )
    };

    let mut data = Map::new();
    data.insert("current_monthly_sip".into(), json!(current));
    data.insert("proposed_sip_increase".into(), json!(step));

    Some(Proposal {
        proposer: Specialist::Investment,
        kind: ProposalKind::IncreaseSip,
        amount: step,
        content,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ProfileInputs;

    fn profile(monthly_investment: f64) -> FinancialProfile {
        FinancialProfile::from_inputs(ProfileInputs {
            monthly_income: 80935.0,
            monthly_expenses: 65000.0,
            portfolio_value: monthly_investment * 3.0,
            scheme_count: 2,
            monthly_investment,
            ..Default::default()
        })
    }

    #[test]
    fn test_sip_step_capped_at_half_current() {
        let p = profile(15000.0);
        assert_eq!(proposed_sip_step(&p), 7500.0);

        let proposal = propose(&p).unwrap();
        assert_eq!(proposal.kind, ProposalKind::IncreaseSip);
        assert!(proposal.content.contains("₹7,500"));
        assert_eq!(proposal.data["current_monthly_sip"], json!(15000.0));
    }

    #[test]
    fn test_sip_step_capped_by_capacity() {
        // capacity is 70% of 15,935
        assert_eq!(proposed_sip_step(&profile(40000.0)), 11100.0);
    }

    #[test]
    fn test_no_proposal_without_surplus() {
        let p = FinancialProfile::from_inputs(ProfileInputs {
            monthly_income: 50000.0,
            monthly_expenses: 60000.0,
            ..Default::default()
        });
        assert!(propose(&p).is_none());
    }

    #[test]
    fn test_summary_mentions_risk() {
        let pre = precompute(&profile(15000.0));
        assert!(pre.summary.contains("risk"));
        assert!(pre.summary.contains("moderate performance"));
    }
}
