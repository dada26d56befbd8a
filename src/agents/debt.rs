//! Debt and credit analyst.

use super::{floor_hundred, round2, Challenge, Precomputed, Proposal, ProposalKind, Specialist};
use crate::profile::{format_currency, FinancialProfile};
use serde_json::{json, Map};

pub const INSTRUCTIONS: &str = "You are the Debt and Credit Analyst in a team of financial \
specialists. Assess outstanding balances, the debt-to-income ratio and the credit score, and \
lay out a repayment order with rupee amounts and time frames. Use only the verified figures \
you are given.";

/// Debt-to-income above which new commitments are unaffordable.
pub const AFFORDABLE_DTI: f64 = 0.4;

/// Debt-to-income above which the analyst proposes faster repayment.
const ACCELERATE_DTI: f64 = 0.2;

/// Share of surplus the analyst is willing to put toward repayments.
const REPAYMENT_SHARE: f64 = 0.5;
const ACCELERATION_SHARE: f64 = 0.3;

pub fn credit_band(score: u32) -> &'static str {
    match score {
        0 => "unavailable",
        750..=u32::MAX => "excellent",
        700..=749 => "good",
        650..=699 => "fair",
        _ => "poor",
    }
}

fn repayment_capacity(profile: &FinancialProfile) -> f64 {
    floor_hundred(profile.discretionary_income() * REPAYMENT_SHARE)
}

pub fn precompute(profile: &FinancialProfile) -> Precomputed {
    let dti = profile.debt_to_income_ratio;
    let capacity = repayment_capacity(profile);
    let months_to_clear = if profile.total_debt > 0.0 && capacity > 0.0 {
        Some((profile.total_debt / capacity).ceil() as u32)
    } else {
        None
    };

    let mut calculations = Map::new();
    calculations.insert("total_debt".into(), json!(profile.total_debt));
    calculations.insert("debt_to_income_ratio".into(), json!(round2(dti)));
    calculations.insert("debt_to_income_percent".into(), json!(round2(dti * 100.0)));
    calculations.insert("credit_score".into(), json!(profile.credit_score));
    calculations.insert("monthly_repayment_capacity".into(), json!(capacity));
    if let Some(months) = months_to_clear {
        calculations.insert("months_to_clear_debt".into(), json!(months));
    }

    let mut recommendations = Vec::new();
    let mut risks = Vec::new();
    let mut opportunities = Vec::new();

    if let Some(months) = months_to_clear {
        recommendations.push(format!(
            "Direct {} per month to outstanding balances, highest interest first, to clear {} in about {} months",
            format_currency(capacity),
            format_currency(profile.total_debt),
            months
        ));
    }
    if dti > AFFORDABLE_DTI {
        risks.push(format!(
            "Debt-to-income of {:.1}% is above the 40% affordability limit",
            dti * 100.0
        ));
    }
    if profile.credit_score > 0 && profile.credit_score < 700 {
        recommendations.push(
            "Keep card utilisation under 30% and pay every bill on time for the next 6 months to lift the credit score"
                .to_string(),
        );
        risks.push(format!(
            "Credit score of {} ({}) limits access to low-cost credit",
            profile.credit_score,
            credit_band(profile.credit_score)
        ));
    }
    if profile.credit_score >= 750 {
        opportunities.push(format!(
            "A credit score of {} qualifies for the lowest lending rates",
            profile.credit_score
        ));
    }

    let summary = if profile.total_debt > 0.0 {
        format!(
            "Debt: {} outstanding across credit accounts, a debt-to-income ratio of {:.1}% and a \
             credit score of {} ({}).",
            format_currency(profile.total_debt),
            dti * 100.0,
            profile.credit_score,
            credit_band(profile.credit_score)
        )
    } else {
        format!(
            "Debt: no outstanding balances were reported. Credit score {} ({}).",
            profile.credit_score,
            credit_band(profile.credit_score)
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

/// Faster repayment when debt weighs on income and there is surplus.
pub fn propose(profile: &FinancialProfile) -> Option<Proposal> {
    if profile.total_debt <= 0.0 || profile.debt_to_income_ratio <= ACCELERATE_DTI {
        return None;
    }
    let extra = floor_hundred(profile.discretionary_income() * ACCELERATION_SHARE);
    if extra <= 0.0 {
        return None;
    }
    let months = (profile.total_debt / extra).ceil() as u32;

    let mut data = Map::new();
    data.insert("proposed_debt_payment_increase".into(), json!(extra));
    data.insert("duration_months".into(), json!(months));

    Some(Proposal {
        proposer: Specialist::Debt,
        kind: ProposalKind::AccelerateDebtRepayment,
        amount: extra,
        content: format!(
            "Increase monthly debt repayment by {} for up to {} months to retire the highest-cost \
             balances first (debt-to-income {:.1}%).",
            format_currency(extra),
            months,
            profile.debt_to_income_ratio * 100.0
        ),
        data,
    })
}

/// Objection to raising SIP while debt is unaffordable.
pub fn challenge_growth(profile: &FinancialProfile) -> Option<Challenge> {
    if profile.debt_to_income_ratio <= AFFORDABLE_DTI {
        return None;
    }
    let capacity = repayment_capacity(profile);
    if capacity <= 0.0 {
        return None;
    }
    let months = (profile.total_debt / capacity).ceil() as u32;

    Some(Challenge {
        content: format!(
            "Debt-to-income is {:.1}%, above the 40% affordability limit. Direct {} per month to \
             repayments for {} months before raising the SIP.",
            profile.debt_to_income_ratio * 100.0,
            format_currency(capacity),
            months
        ),
        amount: capacity,
        duration_months: months,
        action: "reduce_debt".to_string(),
    })
}
