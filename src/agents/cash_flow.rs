//! Cash flow analyst: savings rate, emergency reserve, spending hotspots.

use super::{floor_hundred, round2, Challenge, Precomputed};
use crate::profile::{format_currency, EmergencyFundTier, ExpenseCategory, FinancialProfile};
use serde_json::{json, Map};

pub const INSTRUCTIONS: &str = "You are the Cash Flow Analyst in a team of financial specialists. \
Explain the user's income, spending and monthly surplus, the savings rate and the state of the \
emergency reserve. Use only the verified figures you are given and name concrete rupee amounts \
and time frames.";

/// Share of positive surplus that can safely go to long-term goals.
const INVESTMENT_CAPACITY_SHARE: f64 = 0.7;

/// Category, spend threshold, suggested trim.
const SPENDING_HOTSPOTS: &[(ExpenseCategory, f64, &str)] = &[
    (ExpenseCategory::FoodDelivery, 5000.0, "food delivery"),
    (ExpenseCategory::Entertainment, 3000.0, "entertainment"),
    (ExpenseCategory::Transport, 4000.0, "transport"),
];

pub fn savings_rate(profile: &FinancialProfile) -> f64 {
    if profile.monthly_income() > 0.0 {
        profile.discretionary_income() / profile.monthly_income() * 100.0
    } else {
        0.0
    }
}

pub fn investment_capacity(profile: &FinancialProfile) -> f64 {
    profile.discretionary_income().max(0.0) * INVESTMENT_CAPACITY_SHARE
}

/// Monthly amount for rebuilding reserves: half the surplus.
fn reserve_contribution(profile: &FinancialProfile) -> f64 {
    floor_hundred(profile.discretionary_income() * 0.5)
}

pub fn precompute(profile: &FinancialProfile) -> Precomputed {
    let rate = savings_rate(profile);
    let expense_ratio = if profile.monthly_income() > 0.0 {
        profile.monthly_expenses() / profile.monthly_income() * 100.0
    } else {
        0.0
    };
    let shortfall = profile.emergency_fund_shortfall();
    let capacity = investment_capacity(profile);

    let mut calculations = Map::new();
    calculations.insert("monthly_income".into(), json!(profile.monthly_income()));
    calculations.insert("monthly_expenses".into(), json!(profile.monthly_expenses()));
    calculations.insert("discretionary_income".into(), json!(profile.discretionary_income()));
    calculations.insert("savings_rate".into(), json!(round2(rate)));
    calculations.insert("expense_ratio".into(), json!(round2(expense_ratio)));
    calculations.insert("emergency_fund_months".into(), json!(round2(profile.emergency_fund_months)));
    calculations.insert("emergency_fund_target".into(), json!(profile.emergency_fund_target()));
    calculations.insert("emergency_fund_shortfall".into(), json!(shortfall));
    calculations.insert("investment_capacity".into(), json!(round2(capacity)));

    let mut recommendations = Vec::new();
    let mut risks = Vec::new();
    let mut opportunities = Vec::new();

    if profile.discretionary_income() <= 0.0 && profile.monthly_income() > 0.0 {
        risks.push(format!(
            "Spending exceeds income by {} per month",
            format_currency(-profile.discretionary_income())
        ));
        recommendations.push(format!(
            "Cut discretionary spending by {} within the next 2 months to stop drawing down savings",
            format_currency(-profile.discretionary_income())
        ));
    }

    for (category, threshold, label) in SPENDING_HOTSPOTS {
        let spent = profile.expense_in(*category);
        if spent > *threshold {
            let trim = floor_hundred(spent / 3.0);
            recommendations.push(format!(
                "Trim {} spending of {} by about a third to free {} per month over the next 3 months",
                label,
                format_currency(spent),
                format_currency(trim)
            ));
            opportunities.push(format!(
                "{} per month recoverable from {}",
                format_currency(trim),
                label
            ));
        }
    }

    let contribution = reserve_contribution(profile);
    if profile.emergency_fund_tier != EmergencyFundTier::Adequate
        && profile.emergency_fund_tier != EmergencyFundTier::Unknown
        && shortfall > 0.0
    {
        risks.push(format!(
            "Emergency reserve covers only {:.1} months of expenses",
            profile.emergency_fund_months
        ));
        if contribution > 0.0 {
            let months = (shortfall / contribution).ceil() as u32;
            recommendations.push(format!(
                "Build the emergency reserve toward {} by setting aside {} each month for {} months",
                format_currency(profile.emergency_fund_target()),
                format_currency(contribution),
                months
            ));
        }
    }

    if rate > 0.0 && rate < 10.0 {
        risks.push(format!("Savings rate of {:.1}% is below a 10% floor", rate));
    }
    if capacity > 0.0 {
        opportunities.push(format!(
            "About {} of the monthly surplus is available for long-term goals",
            format_currency(capacity)
        ));
    }

    let summary = if profile.monthly_income() > 0.0 {
        format!(
            "Cash flow: income {}, expenses {}, monthly surplus {} (savings rate {:.2}%). \
             The emergency reserve of {} covers {:.1} months of expenses ({}), against a 6-month \
             target of {}.",
            format_currency(profile.monthly_income()),
            format_currency(profile.monthly_expenses()),
            format_currency(profile.discretionary_income()),
            rate,
            format_currency(profile.liquid_assets),
            profile.emergency_fund_months,
            profile.emergency_fund_tier,
            format_currency(profile.emergency_fund_target())
        )
    } else {
        "Cash flow: no income data is available, so the savings rate and emergency reserve \
         cannot be assessed yet."
            .to_string()
    };

    Precomputed {
        calculations,
        recommendations,
        risks,
        opportunities,
        summary,
    }
}

/// Objection to raising SIP while the reserve is below six months.
pub fn challenge_growth(profile: &FinancialProfile) -> Option<Challenge> {
    if matches!(
        profile.emergency_fund_tier,
        EmergencyFundTier::Adequate | EmergencyFundTier::Unknown
    ) {
        return None;
    }

    let contribution = reserve_contribution(profile);
    let shortfall = profile.emergency_fund_shortfall();
    if contribution <= 0.0 || shortfall <= 0.0 {
        return None;
    }
    let months = (shortfall / contribution).ceil() as u32;

    Some(Challenge {
        content: format!(
            "The emergency reserve covers only {:.1} months of expenses. Increase emergency fund \
             contributions to {} per month for {} months to close the {} shortfall before \
             raising the SIP.",
            profile.emergency_fund_months,
            format_currency(contribution),
            months,
            format_currency(shortfall)
        ),
        amount: contribution,
        duration_months: months,
        action: "build_emergency_fund".to_string(),
    })
}

/// Objection to faster repayments while liquidity is under one month.
pub fn challenge_repayment(profile: &FinancialProfile) -> Option<Challenge> {
    if profile.emergency_fund_tier == EmergencyFundTier::Unknown
        || profile.emergency_fund_months >= 1.0
    {
        return None;
    }

    let buffer = profile.monthly_expenses() - profile.liquid_assets;
    let contribution = reserve_contribution(profile);
    if contribution <= 0.0 || buffer <= 0.0 {
        return None;
    }
    let months = (buffer / contribution).ceil() as u32;

    Some(Challenge {
        content: format!(
            "Liquid savings cover less than one month of expenses. Keep {} per month as a \
             liquidity buffer for {} months before accelerating repayments.",
            format_currency(contribution),
            months
        ),
        amount: contribution,
        duration_months: months,
        action: "build_liquidity_buffer".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ProfileInputs;
    use std::collections::BTreeMap;

    fn profile(income: f64, expenses: f64, liquid: f64) -> FinancialProfile {
        FinancialProfile::from_inputs(ProfileInputs {
            monthly_income: income,
            monthly_expenses: expenses,
            liquid_assets: liquid,
            ..Default::default()
        })
    }

    #[test]
    fn test_savings_rate_scenario() {
        let p = profile(80935.0, 65000.0, 0.0);
        assert_eq!(p.discretionary_income(), 15935.0);
        assert!((savings_rate(&p) - 19.69).abs() < 0.01);

        let pre = precompute(&p);
        assert_eq!(pre.figure("savings_rate"), Some(19.69));
        assert_eq!(pre.figure("discretionary_income"), Some(15935.0));
    }

    #[test]
    fn test_zero_income() {
        let p = profile(0.0, 20000.0, 0.0);
        assert_eq!(savings_rate(&p), 0.0);
        assert_eq!(investment_capacity(&p), 0.0);
        assert!(precompute(&p).summary.contains("no income data"));
    }

    #[test]
    fn test_emergency_shortfall_recommendation() {
        let pre = precompute(&profile(80935.0, 65000.0, 150000.0));
        assert_eq!(pre.figure("emergency_fund_shortfall"), Some(240000.0));
        assert!(pre
            .recommendations
            .iter()
            .any(|r| r.contains("₹7,900") && r.contains("31 months")));
    }

    #[test]
    fn test_spending_hotspots() {
        let mut categories = BTreeMap::new();
        categories.insert(ExpenseCategory::FoodDelivery, 6000.0);
        categories.insert(ExpenseCategory::Transport, 2000.0);
        let p = FinancialProfile::from_inputs(ProfileInputs {
            monthly_income: 90000.0,
            monthly_expenses: 50000.0,
            expense_categories: categories,
            ..Default::default()
        });

        let pre = precompute(&p);
        assert!(pre.recommendations.iter().any(|r| r.contains("food delivery")));
        assert!(!pre.recommendations.iter().any(|r| r.contains("transport")));
    }

    #[test]
    fn test_challenge_growth() {
        let thin = profile(80935.0, 65000.0, 150000.0);
        let challenge = challenge_growth(&thin).unwrap();
        assert_eq!(challenge.amount, 7900.0);
        assert_eq!(challenge.duration_months, 31);

        let funded = profile(80935.0, 65000.0, 400000.0);
        assert!(challenge_growth(&funded).is_none());
    }
}
