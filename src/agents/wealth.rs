//! Wealth planner: net worth, asset mix, retirement readiness.

use super::{floor_hundred, round2, Precomputed};
use crate::profile::{format_currency, FinancialProfile};
use serde_json::{json, Map};

pub const INSTRUCTIONS: &str = "You are the Wealth Planner in a team of financial specialists. \
Describe the user's net worth, asset mix and readiness for retirement. Any projection is an \
assumption, not a forecast, and must say so. Use only the verified figures you are given.";

/// Yearly growth assumed for illustrative projections.
pub const ASSUMED_GROWTH_RATE: f64 = 0.08;
const PROJECTION_YEARS: i32 = 10;

/// Retirement spending as a share of current income.
const RETIREMENT_INCOME_SHARE: f64 = 0.8;
/// Corpus multiple of yearly retirement spending.
const CORPUS_MULTIPLE: f64 = 25.0;

pub fn retirement_corpus_target(profile: &FinancialProfile) -> f64 {
    profile.monthly_income() * RETIREMENT_INCOME_SHARE * 12.0 * CORPUS_MULTIPLE
}

/// Net worth after `years` of growth plus half the surplus saved each year.
pub fn projected_net_worth(profile: &FinancialProfile, years: i32) -> f64 {
    let growth = (1.0 + ASSUMED_GROWTH_RATE).powi(years);
    let yearly_saving = profile.discretionary_income().max(0.0) * 0.5 * 12.0;
    let annuity = (growth - 1.0) / ASSUMED_GROWTH_RATE;
    profile.net_worth * growth + yearly_saving * annuity
}

fn share(part: f64, total: f64) -> f64 {
    if total > 0.0 {
        part / total * 100.0
    } else {
        0.0
    }
}

pub fn precompute(profile: &FinancialProfile) -> Precomputed {
    let target = retirement_corpus_target(profile);
    let readiness = share(profile.retirement_savings + profile.invested_assets, target);
    let projection = projected_net_worth(profile, PROJECTION_YEARS);

    let mut calculations = Map::new();
    calculations.insert("net_worth".into(), json!(profile.net_worth));
    calculations.insert("total_assets".into(), json!(profile.total_assets));
    calculations.insert(
        "liquid_share".into(),
        json!(round2(share(profile.liquid_assets, profile.total_assets))),
    );
    calculations.insert(
        "invested_share".into(),
        json!(round2(share(profile.invested_assets, profile.total_assets))),
    );
    calculations.insert(
        "retirement_share".into(),
        json!(round2(share(profile.retirement_savings, profile.total_assets))),
    );
    calculations.insert("retirement_savings".into(), json!(profile.retirement_savings));
    calculations.insert("retirement_corpus_target".into(), json!(round2(target)));
    calculations.insert("retirement_readiness".into(), json!(round2(readiness)));
    calculations.insert("assumed_growth_rate".into(), json!(ASSUMED_GROWTH_RATE * 100.0));
    calculations.insert("projected_net_worth_10y".into(), json!(round2(projection)));

    let mut recommendations = Vec::new();
    let mut risks = Vec::new();
    let mut opportunities = Vec::new();

    let allocation = floor_hundred(profile.discretionary_income() * 0.3);
    if target > 0.0 && readiness < 50.0 && allocation > 0.0 {
        recommendations.push(format!(
            "Allocate {} of the monthly surplus to retirement accounts for the next 12 months",
            format_currency(allocation)
        ));
    }
    if profile.net_worth < 0.0 {
        risks.push(format!(
            "Net worth is negative at {}",
            format_currency(profile.net_worth)
        ));
    }
    if profile.total_assets > 0.0 && share(profile.liquid_assets, profile.total_assets) > 60.0 {
        opportunities.push(
            "Most assets sit in savings accounts; part could move to long-term holdings once reserves are full"
                .to_string(),
        );
    }

    let summary = if target > 0.0 {
        format!(
            "Wealth: net worth {} on total assets of {}. Retirement corpus target {} (25 times 80% \
             of yearly income) with readiness at {:.1}%. Illustrative 10-year net worth at an assumed \
             8% yearly growth: {} (an assumption, not a forecast).",
            format_currency(profile.net_worth),
            format_currency(profile.total_assets),
            format_currency(target),
            readiness,
            format_currency(projection)
        )
    } else {
        format!(
            "Wealth: net worth {} on total assets of {}. Without income data no retirement target \
             can be set.",
            format_currency(profile.net_worth),
            format_currency(profile.total_assets)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ProfileInputs;

    #[test]
    fn test_corpus_target() {
        let p = FinancialProfile::from_inputs(ProfileInputs {
            monthly_income: 100000.0,
            ..Default::default()
        });
        assert_eq!(retirement_corpus_target(&p), 24_000_000.0);
    }

    #[test]
    fn test_projection_without_surplus() {
        let p = FinancialProfile::from_inputs(ProfileInputs {
            monthly_income: 50000.0,
            monthly_expenses: 50000.0,
            net_worth: 100000.0,
            ..Default::default()
        });
        let expected = 100000.0 * 1.08f64.powi(10);
        assert!((projected_net_worth(&p, 10) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_negative_net_worth_is_a_risk() {
        let p = FinancialProfile::from_inputs(ProfileInputs {
            monthly_income: 50000.0,
            monthly_expenses: 45000.0,
            net_worth: -50000.0,
            ..Default::default()
        });
        let pre = precompute(&p);
        assert!(pre.risks.iter().any(|r| r.contains("-₹50,000")));
        assert!(!pre.summary.contains("annual return"));
    }
}
