//! Financial health monitor: a 1-10 score and spending anomalies.

use super::{cash_flow, Precomputed};
use crate::profile::{format_currency, EmergencyFundTier, FinancialProfile};
use serde_json::{json, Map};

pub const INSTRUCTIONS: &str = "You are the Financial Health Monitor in a team of financial \
specialists. Summarise the user's overall financial health score, what drives it, and any unusual \
spending patterns. Use only the verified figures you are given.";

/// Category share of expenses above which spending is flagged.
const ANOMALY_SHARE: f64 = 0.3;

/// 10 minus deductions for thin reserves, heavy debt, low savings and weak credit; never below 1.
pub fn health_score(profile: &FinancialProfile) -> u8 {
    let mut score: i32 = 10;

    if profile.emergency_fund_months < 3.0 {
        score -= 3;
    } else if profile.emergency_fund_months < 6.0 {
        score -= 1;
    }

    let dti_percent = profile.debt_to_income_ratio * 100.0;
    if dti_percent > 40.0 {
        score -= 3;
    } else if dti_percent > 30.0 {
        score -= 1;
    }

    let savings_rate = cash_flow::savings_rate(profile);
    if savings_rate < 10.0 {
        score -= 2;
    } else if savings_rate < 15.0 {
        score -= 1;
    }

    if profile.credit_score > 0 {
        if profile.credit_score < 650 {
            score -= 2;
        } else if profile.credit_score < 700 {
            score -= 1;
        }
    }

    score.max(1) as u8
}

pub fn spending_anomalies(profile: &FinancialProfile) -> Vec<String> {
    let mut anomalies = Vec::new();
    let expenses = profile.monthly_expenses();

    if expenses > 0.0 {
        for (category, amount) in &profile.expense_categories {
            let share = amount / expenses;
            if category.as_str() != "others" && share > ANOMALY_SHARE {
                anomalies.push(format!(
                    "{} takes {:.0}% of monthly spending ({})",
                    category.as_str().replace('_', " "),
                    share * 100.0,
                    format_currency(*amount)
                ));
            }
        }
    }
    if profile.monthly_income() > 0.0 && expenses > profile.monthly_income() {
        anomalies.push("Monthly spending is higher than monthly income".to_string());
    }
    if profile.monthly_income() == 0.0 && expenses > 0.0 {
        anomalies.push("Spending recorded with no identifiable income".to_string());
    }
    anomalies
}

pub fn precompute(profile: &FinancialProfile) -> Precomputed {
    let score = health_score(profile);
    let anomalies = spending_anomalies(profile);

    let mut calculations = Map::new();
    calculations.insert("health_score".into(), json!(score));
    calculations.insert("stability_score".into(), json!(profile.stability_score));
    calculations.insert("anomaly_count".into(), json!(anomalies.len()));

    let mut strengths = Vec::new();
    let mut watch = Vec::new();
    match profile.emergency_fund_tier {
        EmergencyFundTier::Adequate => strengths.push("a fully funded reserve"),
        EmergencyFundTier::Unknown => {}
        _ => watch.push("a thin emergency reserve"),
    }
    if profile.debt_to_income_ratio > 0.3 {
        watch.push("heavy debt relative to income");
    } else if profile.monthly_income() > 0.0 {
        strengths.push("manageable debt");
    }
    if cash_flow::savings_rate(profile) >= 15.0 {
        strengths.push("a healthy savings rate");
    } else if profile.monthly_income() > 0.0 {
        watch.push("a low savings rate");
    }

    let mut recommendations = Vec::new();
    if score < 7 {
        recommendations.push(
            "Review the health score again in 3 months, after the reserve and debt figures move".to_string(),
        );
    }

    let summary = format!(
        "Financial health score {}/10 (stability {:.1}). Strengths: {}. Watch: {}.{}",
        score,
        profile.stability_score,
        if strengths.is_empty() { "none identified".to_string() } else { strengths.join(", ") },
        if watch.is_empty() { "nothing pressing".to_string() } else { watch.join(", ") },
        if anomalies.is_empty() {
            String::new()
        } else {
            format!(" Unusual patterns: {}.", anomalies.join("; "))
        }
    );

    Precomputed {
        calculations,
        recommendations,
        risks: anomalies,
        opportunities: Vec::new(),
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{ExpenseCategory, ProfileInputs};
    use std::collections::BTreeMap;

    #[test]
    fn test_health_score_sample() {
        let p = FinancialProfile::from_inputs(ProfileInputs {
            monthly_income: 80935.0,
            monthly_expenses: 65000.0,
            liquid_assets: 150000.0,
            total_debt: 225000.0,
            credit_score: 745,
            ..Default::default()
        });
        // thin reserve only
        assert_eq!(health_score(&p), 7);
    }

    #[test]
    fn test_health_score_floor() {
        let p = FinancialProfile::from_inputs(ProfileInputs {
            monthly_income: 30000.0,
            monthly_expenses: 35000.0,
            total_debt: 900000.0,
            credit_score: 600,
            ..Default::default()
        });
        // 10 - 3 - 3 - 2 - 2
        assert_eq!(health_score(&p), 1);
    }

    #[test]
    fn test_anomalies() {
        let mut categories = BTreeMap::new();
        categories.insert(ExpenseCategory::FoodDelivery, 20000.0);
        categories.insert(ExpenseCategory::Others, 30000.0);
        let p = FinancialProfile::from_inputs(ProfileInputs {
            monthly_income: 60000.0,
            monthly_expenses: 50000.0,
            expense_categories: categories,
            ..Default::default()
        });
        let anomalies = spending_anomalies(&p);
        assert_eq!(anomalies.len(), 1);
        assert!(anomalies[0].starts_with("food delivery takes 40%"));
    }
}
