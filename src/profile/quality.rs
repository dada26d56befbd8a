//! Data-quality assessment of a compiled profile.

use crate::profile::FinancialProfile;
use serde::Serialize;

const MISSING_SOURCE_PENALTY: f64 = 15.0;
const NO_ASSETS_PENALTY: f64 = 10.0;
const NO_CREDIT_SCORE_PENALTY: f64 = 5.0;

const SUSPICIOUS_MONTHLY_INCOME: f64 = 1_000_000.0;
const SUSPICIOUS_TOTAL_DEBT: f64 = 10_000_000.0;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DataQualityReport {
    /// 0-100
    pub score: f64,
    pub issues: Vec<String>,
}

pub fn assess_data_quality(profile: &FinancialProfile) -> DataQualityReport {
    let mut issues = Vec::new();

    if profile.net_worth == 0.0 {
        issues.push("Net worth is zero, which may indicate missing data".to_string());
    }
    if profile.monthly_income() > 0.0 && profile.monthly_expenses() > profile.monthly_income() {
        issues.push("Monthly expenses exceed monthly income".to_string());
    }
    if profile.monthly_income() > SUSPICIOUS_MONTHLY_INCOME {
        issues.push("Monthly income is unusually high".to_string());
    }
    if profile.total_debt > SUSPICIOUS_TOTAL_DEBT {
        issues.push("Total debt is unusually high".to_string());
    }

    let coverage = &profile.coverage;
    let missing_sources = [
        !coverage.net_worth_snapshot,
        coverage.bank_transactions == 0,
        coverage.credit_accounts == 0,
        coverage.fund_transactions == 0,
        !coverage.retirement_balance,
    ]
    .iter()
    .filter(|missing| **missing)
    .count();

    let mut score = 100.0 - MISSING_SOURCE_PENALTY * missing_sources as f64;
    if profile.total_assets <= 0.0 {
        score -= NO_ASSETS_PENALTY;
    }
    if profile.credit_score == 0 {
        score -= NO_CREDIT_SCORE_PENALTY;
    }

    DataQualityReport {
        score: score.clamp(0.0, 100.0),
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{ProfileInputs, SourceCoverage};

    #[test]
    fn test_complete_profile_scores_full() {
        let profile = FinancialProfile::from_inputs(ProfileInputs {
            monthly_income: 80000.0,
            monthly_expenses: 50000.0,
            net_worth: 400000.0,
            total_assets: 400000.0,
            credit_score: 760,
            coverage: SourceCoverage {
                bank_transactions: 10,
                credit_accounts: 1,
                fund_transactions: 4,
                retirement_balance: true,
                net_worth_snapshot: true,
            },
            ..Default::default()
        });

        let report = assess_data_quality(&profile);
        assert_eq!(report.score, 100.0);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_unknown_profile_scores_low() {
        let report = assess_data_quality(&FinancialProfile::unknown());
        // five missing sources, no assets, no credit score
        assert_eq!(report.score, 10.0);
        assert_eq!(report.issues.len(), 1);
    }

    #[test]
    fn test_overspending_flagged() {
        let profile = FinancialProfile::from_inputs(ProfileInputs {
            monthly_income: 40000.0,
            monthly_expenses: 55000.0,
            net_worth: 1.0,
            ..Default::default()
        });
        let report = assess_data_quality(&profile);
        assert!(report.issues.iter().any(|i| i.contains("exceed")));
    }
}
