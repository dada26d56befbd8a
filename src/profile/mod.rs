//! Normalized financial profile
//!
//! A `FinancialProfile` is derived once per query from raw provider records
//! and shared read-only (behind an `Arc`) by every agent afterwards.
//! Derived figures are always computed from base figures, never set directly.

pub mod compiler;
pub mod provider;
pub mod quality;
pub mod raw;

pub use compiler::FinancialProfileCompiler;
pub use provider::{DataProvider, DataSource, HttpDataProvider, StaticDataProvider};
pub use quality::{assess_data_quality, DataQualityReport};

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Months of expenses a fully funded emergency reserve covers.
pub const EMERGENCY_TARGET_MONTHS: f64 = 6.0;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyFundTier {
    Insufficient,
    Moderate,
    Adequate,
    Unknown,
}

impl EmergencyFundTier {
    pub fn from_months(months: f64) -> Self {
        if months >= 6.0 {
            EmergencyFundTier::Adequate
        } else if months >= 3.0 {
            EmergencyFundTier::Moderate
        } else {
            EmergencyFundTier::Insufficient
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum IncomeStability {
    Stable,
    Estimated,
    #[default]
    NoData,
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PortfolioPerformance {
    Good,
    Moderate,
    #[default]
    NoInvestments,
    Unknown,
}

impl PortfolioPerformance {
    pub fn from_value(portfolio_value: f64) -> Self {
        if portfolio_value > 50_000.0 {
            PortfolioPerformance::Good
        } else if portfolio_value > 0.0 {
            PortfolioPerformance::Moderate
        } else {
            PortfolioPerformance::NoInvestments
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    FoodDelivery,
    Transport,
    Utilities,
    Entertainment,
    Healthcare,
    Education,
    Others,
}

const CATEGORY_KEYWORDS: &[(ExpenseCategory, &[&str])] = &[
    (ExpenseCategory::FoodDelivery, &["swiggy", "zomato", "food", "restaurant"]),
    (ExpenseCategory::Transport, &["uber", "ola", "petrol", "fuel"]),
    (ExpenseCategory::Utilities, &["electricity", "water", "gas", "broadband"]),
    (ExpenseCategory::Entertainment, &["movie", "netflix", "amazon", "flipkart"]),
    (ExpenseCategory::Healthcare, &["medical", "pharmacy", "hospital"]),
    (ExpenseCategory::Education, &["school", "college", "course"]),
];

impl ExpenseCategory {
    /// First category whose keyword appears in the narration; `Others` if none.
    pub fn classify(narration: &str) -> Self {
        let lower = narration.to_lowercase();
        CATEGORY_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
            .map(|(category, _)| *category)
            .unwrap_or(ExpenseCategory::Others)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseCategory::FoodDelivery => "food_delivery",
            ExpenseCategory::Transport => "transport",
            ExpenseCategory::Utilities => "utilities",
            ExpenseCategory::Entertainment => "entertainment",
            ExpenseCategory::Healthcare => "healthcare",
            ExpenseCategory::Education => "education",
            ExpenseCategory::Others => "others",
        }
    }
}

/// Income, expenses and the surplus between them.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct CashFlowFigures {
    monthly_income: f64,
    monthly_expenses: f64,
    discretionary_income: f64,
}

impl CashFlowFigures {
    pub fn new(monthly_income: f64, monthly_expenses: f64) -> Self {
        Self {
            monthly_income,
            monthly_expenses,
            discretionary_income: monthly_income - monthly_expenses,
        }
    }

    pub fn monthly_income(&self) -> f64 {
        self.monthly_income
    }

    pub fn monthly_expenses(&self) -> f64 {
        self.monthly_expenses
    }

    pub fn discretionary_income(&self) -> f64 {
        self.discretionary_income
    }
}

/// How many records each source contributed.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct SourceCoverage {
    pub bank_transactions: usize,
    pub credit_accounts: usize,
    pub fund_transactions: usize,
    pub retirement_balance: bool,
    pub net_worth_snapshot: bool,
}

/// Base figures a profile is derived from.
#[derive(Debug, Clone, Default)]
pub struct ProfileInputs {
    pub monthly_income: f64,
    pub monthly_expenses: f64,
    pub expense_categories: BTreeMap<ExpenseCategory, f64>,
    pub income_source: String,
    pub income_stability: IncomeStability,
    pub total_assets: f64,
    pub liquid_assets: f64,
    pub invested_assets: f64,
    pub retirement_savings: f64,
    pub net_worth: f64,
    pub total_debt: f64,
    pub credit_score: u32,
    pub portfolio_value: f64,
    pub scheme_count: usize,
    pub monthly_investment: f64,
    pub insurance_coverage: Option<f64>,
    pub coverage: SourceCoverage,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FinancialProfile {
    #[serde(flatten)]
    pub cash_flow: CashFlowFigures,
    pub expense_categories: BTreeMap<ExpenseCategory, f64>,
    pub income_source: String,
    pub income_stability: IncomeStability,
    pub total_assets: f64,
    pub liquid_assets: f64,
    pub invested_assets: f64,
    pub retirement_savings: f64,
    pub net_worth: f64,
    pub total_debt: f64,
    pub credit_score: u32,
    pub debt_to_income_ratio: f64,
    pub portfolio_value: f64,
    pub scheme_count: usize,
    pub portfolio_performance: PortfolioPerformance,
    /// Average monthly fund purchases
    pub monthly_investment: f64,
    pub emergency_fund_months: f64,
    pub emergency_fund_tier: EmergencyFundTier,
    pub stability_score: f64,
    pub insurance_coverage: Option<f64>,
    pub coverage: SourceCoverage,
}

impl FinancialProfile {
    pub fn from_inputs(inputs: ProfileInputs) -> Self {
        let cash_flow = CashFlowFigures::new(inputs.monthly_income, inputs.monthly_expenses);

        let debt_to_income_ratio = if inputs.monthly_income > 0.0 {
            inputs.total_debt / (inputs.monthly_income * 12.0)
        } else {
            0.0
        };

        let emergency_fund_months = if inputs.monthly_expenses > 0.0 {
            inputs.liquid_assets / inputs.monthly_expenses
        } else {
            0.0
        };

        let mut stability_score: f64 = 0.5;
        if inputs.credit_score > 700 {
            stability_score += 0.2;
        }
        if debt_to_income_ratio < 0.3 {
            stability_score += 0.2;
        }
        if emergency_fund_months >= 3.0 {
            stability_score += 0.1;
        }

        Self {
            cash_flow,
            expense_categories: inputs.expense_categories,
            income_source: inputs.income_source,
            income_stability: inputs.income_stability,
            total_assets: inputs.total_assets,
            liquid_assets: inputs.liquid_assets,
            invested_assets: inputs.invested_assets,
            retirement_savings: inputs.retirement_savings,
            net_worth: inputs.net_worth,
            total_debt: inputs.total_debt,
            credit_score: inputs.credit_score,
            debt_to_income_ratio,
            portfolio_value: inputs.portfolio_value,
            scheme_count: inputs.scheme_count,
            portfolio_performance: PortfolioPerformance::from_value(inputs.portfolio_value),
            monthly_investment: inputs.monthly_investment,
            emergency_fund_months,
            emergency_fund_tier: EmergencyFundTier::from_months(emergency_fund_months),
            stability_score: stability_score.min(1.0),
            insurance_coverage: inputs.insurance_coverage,
            coverage: inputs.coverage,
        }
    }

    /// All-zero profile handed out when aggregation fails.
    pub fn unknown() -> Self {
        Self {
            cash_flow: CashFlowFigures::new(0.0, 0.0),
            expense_categories: BTreeMap::new(),
            income_source: "unknown".to_string(),
            income_stability: IncomeStability::Unknown,
            total_assets: 0.0,
            liquid_assets: 0.0,
            invested_assets: 0.0,
            retirement_savings: 0.0,
            net_worth: 0.0,
            total_debt: 0.0,
            credit_score: 0,
            debt_to_income_ratio: 0.0,
            portfolio_value: 0.0,
            scheme_count: 0,
            portfolio_performance: PortfolioPerformance::Unknown,
            monthly_investment: 0.0,
            emergency_fund_months: 0.0,
            emergency_fund_tier: EmergencyFundTier::Unknown,
            stability_score: 0.0,
            insurance_coverage: None,
            coverage: SourceCoverage::default(),
        }
    }

    pub fn monthly_income(&self) -> f64 {
        self.cash_flow.monthly_income()
    }

    pub fn monthly_expenses(&self) -> f64 {
        self.cash_flow.monthly_expenses()
    }

    pub fn discretionary_income(&self) -> f64 {
        self.cash_flow.discretionary_income()
    }

    pub fn expense_in(&self, category: ExpenseCategory) -> f64 {
        self.expense_categories.get(&category).copied().unwrap_or(0.0)
    }

    /// Liquid reserve needed for six months of expenses.
    pub fn emergency_fund_target(&self) -> f64 {
        self.monthly_expenses() * EMERGENCY_TARGET_MONTHS
    }

    pub fn emergency_fund_shortfall(&self) -> f64 {
        (self.emergency_fund_target() - self.liquid_assets).max(0.0)
    }

    /// Every figure the profile carries is finite.
    pub fn is_well_formed(&self) -> bool {
        [
            self.monthly_income(),
            self.monthly_expenses(),
            self.discretionary_income(),
            self.total_assets,
            self.liquid_assets,
            self.invested_assets,
            self.retirement_savings,
            self.net_worth,
            self.total_debt,
            self.debt_to_income_ratio,
            self.portfolio_value,
            self.monthly_investment,
            self.emergency_fund_months,
            self.stability_score,
        ]
        .iter()
        .chain(self.expense_categories.values())
        .all(|v| v.is_finite())
    }

    /// SHA-256 over the serialized profile, hex encoded.
    pub fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }
}

/// Rupee amount with thousands separators, e.g. `₹80,935` or `-₹50,000`.
pub fn format_currency(amount: f64) -> String {
    let rounded = amount.round();
    let digits = format!("{}", rounded.abs() as u64);
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0.0 {
        format!("-₹{}", grouped)
    } else {
        format!("₹{}", grouped)
    }
}

impl fmt::Display for EmergencyFundTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EmergencyFundTier::Insufficient => "insufficient",
            EmergencyFundTier::Moderate => "moderate",
            EmergencyFundTier::Adequate => "adequate",
            EmergencyFundTier::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(income: f64, expenses: f64) -> ProfileInputs {
        ProfileInputs {
            monthly_income: income,
            monthly_expenses: expenses,
            ..Default::default()
        }
    }

    #[test]
    fn test_discretionary_income_is_derived() {
        for (income, expenses) in [(80935.0, 65000.0), (0.0, 1200.5), (50000.0, 72000.0)] {
            let profile = FinancialProfile::from_inputs(inputs(income, expenses));
            assert_eq!(profile.discretionary_income(), income - expenses);
        }
    }

    #[test]
    fn test_zero_income_has_zero_debt_ratio() {
        let profile = FinancialProfile::from_inputs(ProfileInputs {
            total_debt: 250_000.0,
            ..inputs(0.0, 30_000.0)
        });
        assert_eq!(profile.debt_to_income_ratio, 0.0);
    }

    #[test]
    fn test_emergency_tiers() {
        assert_eq!(EmergencyFundTier::from_months(6.0), EmergencyFundTier::Adequate);
        assert_eq!(EmergencyFundTier::from_months(3.0), EmergencyFundTier::Moderate);
        assert_eq!(EmergencyFundTier::from_months(2.99), EmergencyFundTier::Insufficient);
    }

    #[test]
    fn test_stability_score() {
        let profile = FinancialProfile::from_inputs(ProfileInputs {
            credit_score: 750,
            liquid_assets: 200_000.0,
            total_debt: 100_000.0,
            ..inputs(80_000.0, 50_000.0)
        });
        // 0.5 + 0.2 (credit) + 0.2 (dti) + 0.1 (coverage)
        assert!((profile.stability_score - 1.0).abs() < 1e-9);

        let thin = FinancialProfile::from_inputs(ProfileInputs {
            credit_score: 650,
            total_debt: 1_000_000.0,
            ..inputs(50_000.0, 40_000.0)
        });
        assert!((thin.stability_score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_classify_narration() {
        assert_eq!(ExpenseCategory::classify("UPI/SWIGGY/order"), ExpenseCategory::FoodDelivery);
        assert_eq!(ExpenseCategory::classify("Netflix subscription"), ExpenseCategory::Entertainment);
        assert_eq!(ExpenseCategory::classify("ATM withdrawal"), ExpenseCategory::Others);
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(80935.0), "₹80,935");
        assert_eq!(format_currency(-50000.0), "-₹50,000");
        assert_eq!(format_currency(999.4), "₹999");
        assert_eq!(format_currency(1234567.0), "₹1,234,567");
    }

    #[test]
    fn test_unknown_profile() {
        let profile = FinancialProfile::unknown();
        assert_eq!(profile.emergency_fund_tier, EmergencyFundTier::Unknown);
        assert_eq!(profile.income_stability, IncomeStability::Unknown);
        assert_eq!(profile.discretionary_income(), 0.0);
        assert!(profile.is_well_formed());
    }
}
