//! Profile compiler
//!
//! Fetches the five raw record sets concurrently, tolerating per-source
//! failure, and derives a `FinancialProfile` from whatever arrived.

use crate::error::CollaborationError;
use crate::profile::provider::{DataProvider, DataSource};
use crate::profile::raw::{RawRecords, TransactionType};
use crate::profile::{
    ExpenseCategory, FinancialProfile, IncomeStability, ProfileInputs, SourceCoverage,
};
use crate::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct FinancialProfileCompiler {
    provider: Arc<dyn DataProvider>,
}

impl FinancialProfileCompiler {
    pub fn new(provider: Arc<dyn DataProvider>) -> Self {
        Self { provider }
    }

    /// Always returns a well-formed profile; aggregation failure yields
    /// `FinancialProfile::unknown()`.
    pub async fn compile(&self, user_identifier: &str) -> FinancialProfile {
        let records = self.fetch_all(user_identifier).await;

        match aggregate(&records) {
            Ok(profile) => {
                info!(
                    monthly_income = profile.monthly_income(),
                    monthly_expenses = profile.monthly_expenses(),
                    tier = %profile.emergency_fund_tier,
                    "Financial profile compiled"
                );
                profile
            }
            Err(e) => {
                error!(error = %e, "Profile aggregation failed, using unknown profile");
                FinancialProfile::unknown()
            }
        }
    }

    /// Fan out the five fetches; a failed source degrades to its empty default.
    pub async fn fetch_all(&self, user_identifier: &str) -> RawRecords {
        let provider = &self.provider;

        let (bank, credit, retirement, funds, net_worth) = tokio::join!(
            provider.bank_transactions(user_identifier),
            provider.credit_report(user_identifier),
            provider.retirement_balance(user_identifier),
            provider.fund_transactions(user_identifier),
            provider.net_worth(user_identifier),
        );

        RawRecords {
            bank_transactions: or_default(DataSource::BankTransactions, bank),
            credit_report: or_default(DataSource::CreditReport, credit),
            retirement: or_default(DataSource::RetirementBalance, retirement),
            fund_transactions: or_default(DataSource::FundTransactions, funds),
            net_worth: or_default(DataSource::NetWorth, net_worth),
        }
    }
}

fn or_default<T: Default>(source: DataSource, fetched: Result<T>) -> T {
    match fetched {
        Ok(value) => value,
        Err(e) => {
            warn!(source = %source, error = %e, "Fetch failed, using empty default");
            T::default()
        }
    }
}

fn ensure_finite(label: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(CollaborationError::Aggregation(format!(
            "non-finite amount in {}",
            label
        )))
    }
}

/// Derive a profile from raw records.
pub fn aggregate(records: &RawRecords) -> Result<FinancialProfile> {
    for txn in &records.bank_transactions {
        ensure_finite("bank transaction", txn.amount)?;
    }
    for account in &records.credit_report.accounts {
        ensure_finite("credit account", account.current_balance)?;
    }
    for txn in &records.fund_transactions {
        ensure_finite("fund transaction", txn.amount)?;
    }
    for holding in &records.net_worth.assets {
        ensure_finite("asset holding", holding.value)?;
    }
    ensure_finite("net worth", records.net_worth.total_net_worth)?;
    ensure_finite("retirement balance", records.retirement.total_balance)?;

    // Income: largest salary credit, else the mean credit.
    let salary = records
        .bank_transactions
        .iter()
        .filter(|t| t.narration.to_uppercase().contains("SALARY"))
        .map(|t| t.amount)
        .fold(None, |best: Option<f64>, amount| {
            Some(best.map_or(amount, |b| b.max(amount)))
        });

    let credits: Vec<f64> = records
        .bank_transactions
        .iter()
        .filter(|t| t.transaction_type == TransactionType::Credit)
        .map(|t| t.amount)
        .collect();

    let (monthly_income, income_source, income_stability) = match salary {
        Some(amount) => (amount, "salary", IncomeStability::Stable),
        None if !credits.is_empty() => (
            credits.iter().sum::<f64>() / credits.len() as f64,
            "average_credits",
            IncomeStability::Estimated,
        ),
        None => (0.0, "none", IncomeStability::NoData),
    };

    let mut monthly_expenses = 0.0;
    let mut expense_categories: BTreeMap<ExpenseCategory, f64> = BTreeMap::new();
    for txn in records
        .bank_transactions
        .iter()
        .filter(|t| t.transaction_type == TransactionType::Debit)
    {
        monthly_expenses += txn.amount;
        *expense_categories
            .entry(ExpenseCategory::classify(&txn.narration))
            .or_insert(0.0) += txn.amount;
    }

    let mut total_assets = 0.0;
    let mut liquid_assets = 0.0;
    let mut invested_assets = 0.0;
    let mut retirement_savings = 0.0;
    let mut insurance_coverage: Option<f64> = None;
    for holding in &records.net_worth.assets {
        total_assets += holding.value;
        // provider types are prefixed, e.g. ASSET_TYPE_SAVINGS_ACCOUNTS
        let kind = holding.asset_type.to_uppercase();
        if kind.contains("SAVINGS") {
            liquid_assets += holding.value;
        } else if kind.contains("MUTUAL_FUND") || kind.contains("SECURITIES") {
            invested_assets += holding.value;
        } else if kind.contains("EPF") {
            retirement_savings += holding.value;
        } else if kind.contains("INSURANCE") {
            *insurance_coverage.get_or_insert(0.0) += holding.value;
        }
    }
    if retirement_savings == 0.0 {
        retirement_savings = records.retirement.total_balance;
    }

    let total_debt: f64 = records
        .credit_report
        .accounts
        .iter()
        .map(|a| a.current_balance)
        .sum();

    let portfolio_value: f64 = records.fund_transactions.iter().map(|t| t.amount).sum();
    let scheme_count = records
        .fund_transactions
        .iter()
        .map(|t| t.scheme_name.as_str())
        .filter(|name| !name.is_empty())
        .collect::<BTreeSet<_>>()
        .len();
    let active_months = records
        .fund_transactions
        .iter()
        .filter_map(|t| t.date.get(..7))
        .collect::<BTreeSet<_>>()
        .len();
    let monthly_investment = if active_months > 0 {
        portfolio_value / active_months as f64
    } else {
        0.0
    };

    let coverage = SourceCoverage {
        bank_transactions: records.bank_transactions.len(),
        credit_accounts: records.credit_report.accounts.len(),
        fund_transactions: records.fund_transactions.len(),
        retirement_balance: records.retirement.total_balance > 0.0,
        net_worth_snapshot: !records.net_worth.is_empty(),
    };

    debug!(
        bank = coverage.bank_transactions,
        credit_accounts = coverage.credit_accounts,
        funds = coverage.fund_transactions,
        "Aggregating raw records"
    );

    Ok(FinancialProfile::from_inputs(ProfileInputs {
        monthly_income,
        monthly_expenses,
        expense_categories,
        income_source: income_source.to_string(),
        income_stability,
        total_assets,
        liquid_assets,
        invested_assets,
        retirement_savings,
        net_worth: records.net_worth.total_net_worth,
        total_debt,
        credit_score: records.credit_report.credit_score.unwrap_or(0),
        portfolio_value,
        scheme_count,
        monthly_investment,
        insurance_coverage,
        coverage,
    }))
}
