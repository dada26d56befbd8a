//! Raw records as returned by the financial data provider (camelCase JSON).

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Account counts arrive as numbers or numeric strings; anything else reads as 0.
fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let count = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse::<u64>().unwrap_or(0),
        _ => 0,
    };
    Ok(count.min(u32::MAX as u64) as u32)
}

fn lenient_score<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn null_as_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Credit,
    Debit,
    #[default]
    #[serde(other)]
    Others,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct BankTransaction {
    pub bank: String,
    pub amount: f64,
    pub narration: String,
    pub date: String,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub mode: String,
    pub balance: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CreditAccount {
    pub subscriber: String,
    pub account_type: String,
    pub credit_limit: f64,
    pub current_balance: f64,
    pub payment_rating: String,
    pub account_status: String,
    pub open_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CreditReport {
    #[serde(deserialize_with = "lenient_score")]
    pub credit_score: Option<u32>,
    pub accounts: Vec<CreditAccount>,
    #[serde(deserialize_with = "lenient_count")]
    pub total_accounts: u32,
    #[serde(deserialize_with = "lenient_count")]
    pub active_accounts: u32,
}

/// Provident-fund style retirement account balance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RetirementBalance {
    pub total_balance: f64,
    pub employee_share: f64,
    pub employer_share: f64,
    #[serde(deserialize_with = "null_as_zero")]
    pub pension_balance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct FundTransaction {
    pub isin: String,
    pub folio_id: String,
    #[serde(rename = "type")]
    pub transaction_type: String,
    pub date: String,
    pub amount: f64,
    pub units: f64,
    pub nav: f64,
    pub scheme_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AssetHolding {
    #[serde(rename = "type")]
    pub asset_type: String,
    pub value: f64,
    pub formatted_value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct NetWorthSnapshot {
    pub total_net_worth: f64,
    pub formatted_total_net_worth: String,
    pub currency: String,
    pub assets: Vec<AssetHolding>,
}

impl NetWorthSnapshot {
    pub fn is_empty(&self) -> bool {
        self.total_net_worth == 0.0 && self.assets.is_empty()
    }
}

/// Everything fetched for one user; a failed fetch leaves its default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecords {
    pub bank_transactions: Vec<BankTransaction>,
    pub credit_report: CreditReport,
    pub retirement: RetirementBalance,
    pub fund_transactions: Vec<FundTransaction>,
    pub net_worth: NetWorthSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bank_transaction_from_provider_json() {
        let json = r#"{
            "bank": "HDFC",
            "amount": 80935,
            "narration": "SALARY CREDIT ACME",
            "date": "2024-06-01",
            "type": "CREDIT",
            "mode": "NEFT",
            "balance": 120000
        }"#;

        let txn: BankTransaction = serde_json::from_str(json).unwrap();
        assert_eq!(txn.transaction_type, TransactionType::Credit);
        assert_eq!(txn.amount, 80935.0);
        assert_eq!(txn.balance, Some(120000.0));
    }

    #[test]
    fn test_unknown_transaction_type() {
        let txn: BankTransaction =
            serde_json::from_str(r#"{"amount": 10, "type": "INTEREST"}"#).unwrap();
        assert_eq!(txn.transaction_type, TransactionType::Others);
        assert!(txn.narration.is_empty());
    }

    #[test]
    fn test_net_worth_snapshot() {
        let json = r#"{
            "totalNetWorth": -50000,
            "currency": "INR",
            "assets": [{"type": "SAVINGS", "value": 25000}]
        }"#;
        let snapshot: NetWorthSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.total_net_worth, -50000.0);
        assert_eq!(snapshot.assets[0].asset_type, "SAVINGS");
        assert!(!snapshot.is_empty());
    }

    #[test]
    fn test_credit_report_with_string_counts() {
        let json = r#"{
            "creditScore": 745,
            "accounts": [{
                "subscriber": "HDFC Bank",
                "accountType": "10",
                "creditLimit": 150000,
                "currentBalance": 45000,
                "paymentRating": "0",
                "accountStatus": "11",
                "openDate": "20190315"
            }],
            "totalAccounts": "1",
            "activeAccounts": "1",
            "outstandingBalance": {"outstandingBalanceAll": "45000"}
        }"#;

        let report: CreditReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.credit_score, Some(745));
        assert_eq!(report.total_accounts, 1);
        assert_eq!(report.active_accounts, 1);
        assert_eq!(report.accounts[0].current_balance, 45000.0);
    }

    #[test]
    fn test_credit_report_count_shapes() {
        let numeric: CreditReport =
            serde_json::from_str(r#"{"totalAccounts": 3, "activeAccounts": null}"#).unwrap();
        assert_eq!(numeric.total_accounts, 3);
        assert_eq!(numeric.active_accounts, 0);

        let missing: CreditReport = serde_json::from_str(r#"{"creditScore": null}"#).unwrap();
        assert_eq!(missing.credit_score, None);
        assert_eq!(missing.total_accounts, 0);
    }

    #[test]
    fn test_retirement_balance_null_pension() {
        let json = r#"{
            "totalBalance": 200000,
            "employeeShare": 110000,
            "employerShare": 90000,
            "pensionBalance": null,
            "employerDetails": []
        }"#;
        let balance: RetirementBalance = serde_json::from_str(json).unwrap();
        assert_eq!(balance.total_balance, 200000.0);
        assert_eq!(balance.pension_balance, 0.0);
    }
}
