//! Financial data provider seam
//!
//! Five independent fetches keyed by a user identifier. The HTTP provider
//! talks to the hosted financial data service; the static provider serves
//! fixed records for tests and local runs.

use crate::error::CollaborationError;
use crate::profile::raw::{
    AssetHolding, BankTransaction, CreditAccount, CreditReport, FundTransaction,
    NetWorthSnapshot, RawRecords, RetirementBalance, TransactionType,
};
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataSource {
    BankTransactions,
    CreditReport,
    RetirementBalance,
    FundTransactions,
    NetWorth,
}

impl DataSource {
    pub fn endpoint(&self) -> &'static str {
        match self {
            DataSource::BankTransactions => "getBankTransactions",
            DataSource::CreditReport => "getCreditReport",
            DataSource::RetirementBalance => "getEPFDetails",
            DataSource::FundTransactions => "getMFTransactions",
            DataSource::NetWorth => "getNetWorth",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DataSource::BankTransactions => "bank_transactions",
            DataSource::CreditReport => "credit_report",
            DataSource::RetirementBalance => "retirement_balance",
            DataSource::FundTransactions => "fund_transactions",
            DataSource::NetWorth => "net_worth",
        };
        f.write_str(label)
    }
}

#[async_trait]
pub trait DataProvider: Send + Sync {
    async fn bank_transactions(&self, user_identifier: &str) -> Result<Vec<BankTransaction>>;
    async fn credit_report(&self, user_identifier: &str) -> Result<CreditReport>;
    async fn retirement_balance(&self, user_identifier: &str) -> Result<RetirementBalance>;
    async fn fund_transactions(&self, user_identifier: &str) -> Result<Vec<FundTransaction>>;
    async fn net_worth(&self, user_identifier: &str) -> Result<NetWorthSnapshot>;
}

//
// ================= HTTP provider =================
//

#[derive(Clone)]
pub struct HttpDataProvider {
    client: Client,
    base_url: String,
}

impl HttpDataProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// POST `{base}/{endpoint}?phoneNumber=...` and unwrap the `{success, data}` envelope.
    async fn fetch(&self, source: DataSource, user_identifier: &str) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, source.endpoint());

        let response = self
            .client
            .post(&url)
            .query(&[("phoneNumber", user_identifier)])
            .send()
            .await
            .map_err(|e| {
                CollaborationError::DataProvider(format!("{} request failed: {}", source, e))
            })?;

        let status = response.status();
        let body = response.json::<Value>().await.map_err(|e| {
            CollaborationError::DataProvider(format!("{} returned invalid JSON: {}", source, e))
        })?;

        if !status.is_success() {
            return Err(CollaborationError::DataProvider(format!(
                "{} returned {}",
                source, status
            )));
        }

        debug!(source = %source, "Provider response received");
        unwrap_envelope(source, body)
    }

    async fn fetch_record<T: DeserializeOwned>(
        &self,
        source: DataSource,
        user_identifier: &str,
    ) -> Result<T> {
        let data = self.fetch(source, user_identifier).await?;
        Ok(serde_json::from_value(data)?)
    }

    async fn fetch_list<T: DeserializeOwned>(
        &self,
        source: DataSource,
        user_identifier: &str,
    ) -> Result<Vec<T>> {
        let data = self.fetch(source, user_identifier).await?;
        let list = match data {
            Value::Array(_) => data,
            Value::Object(mut map) => map.remove("transactions").unwrap_or(Value::Array(vec![])),
            _ => {
                return Err(CollaborationError::DataProvider(format!(
                    "{} payload is not a list",
                    source
                )))
            }
        };
        Ok(serde_json::from_value(list)?)
    }
}

fn unwrap_envelope(source: DataSource, body: Value) -> Result<Value> {
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        let reason = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("provider reported failure");
        return Err(CollaborationError::DataProvider(format!("{}: {}", source, reason)));
    }

    match body {
        Value::Object(mut map) if map.contains_key("data") => {
            Ok(map.remove("data").unwrap_or(Value::Null))
        }
        other => Ok(other),
    }
}

#[async_trait]
impl DataProvider for HttpDataProvider {
    async fn bank_transactions(&self, user_identifier: &str) -> Result<Vec<BankTransaction>> {
        self.fetch_list(DataSource::BankTransactions, user_identifier).await
    }

    async fn credit_report(&self, user_identifier: &str) -> Result<CreditReport> {
        self.fetch_record(DataSource::CreditReport, user_identifier).await
    }

    async fn retirement_balance(&self, user_identifier: &str) -> Result<RetirementBalance> {
        self.fetch_record(DataSource::RetirementBalance, user_identifier).await
    }

    async fn fund_transactions(&self, user_identifier: &str) -> Result<Vec<FundTransaction>> {
        self.fetch_list(DataSource::FundTransactions, user_identifier).await
    }

    async fn net_worth(&self, user_identifier: &str) -> Result<NetWorthSnapshot> {
        self.fetch_record(DataSource::NetWorth, user_identifier).await
    }
}

//
// ================= Static provider =================
//

/// Serves a fixed record set; individual sources can be made to fail.
#[derive(Debug, Clone, Default)]
pub struct StaticDataProvider {
    records: RawRecords,
    failing: HashSet<DataSource>,
}

impl StaticDataProvider {
    pub fn new(records: RawRecords) -> Self {
        Self {
            records,
            failing: HashSet::new(),
        }
    }

    pub fn failing(mut self, source: DataSource) -> Self {
        self.failing.insert(source);
        self
    }

    fn check(&self, source: DataSource) -> Result<()> {
        if self.failing.contains(&source) {
            Err(CollaborationError::DataProvider(format!("{} unavailable", source)))
        } else {
            Ok(())
        }
    }

    /// Salaried user with a thin emergency reserve and two running SIPs.
    pub fn sample() -> Self {
        Self::new(sample_records())
    }
}

#[async_trait]
impl DataProvider for StaticDataProvider {
    async fn bank_transactions(&self, _user_identifier: &str) -> Result<Vec<BankTransaction>> {
        self.check(DataSource::BankTransactions)?;
        Ok(self.records.bank_transactions.clone())
    }

    async fn credit_report(&self, _user_identifier: &str) -> Result<CreditReport> {
        self.check(DataSource::CreditReport)?;
        Ok(self.records.credit_report.clone())
    }

    async fn retirement_balance(&self, _user_identifier: &str) -> Result<RetirementBalance> {
        self.check(DataSource::RetirementBalance)?;
        Ok(self.records.retirement.clone())
    }

    async fn fund_transactions(&self, _user_identifier: &str) -> Result<Vec<FundTransaction>> {
        self.check(DataSource::FundTransactions)?;
        Ok(self.records.fund_transactions.clone())
    }

    async fn net_worth(&self, _user_identifier: &str) -> Result<NetWorthSnapshot> {
        self.check(DataSource::NetWorth)?;
        Ok(self.records.net_worth.clone())
    }
}

fn bank(amount: f64, narration: &str, date: &str, kind: TransactionType) -> BankTransaction {
    BankTransaction {
        bank: "HDFC".to_string(),
        amount,
        narration: narration.to_string(),
        date: date.to_string(),
        transaction_type: kind,
        mode: "UPI".to_string(),
        balance: None,
    }
}

fn fund(scheme: &str, date: &str, amount: f64) -> FundTransaction {
    FundTransaction {
        isin: format!("INF{:0>9}", scheme.len()),
        folio_id: "F-1001".to_string(),
        transaction_type: "BUY".to_string(),
        date: date.to_string(),
        amount,
        units: amount / 50.0,
        nav: 50.0,
        scheme_name: scheme.to_string(),
    }
}

fn asset(kind: &str, value: f64) -> AssetHolding {
    AssetHolding {
        asset_type: kind.to_string(),
        value,
        formatted_value: crate::profile::format_currency(value),
    }
}

pub(crate) fn sample_records() -> RawRecords {
    use TransactionType::{Credit, Debit};

    RawRecords {
        bank_transactions: vec![
            bank(80935.0, "SALARY ACME TECHNOLOGIES", "2024-06-01", Credit),
            bank(35000.0, "RENT PAYMENT JUNE", "2024-06-02", Debit),
            bank(6500.0, "UPI/SWIGGY/ORDERS", "2024-06-05", Debit),
            bank(4200.0, "UBER RIDES", "2024-06-07", Debit),
            bank(2800.0, "ELECTRICITY BILL", "2024-06-09", Debit),
            bank(1500.0, "NETFLIX SUBSCRIPTION", "2024-06-10", Debit),
            bank(1000.0, "APOLLO PHARMACY", "2024-06-14", Debit),
            bank(5000.0, "ONLINE COURSE FEE", "2024-06-18", Debit),
            bank(9000.0, "BIGBASKET GROCERIES", "2024-06-21", Debit),
        ],
        credit_report: CreditReport {
            credit_score: Some(745),
            accounts: vec![
                CreditAccount {
                    subscriber: "HDFC Bank".to_string(),
                    account_type: "CREDIT_CARD".to_string(),
                    credit_limit: 150000.0,
                    current_balance: 45000.0,
                    payment_rating: "STANDARD".to_string(),
                    account_status: "ACTIVE".to_string(),
                    open_date: "2019-03-15".to_string(),
                },
                CreditAccount {
                    subscriber: "ICICI Bank".to_string(),
                    account_type: "PERSONAL_LOAN".to_string(),
                    credit_limit: 300000.0,
                    current_balance: 180000.0,
                    payment_rating: "STANDARD".to_string(),
                    account_status: "ACTIVE".to_string(),
                    open_date: "2022-08-01".to_string(),
                },
            ],
            total_accounts: 2,
            active_accounts: 2,
        },
        retirement: RetirementBalance {
            total_balance: 320000.0,
            employee_share: 160000.0,
            employer_share: 130000.0,
            pension_balance: 30000.0,
        },
        fund_transactions: vec![
            fund("Axis Bluechip Fund", "2024-04-05", 10000.0),
            fund("Axis Bluechip Fund", "2024-05-05", 10000.0),
            fund("Axis Bluechip Fund", "2024-06-05", 10000.0),
            fund("Parag Parikh Flexi Cap", "2024-04-10", 5000.0),
            fund("Parag Parikh Flexi Cap", "2024-05-10", 5000.0),
            fund("Parag Parikh Flexi Cap", "2024-06-10", 5000.0),
        ],
        net_worth: NetWorthSnapshot {
            total_net_worth: 540000.0,
            formatted_total_net_worth: "₹5,40,000".to_string(),
            currency: "INR".to_string(),
            assets: vec![
                asset("ASSET_TYPE_SAVINGS_ACCOUNTS", 150000.0),
                asset("ASSET_TYPE_MUTUAL_FUND", 45000.0),
                asset("ASSET_TYPE_EPF", 320000.0),
                asset("ASSET_TYPE_INDIAN_SECURITIES", 25000.0),
            ],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unwrap_envelope() {
        let data = unwrap_envelope(
            DataSource::NetWorth,
            json!({ "success": true, "data": { "totalNetWorth": 10 } }),
        )
        .unwrap();
        assert_eq!(data["totalNetWorth"], 10);

        let failed = unwrap_envelope(
            DataSource::CreditReport,
            json!({ "success": false, "error": "no such user" }),
        );
        assert!(matches!(failed, Err(CollaborationError::DataProvider(_))));
    }

    #[tokio::test]
    async fn test_static_provider_failure_injection() {
        let provider = StaticDataProvider::sample().failing(DataSource::CreditReport);
        assert!(provider.credit_report("9999999999").await.is_err());
        assert_eq!(provider.bank_transactions("9999999999").await.unwrap().len(), 9);
    }

    #[test]
    fn test_sample_expenses_total() {
        let records = sample_records();
        let debits: f64 = records
            .bank_transactions
            .iter()
            .filter(|t| t.transaction_type == TransactionType::Debit)
            .map(|t| t.amount)
            .sum();
        assert_eq!(debits, 65000.0);
    }
}
