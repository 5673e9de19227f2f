//! Lunch Flow REST provider (API-key authenticated).

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use rust_decimal::Decimal;
use serde::Deserialize;

use pocketbook_core::errors::{Error, GatewayError, Result};
use pocketbook_core::gateway::GatewayResult;
use pocketbook_core::sync::{CreditProvider, ProviderKind, RemoteAccount, RemoteTransaction};
use pocketbook_core::utils::money::decimal_to_cents;

use crate::http::{build_client, send_json, DEFAULT_TIMEOUT_SECS};

const SERVICE: &str = "lunchflow";

pub const DEFAULT_LUNCHFLOW_API_URL: &str = "https://www.lunchflow.app/api/v1";

/// Ids arrive as numbers or strings depending on the endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RemoteId {
    Number(i64),
    Text(String),
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteId::Number(n) => write!(f, "{}", n),
            RemoteId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AccountsResponse {
    #[serde(default)]
    accounts: Vec<LunchFlowAccount>,
}

#[derive(Debug, Deserialize)]
struct LunchFlowAccount {
    id: RemoteId,
    name: String,
    institution_name: Option<String>,
    currency: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: Amount,
}

#[derive(Debug, Deserialize)]
struct Amount {
    amount: Decimal,
}

#[derive(Debug, Deserialize)]
struct TransactionsResponse {
    #[serde(default)]
    transactions: Vec<LunchFlowTransaction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LunchFlowTransaction {
    id: RemoteId,
    amount: Decimal,
    date: NaiveDate,
    merchant: Option<String>,
    description: Option<String>,
    #[serde(default)]
    is_pending: bool,
}

fn cents(value: Decimal) -> GatewayResult<i64> {
    decimal_to_cents(value).ok_or_else(|| GatewayError::decode(SERVICE, format!("amount {} out of range", value)))
}

impl LunchFlowTransaction {
    /// Merchant is the headline; the raw description becomes the memo.
    fn into_remote(self) -> GatewayResult<RemoteTransaction> {
        let (description, memo) = match (self.merchant, self.description) {
            (Some(merchant), description) if !merchant.trim().is_empty() => (merchant, description),
            (_, description) => (description.unwrap_or_default(), None),
        };
        Ok(RemoteTransaction {
            id: self.id.to_string(),
            date: self.date,
            amount: cents(self.amount)?,
            description,
            memo,
            pending: self.is_pending,
        })
    }
}

pub struct LunchFlowProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: HeaderValue,
}

impl LunchFlowProvider {
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_base_url(DEFAULT_LUNCHFLOW_API_URL, api_key, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_base_url(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(GatewayError::MissingCredentials {
                service: SERVICE.to_string(),
            }
            .into());
        }
        let api_key = HeaderValue::from_str(api_key)
            .map_err(|e| Error::Unexpected(format!("Invalid Lunch Flow API key format: {}", e)))?;
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert("x-api-key", self.api_key.clone());
        headers
    }

    fn account_path(account_id: &str, tail: &str) -> String {
        format!("/accounts/{}/{}", urlencoding::encode(account_id), tail)
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> GatewayResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("[{}] GET {}", SERVICE, url);
        send_json(SERVICE, self.client.get(&url).headers(self.headers())).await
    }
}

#[async_trait]
impl CreditProvider for LunchFlowProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::LunchFlow
    }

    async fn list_accounts(&self) -> GatewayResult<Vec<RemoteAccount>> {
        let response: AccountsResponse = self.get("/accounts").await?;
        Ok(response
            .accounts
            .into_iter()
            .filter(|a| !a.status.as_deref().is_some_and(|s| s.eq_ignore_ascii_case("DISCONNECTED")))
            .map(|a| RemoteAccount {
                id: a.id.to_string(),
                name: a.name,
                institution: a.institution_name,
                currency: a.currency,
                balance: None,
            })
            .collect())
    }

    async fn get_balance(&self, account_id: &str) -> GatewayResult<i64> {
        let response: BalanceResponse = self.get(&Self::account_path(account_id, "balance")).await?;
        cents(response.balance.amount)
    }

    /// The API has no date filter; older entries are dropped here.
    async fn list_transactions(
        &self,
        account_id: &str,
        since: Option<NaiveDate>,
    ) -> GatewayResult<Vec<RemoteTransaction>> {
        let response: TransactionsResponse = self.get(&Self::account_path(account_id, "transactions")).await?;
        response
            .transactions
            .into_iter()
            .filter(|t| !since.is_some_and(|s| t.date < s))
            .map(LunchFlowTransaction::into_remote)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Path, http::HeaderMap as AxumHeaders, http::StatusCode, routing::get, Json, Router};
    use serde_json::{json, Value};

    fn authorized(headers: &AxumHeaders) -> bool {
        headers.get("x-api-key").and_then(|v| v.to_str().ok()) == Some("lf-key")
    }

    async fn accounts(headers: AxumHeaders) -> (StatusCode, Json<Value>) {
        if !authorized(&headers) {
            return (StatusCode::UNAUTHORIZED, Json(json!({"error": "bad key"})));
        }
        (
            StatusCode::OK,
            Json(json!({"accounts": [
                {"id": 42, "name": "Sapphire", "institution_name": "Chase", "currency": "USD", "status": "ACTIVE"},
                {"id": "old", "name": "Closed card", "status": "DISCONNECTED"}
            ]})),
        )
    }

    async fn balance(Path(id): Path<String>) -> (StatusCode, Json<Value>) {
        if id != "42" {
            return (StatusCode::NOT_FOUND, Json(json!({"error": "no such account"})));
        }
        (StatusCode::OK, Json(json!({"balance": {"amount": -512.3, "currency": "USD"}})))
    }

    async fn transactions() -> Json<Value> {
        Json(json!({"transactions": [
            {"id": "t-1", "amount": -20.0, "date": "2025-09-15", "merchant": "Grocer", "description": "POS 1234 GROCER", "isPending": false},
            {"id": "t-2", "amount": 100, "date": "2025-08-30", "merchant": null, "description": "PAYMENT THANK YOU", "isPending": false},
            {"id": 7, "amount": -5.25, "date": "2025-09-16", "merchant": "", "description": "Parking", "isPending": true}
        ]}))
    }

    async fn spawn_api(key: &str) -> LunchFlowProvider {
        let app = Router::new()
            .route("/accounts", get(accounts))
            .route("/accounts/{id}/balance", get(balance))
            .route("/accounts/{id}/transactions", get(transactions));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        LunchFlowProvider::with_base_url(&format!("http://{}/", addr), key, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_accounts_skip_disconnected_and_stringify_ids() {
        let provider = spawn_api("lf-key").await;

        let accounts = provider.list_accounts().await.unwrap();

        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].id, "42");
        assert_eq!(accounts[0].institution.as_deref(), Some("Chase"));
        assert_eq!(provider.get_balance("42").await.unwrap(), -51_230);
    }

    #[tokio::test]
    async fn test_bad_key_is_missing_credentials() {
        let provider = spawn_api("wrong").await;

        let err = provider.list_accounts().await.unwrap_err();

        assert!(matches!(err, GatewayError::MissingCredentials { .. }));
    }

    #[tokio::test]
    async fn test_unknown_account_is_rejected_without_retry() {
        let provider = spawn_api("lf-key").await;

        let err = provider.get_balance("9").await.unwrap_err();

        assert!(matches!(err, GatewayError::Remote { .. }));
    }

    #[tokio::test]
    async fn test_transactions_filtered_by_since() {
        let provider = spawn_api("lf-key").await;

        let txs = provider
            .list_transactions("42", NaiveDate::from_ymd_opt(2025, 9, 1))
            .await
            .unwrap();

        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].description, "Grocer");
        assert_eq!(txs[0].memo.as_deref(), Some("POS 1234 GROCER"));
        assert_eq!(txs[0].amount, -2_000);
        assert_eq!(txs[1].id, "7");
        assert_eq!(txs[1].description, "Parking");
        assert!(txs[1].pending);
    }

    #[test]
    fn test_blank_key_rejected() {
        assert!(LunchFlowProvider::new(" ").is_err());
    }
}
