use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::OnceCell;

use pocketbook_core::constants::DEFAULT_FUNDING_SOURCE_NAME;
use pocketbook_core::errors::{Error, GatewayError, Result};
use pocketbook_core::gateway::{
    AccountSnapshot, BankGateway, BillRecord, DebitCard, GatewayResult, MoveMoneyRequest, NewBillRequest,
    NewPocketRequest, SpendSubaccountRequest, Subaccount, Transaction, TransactionDetail,
};

use super::queries;
use super::wire::{
    bill_pocket_note, to_cadence, ActivityData, ActivityDetailData, BillNode, CardsData, CurrentUserData,
    GraphQlResponse, IdNode, MutationResult, ReassignmentRule, SubaccountNode,
};
use crate::http::{build_client, send_json, DEFAULT_TIMEOUT_SECS};

const SERVICE: &str = "bank";

#[derive(Debug, Clone)]
pub struct BankGatewayConfig {
    /// GraphQL endpoint
    pub url: String,
    pub bearer_token: String,
    /// Display name of the spendable account, used when the API does not flag it.
    pub primary_name: String,
    pub timeout: Duration,
}

impl BankGatewayConfig {
    pub fn new(url: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            bearer_token: bearer_token.into(),
            primary_name: DEFAULT_FUNDING_SOURCE_NAME.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// [`BankGateway`] over the bank's GraphQL API.
///
/// Bills and their reservation pockets are separate objects at the bank; the
/// pocket carries a note naming its bill so the two can be joined on read.
pub struct GraphQlBankGateway {
    client: reqwest::Client,
    config: BankGatewayConfig,
    auth_header: HeaderValue,
    account_id: OnceCell<String>,
}

impl GraphQlBankGateway {
    pub fn new(config: BankGatewayConfig) -> Result<Self> {
        let token = config.bearer_token.trim();
        if token.is_empty() {
            return Err(GatewayError::MissingCredentials {
                service: SERVICE.to_string(),
            }
            .into());
        }
        let auth_header = HeaderValue::from_str(token)
            .map_err(|e| Error::Unexpected(format!("Invalid bearer token format: {}", e)))?;
        Ok(Self {
            client: build_client(config.timeout)?,
            config,
            auth_header,
            account_id: OnceCell::new(),
        })
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, self.auth_header.clone());
        headers
    }

    async fn graphql<T: DeserializeOwned>(&self, operation: &str, query: &str, variables: Value) -> GatewayResult<T> {
        debug!("[{}] {}", SERVICE, operation);
        let body = json!({
            "operationName": operation,
            "query": query,
            "variables": variables,
        });
        let request = self.client.post(&self.config.url).headers(self.headers()).json(&body);
        let response: GraphQlResponse<T> = send_json(SERVICE, request).await?;
        response.into_data(SERVICE)
    }

    /// Unwraps `{ "<field>": { "result": T } }`.
    async fn mutate<T: DeserializeOwned>(
        &self,
        operation: &str,
        field: &str,
        query: &str,
        variables: Value,
    ) -> GatewayResult<T> {
        let mut data: serde_json::Map<String, Value> = self.graphql(operation, query, variables).await?;
        let payload = data
            .remove(field)
            .ok_or_else(|| GatewayError::decode(SERVICE, format!("{} missing from response", field)))?;
        let wrapped: MutationResult<T> =
            serde_json::from_value(payload).map_err(|e| GatewayError::decode(SERVICE, e.to_string()))?;
        wrapped
            .result
            .ok_or_else(|| GatewayError::remote(SERVICE, format!("{} returned no result", operation)))
    }

    /// Id of the primary (checking) account, looked up once.
    async fn account_id(&self) -> GatewayResult<String> {
        self.account_id
            .get_or_try_init(|| async {
                let data: CurrentUserData = self
                    .graphql("CurrentUser", queries::PRIMARY_ACCOUNT, json!({}))
                    .await?;
                let accounts = data.current_user.accounts;
                let chosen = accounts
                    .iter()
                    .find(|a| a.display_name.as_deref() == Some(self.config.primary_name.as_str()))
                    .or_else(|| accounts.first())
                    .and_then(|a| a.id.clone())
                    .ok_or_else(|| GatewayError::remote(SERVICE, "no account found for current user"))?;
                info!("[{}] using account {}", SERVICE, chosen);
                Ok::<String, GatewayError>(chosen)
            })
            .await
            .cloned()
    }

    async fn subaccount_nodes(&self) -> GatewayResult<Vec<SubaccountNode>> {
        let data: CurrentUserData = self.graphql("CurrentUser", queries::SUBACCOUNTS, json!({})).await?;
        Ok(data
            .current_user
            .accounts
            .into_iter()
            .flat_map(|a| a.subaccounts)
            .collect())
    }
}

#[async_trait]
impl BankGateway for GraphQlBankGateway {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn get_account_balance(&self) -> GatewayResult<i64> {
        Ok(self.subaccount_nodes().await?.iter().map(|s| s.overall_balance).sum())
    }

    async fn list_subaccounts(&self) -> GatewayResult<Vec<Subaccount>> {
        let primary = self.config.primary_name.as_str();
        Ok(self
            .subaccount_nodes()
            .await?
            .into_iter()
            .map(|s| s.into_subaccount(primary))
            .collect())
    }

    /// One request, so the balance and the pockets always agree.
    async fn fetch_snapshot(&self) -> GatewayResult<AccountSnapshot> {
        let subaccounts = self.list_subaccounts().await?;
        Ok(AccountSnapshot {
            balance: subaccounts.iter().map(|s| s.balance).sum(),
            subaccounts,
            fetched_at: Utc::now(),
        })
    }

    async fn list_transactions(&self, page_size: usize) -> GatewayResult<Vec<Transaction>> {
        let account_id = self.account_id().await?;
        let data: ActivityData = self
            .graphql(
                "RecentActivity",
                queries::RECENT_ACTIVITY,
                json!({ "accountId": account_id, "pageSize": page_size }),
            )
            .await?;
        let account = data
            .account
            .ok_or_else(|| GatewayError::remote(SERVICE, format!("account {} not found", account_id)))?;
        Ok(account
            .cash_transactions
            .edges
            .into_iter()
            .map(|e| Transaction::from(e.node))
            .collect())
    }

    async fn move_money(&self, request: MoveMoneyRequest) -> GatewayResult<()> {
        let _: IdNode = self
            .mutate(
                "InitiateTransfer",
                "initiateTransfer",
                queries::INITIATE_TRANSFER,
                json!({ "input": {
                    "amount": request.amount,
                    "accountFromId": request.from_id,
                    "accountToId": request.to_id,
                    "note": request.note,
                }}),
            )
            .await?;
        Ok(())
    }

    async fn create_pocket(&self, request: NewPocketRequest) -> GatewayResult<Subaccount> {
        let account_id = self.account_id().await?;
        let node: SubaccountNode = self
            .mutate(
                "CreateSubaccount",
                "createSubaccount",
                queries::CREATE_SUBACCOUNT,
                json!({ "input": {
                    "type": "SAVINGS",
                    "piggyBanked": false,
                    "accountId": account_id,
                    "name": request.name,
                    "targetAmount": request.target.unwrap_or(0),
                    "initialTransferAmount": request.initial_funding,
                    "note": request.note,
                }}),
            )
            .await?;
        Ok(node.into_subaccount(&self.config.primary_name))
    }

    async fn delete_pocket(&self, pocket_id: &str) -> GatewayResult<()> {
        let _: IdNode = self
            .mutate(
                "DeleteSubaccount",
                "deleteSubaccount",
                queries::DELETE_SUBACCOUNT,
                json!({ "id": pocket_id }),
            )
            .await?;
        Ok(())
    }

    async fn list_bills(&self) -> GatewayResult<Vec<BillRecord>> {
        let data: CurrentUserData = self.graphql("CurrentUser", queries::BILLS, json!({})).await?;
        let mut bills = Vec::new();
        let mut pockets = Vec::new();
        for account in data.current_user.accounts {
            pockets.extend(account.subaccounts);
            if let Some(reserve) = account.bill_reserve {
                bills.extend(reserve.bills);
            }
        }
        bills
            .into_iter()
            .map(|bill| {
                let note = bill_pocket_note(&bill.name);
                let pocket_id = pockets
                    .iter()
                    .find(|p| p.note.as_deref() == Some(note.as_str()))
                    .map(|p| p.id.clone());
                bill.into_record(SERVICE, pocket_id)
            })
            .collect()
    }

    async fn create_bill(&self, request: NewBillRequest) -> GatewayResult<BillRecord> {
        let pocket = self
            .create_pocket(NewPocketRequest {
                name: request.name.clone(),
                target: Some(request.amount),
                initial_funding: request.reserve_amount,
                note: Some(bill_pocket_note(&request.name)),
            })
            .await?;

        let account_id = self.account_id().await?;
        let (unit, interval) = to_cadence(request.frequency);
        let created: GatewayResult<BillNode> = self
            .mutate(
                "CreateBill",
                "createBill",
                queries::CREATE_BILL,
                json!({ "input": {
                    "accountId": account_id,
                    "amount": request.amount,
                    "anchorDate": request.anchor_date.format("%Y-%m-%d").to_string(),
                    "frequency": unit,
                    "frequencyInterval": interval,
                    "autoAdjustAmount": request.variable,
                    "paused": false,
                    "name": request.name,
                    "reassignmentRule": request.match_rule.map(ReassignmentRule::from),
                }}),
            )
            .await;

        match created {
            Ok(node) => node.into_record(SERVICE, Some(pocket.id)),
            Err(err) => {
                // Undo the pocket so its reservation flows back to checking.
                warn!("[{}] bill creation failed, removing pocket {}: {}", SERVICE, pocket.id, err);
                if let Err(cleanup) = self.delete_pocket(&pocket.id).await {
                    warn!("[{}] could not remove pocket {}: {}", SERVICE, pocket.id, cleanup);
                }
                Err(err)
            }
        }
    }

    async fn delete_bill(&self, bill_id: &str) -> GatewayResult<()> {
        let _: IdNode = self
            .mutate("DeleteBill", "deleteBill", queries::DELETE_BILL, json!({ "id": bill_id }))
            .await?;
        Ok(())
    }

    async fn funding_source_name(&self) -> GatewayResult<String> {
        let data: CurrentUserData = self
            .graphql("CurrentUser", queries::FUNDING_SOURCE, json!({}))
            .await?;
        Ok(data
            .current_user
            .accounts
            .iter()
            .filter_map(|a| a.bill_reserve.as_ref())
            .find_map(|r| r.funding_name())
            .unwrap_or_else(|| DEFAULT_FUNDING_SOURCE_NAME.to_string()))
    }

    async fn transaction_detail(&self, transaction_id: &str) -> GatewayResult<Option<TransactionDetail>> {
        let data: ActivityDetailData = self
            .graphql(
                "ActivityDetail",
                queries::ACTIVITY_DETAIL,
                json!({ "activityId": transaction_id }),
            )
            .await?;
        Ok(data.cash_transaction.and_then(|node| node.into_detail()))
    }

    /// Only the parents' active physical cards; child cards are not managed here.
    async fn list_debit_cards(&self) -> GatewayResult<Vec<DebitCard>> {
        let data: CardsData = self.graphql("PhysicalCards", queries::PHYSICAL_CARDS, json!({})).await?;
        Ok(data
            .current_user
            .family
            .unwrap_or_default()
            .parents
            .into_iter()
            .filter_map(|p| p.active_physical_debit_card)
            .map(DebitCard::from)
            .collect())
    }

    async fn set_spend_subaccount(&self, request: SpendSubaccountRequest) -> GatewayResult<()> {
        let _: IdNode = self
            .mutate(
                "SetSpendSubaccount",
                "setSpendSubaccount",
                queries::SET_SPEND_SUBACCOUNT,
                json!({ "input": {
                    "userId": request.user_id,
                    "selectedSpendSubaccountId": request.subaccount_id,
                }}),
            )
            .await?;
        Ok(())
    }
}
