//! Response shapes of the bank GraphQL API and their conversion into
//! gateway models. Amounts on the wire are integer cents.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use pocketbook_core::bills::{BillFrequency, MatchRule};
use pocketbook_core::errors::GatewayError;
use pocketbook_core::gateway::{
    BillRecord, DebitCard, GatewayResult, MerchantDetail, Subaccount, Transaction, TransactionDetail, TransactionStatus,
};

/// Subaccount note marking the reservation pocket of a bill.
pub const BILL_POCKET_NOTE_PREFIX: &str = "pb-bill:";

pub fn bill_pocket_note(bill_name: &str) -> String {
    format!("{}{}", BILL_POCKET_NOTE_PREFIX, bill_name.trim().to_lowercase())
}

#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

impl<T> GraphQlResponse<T> {
    /// The payload, or the first reported error.
    pub fn into_data(self, service: &str) -> GatewayResult<T> {
        if let Some(first) = self.errors.into_iter().next() {
            return Err(GatewayError::remote(service, first.message));
        }
        self.data
            .ok_or_else(|| GatewayError::decode(service, "response carried neither data nor errors"))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUserData {
    pub current_user: CurrentUser,
}

#[derive(Debug, Deserialize)]
pub struct CurrentUser {
    #[serde(default)]
    pub accounts: Vec<AccountNode>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountNode {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub subaccounts: Vec<SubaccountNode>,
    #[serde(default)]
    pub bill_reserve: Option<BillReserveNode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubaccountNode {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub overall_balance: i64,
    #[serde(default)]
    pub goal: Option<i64>,
    #[serde(default)]
    pub is_primary: Option<bool>,
    #[serde(default)]
    pub note: Option<String>,
}

impl SubaccountNode {
    /// `isPrimary` when the API reports it, otherwise a name match.
    pub fn into_subaccount(self, primary_name: &str) -> Subaccount {
        let name = self.name.unwrap_or_default();
        let is_primary = self.is_primary.unwrap_or_else(|| name == primary_name);
        Subaccount {
            id: self.id,
            name,
            balance: self.overall_balance,
            target: self.goal,
            is_primary,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillReserveNode {
    #[serde(default)]
    pub bills: Vec<BillNode>,
    #[serde(default)]
    pub settings: Option<BillReserveSettings>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BillReserveSettings {
    pub funding: Option<FundingSettings>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FundingSettings {
    pub subaccount: Option<FundingSubaccount>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingSubaccount {
    pub display_name: Option<String>,
}

impl BillReserveNode {
    pub fn funding_name(&self) -> Option<String> {
        self.settings
            .as_ref()?
            .funding
            .as_ref()?
            .subaccount
            .as_ref()?
            .display_name
            .clone()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignmentRule {
    #[serde(rename = "match")]
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_amount: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<i64>,
}

impl From<MatchRule> for ReassignmentRule {
    fn from(rule: MatchRule) -> Self {
        Self {
            pattern: rule.pattern,
            min_amount: rule.min_amount,
            max_amount: rule.max_amount,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillNode {
    pub id: String,
    pub name: String,
    pub amount: i64,
    pub anchor_date: NaiveDate,
    #[serde(default)]
    pub auto_adjust_amount: bool,
    pub day_of_month: Option<u32>,
    pub frequency: String,
    #[serde(default = "default_interval")]
    pub frequency_interval: u32,
    #[serde(default)]
    pub paused: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub reassignment_rule: Option<ReassignmentRule>,
}

fn default_interval() -> u32 {
    1
}

/// Bank cadence for a frequency, e.g. quarterly is every 3 months.
pub fn to_cadence(frequency: BillFrequency) -> (&'static str, u32) {
    match frequency {
        BillFrequency::Weekly => ("WEEKLY", 1),
        BillFrequency::Biweekly => ("WEEKLY", 2),
        BillFrequency::Monthly => ("MONTHLY", 1),
        BillFrequency::Quarterly => ("MONTHLY", 3),
        BillFrequency::SemiAnnually => ("MONTHLY", 6),
        BillFrequency::Annually => ("YEARLY", 1),
    }
}

pub fn from_cadence(unit: &str, interval: u32) -> Option<BillFrequency> {
    match (unit.to_ascii_uppercase().as_str(), interval) {
        ("WEEKLY", 1) => Some(BillFrequency::Weekly),
        ("WEEKLY", 2) => Some(BillFrequency::Biweekly),
        ("MONTHLY", 1) => Some(BillFrequency::Monthly),
        ("MONTHLY", 3) => Some(BillFrequency::Quarterly),
        ("MONTHLY", 6) => Some(BillFrequency::SemiAnnually),
        ("YEARLY", 1) | ("ANNUALLY", 1) => Some(BillFrequency::Annually),
        _ => None,
    }
}

impl BillNode {
    /// `pocket_id` is resolved by the caller from the subaccount notes.
    pub fn into_record(self, service: &str, pocket_id: Option<String>) -> GatewayResult<BillRecord> {
        let frequency = from_cadence(&self.frequency, self.frequency_interval).ok_or_else(|| {
            GatewayError::decode(
                service,
                format!(
                    "bill {} has unsupported cadence {} x{}",
                    self.id, self.frequency, self.frequency_interval
                ),
            )
        })?;
        Ok(BillRecord {
            id: self.id,
            name: self.name,
            amount: self.amount,
            frequency,
            day_of_month: self.day_of_month.unwrap_or_else(|| chrono::Datelike::day(&self.anchor_date)),
            anchor_date: self.anchor_date,
            match_rule: self.reassignment_rule.map(|r| MatchRule {
                pattern: r.pattern,
                min_amount: r.min_amount,
                max_amount: r.max_amount,
            }),
            variable: self.auto_adjust_amount,
            pocket_id,
            paused: self.paused,
            created_at: self.created_at.unwrap_or_else(Utc::now),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ActivityData {
    pub account: Option<ActivityAccount>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityAccount {
    pub cash_transactions: Connection<TransactionNode>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Connection<T> {
    #[serde(default)]
    pub edges: Vec<Edge<T>>,
}

#[derive(Debug, Deserialize)]
pub struct Edge<T> {
    pub node: T,
}

#[derive(Debug, Deserialize)]
pub struct IdNode {
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionNode {
    pub id: String,
    pub amount: i64,
    #[serde(default)]
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub subaccount: Option<IdNode>,
}

impl From<TransactionNode> for Transaction {
    fn from(node: TransactionNode) -> Self {
        let status = parse_status(node.status.as_deref());
        Transaction {
            id: node.id,
            date: node.occurred_at.date_naive(),
            amount: node.amount,
            title: node.title.unwrap_or_default(),
            description: node.description,
            subaccount_id: node.subaccount.map(|s| s.id),
            status,
        }
    }
}

fn parse_status(status: Option<&str>) -> TransactionStatus {
    match status {
        Some(s) if s.eq_ignore_ascii_case("PENDING") => TransactionStatus::Pending,
        _ => TransactionStatus::Posted,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardsData {
    pub current_user: CardsUser,
}

#[derive(Debug, Deserialize)]
pub struct CardsUser {
    pub family: Option<Family>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Family {
    #[serde(default)]
    pub parents: Vec<FamilyMember>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyMember {
    pub active_physical_debit_card: Option<DebitCardNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebitCardNode {
    pub id: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub last_four: Option<String>,
    pub user: CardUser,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardUser {
    pub id: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub user_spend_config: Option<SpendConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendConfig {
    pub selected_spend_subaccount: Option<IdNode>,
}

impl From<DebitCardNode> for DebitCard {
    fn from(node: DebitCardNode) -> Self {
        let spend_subaccount_id = node
            .user
            .user_spend_config
            .and_then(|c| c.selected_spend_subaccount)
            .map(|s| s.id);
        DebitCard {
            id: node.id,
            user_id: node.user.id,
            holder: node.user.first_name,
            last_four: node.last_four,
            color: node.color,
            status: node.status.unwrap_or_default(),
            spend_subaccount_id,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityDetailData {
    pub cash_transaction: Option<TransactionDetailNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDetailNode {
    /// Absent when the id names some other kind of node.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub external_memo: Option<String>,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub latest_debit_card_transaction_detail: Option<MerchantNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantNode {
    pub merchant_name: Option<String>,
    pub merchant_address1: Option<String>,
    pub merchant_city: Option<String>,
    pub merchant_state: Option<String>,
    pub merchant_zip: Option<String>,
}

impl TransactionDetailNode {
    pub fn into_detail(self) -> Option<TransactionDetail> {
        let status = parse_status(self.status.as_deref());
        Some(TransactionDetail {
            id: self.id?,
            amount: self.amount,
            title: self.title.unwrap_or_default(),
            description: self.description,
            status,
            occurred_at: self.occurred_at,
            memo: self.external_memo,
            merchant: self.latest_debit_card_transaction_detail.map(|m| MerchantDetail {
                name: m.merchant_name,
                address: m.merchant_address1,
                city: m.merchant_city,
                state: m.merchant_state,
                zip: m.merchant_zip,
            }),
        })
    }
}

/// `{ "<field>": { "result": T } }` as returned by every mutation.
#[derive(Debug, Deserialize)]
pub struct MutationResult<T> {
    pub result: Option<T>,
}
