use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::bills::{BillFrequency, MatchRule};

/// A sub-account of the real checking account as reported by the bank.
/// Exactly one of them is the primary (spendable) account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subaccount {
    pub id: String,
    pub name: String,
    pub balance: i64,
    pub target: Option<i64>,
    pub is_primary: bool,
}

/// Account balance and sub-accounts read together, so derived figures never
/// mix data from two different fetches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSnapshot {
    pub balance: i64,
    pub subaccounts: Vec<Subaccount>,
    pub fetched_at: DateTime<Utc>,
}

impl AccountSnapshot {
    pub fn primary(&self) -> Option<&Subaccount> {
        self.subaccounts.iter().find(|s| s.is_primary)
    }

    pub fn pockets(&self) -> impl Iterator<Item = &Subaccount> {
        self.subaccounts.iter().filter(|s| !s.is_primary)
    }

    pub fn pocket_total(&self) -> i64 {
        self.pockets().map(|p| p.balance).sum()
    }

    /// Account balance minus everything reserved in pockets.
    pub fn safe_to_spend(&self) -> i64 {
        self.balance - self.pocket_total()
    }

    pub fn find(&self, id: &str) -> Option<&Subaccount> {
        self.subaccounts.iter().find(|s| s.id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Posted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub date: NaiveDate,
    /// Signed; debits are negative.
    pub amount: i64,
    pub title: String,
    pub description: Option<String>,
    pub subaccount_id: Option<String>,
    pub status: TransactionStatus,
}

impl Transaction {
    pub fn is_posted_debit(&self) -> bool {
        self.status == TransactionStatus::Posted && self.amount < 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveMoneyRequest {
    pub from_id: String,
    pub to_id: String,
    pub amount: i64,
    pub note: String,
}

/// Creates a pocket and funds it from the primary account in one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPocketRequest {
    pub name: String,
    pub target: Option<i64>,
    pub initial_funding: i64,
    pub note: Option<String>,
}

/// Creates a bill together with its funded reservation pocket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBillRequest {
    pub name: String,
    pub amount: i64,
    pub frequency: BillFrequency,
    pub day_of_month: u32,
    pub anchor_date: NaiveDate,
    pub match_rule: Option<MatchRule>,
    pub variable: bool,
    /// Amount moved from the primary account into the new pocket.
    pub reserve_amount: i64,
}

/// A bill as stored by the bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillRecord {
    pub id: String,
    pub name: String,
    pub amount: i64,
    pub frequency: BillFrequency,
    pub day_of_month: u32,
    pub anchor_date: NaiveDate,
    pub match_rule: Option<MatchRule>,
    pub variable: bool,
    /// `None` once the reservation pocket was deleted out from under the bill.
    pub pocket_id: Option<String>,
    pub paused: bool,
    pub created_at: DateTime<Utc>,
}

/// A debit card and the sub-account its purchases draw from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebitCard {
    pub id: String,
    /// Card holder; spend sources are configured per user, not per card.
    pub user_id: String,
    pub holder: Option<String>,
    pub last_four: Option<String>,
    pub color: Option<String>,
    pub status: String,
    /// `None` when purchases come out of the primary account.
    pub spend_subaccount_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendSubaccountRequest {
    pub user_id: String,
    pub subaccount_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantDetail {
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
}

/// One transaction with the merchant data the list view leaves out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDetail {
    pub id: String,
    pub amount: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: TransactionStatus,
    pub occurred_at: Option<DateTime<Utc>>,
    pub memo: Option<String>,
    pub merchant: Option<MerchantDetail>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(id: &str, balance: i64, is_primary: bool) -> Subaccount {
        Subaccount {
            id: id.to_string(),
            name: id.to_string(),
            balance,
            target: None,
            is_primary,
        }
    }

    #[test]
    fn test_safe_to_spend_is_balance_minus_pockets() {
        let snapshot = AccountSnapshot {
            balance: 100_000,
            subaccounts: vec![sub("checking", 60_000, true), sub("a", 25_000, false), sub("b", 15_000, false)],
            fetched_at: Utc::now(),
        };
        assert_eq!(snapshot.pocket_total(), 40_000);
        assert_eq!(snapshot.safe_to_spend(), 60_000);
        assert_eq!(snapshot.primary().map(|p| p.id.as_str()), Some("checking"));
        assert!(snapshot.find("b").is_some());
        assert!(snapshot.find("zzz").is_none());
    }
}
