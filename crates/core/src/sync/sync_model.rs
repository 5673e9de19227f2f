//! Credit-account sync domain models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::schedule::TimeOfDay;
use crate::errors::{Error, Result, ValidationError};
use crate::gateway::{Transaction, TransactionStatus};

/// Third-party credit-card data provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    SimpleFin,
    LunchFlow,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::SimpleFin => "simplefin",
            ProviderKind::LunchFlow => "lunchflow",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "simplefin" => Ok(ProviderKind::SimpleFin),
            "lunchflow" => Ok(ProviderKind::LunchFlow),
            _ => Err(ValidationError::InvalidInput(format!("unknown provider '{}'", s)).into()),
        }
    }
}

/// Where a credit account is in its setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncState {
    /// No record exists.
    #[default]
    Unconfigured,
    /// A remote account was picked; nothing is funded yet.
    AccountSelected,
    /// The remote balance was fetched for the user to decide on.
    BalanceDecisionPending,
    /// A credit-card pocket exists and scheduled polling runs.
    Active,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Unconfigured => "UNCONFIGURED",
            SyncState::AccountSelected => "ACCOUNT_SELECTED",
            SyncState::BalanceDecisionPending => "BALANCE_DECISION_PENDING",
            SyncState::Active => "ACTIVE",
        }
    }
}

impl FromStr for SyncState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "UNCONFIGURED" => Ok(SyncState::Unconfigured),
            "ACCOUNT_SELECTED" => Ok(SyncState::AccountSelected),
            "BALANCE_DECISION_PENDING" => Ok(SyncState::BalanceDecisionPending),
            "ACTIVE" => Ok(SyncState::Active),
            _ => Err(ValidationError::InvalidState(format!("unknown sync state '{}'", s)).into()),
        }
    }
}

/// How the credit-card pocket starts out on activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceDecision {
    /// Fund the pocket with the current remote balance.
    SyncToBalance,
    /// Start empty; only future charges are tracked.
    StartAtZero,
}

/// UTC times of day at which an account is polled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSchedule {
    /// Sorted, de-duplicated UTC times.
    pub times: Vec<TimeOfDay>,
    /// The zone the user entered the times in; display only.
    pub timezone: String,
}

impl Default for SyncSchedule {
    fn default() -> Self {
        Self {
            times: Vec::new(),
            timezone: "UTC".to_string(),
        }
    }
}

/// Per credit-account sync record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncAccount {
    pub id: String,
    pub provider: ProviderKind,
    /// Account id at the provider
    pub remote_account_id: String,
    pub name: String,
    pub state: SyncState,
    /// Remote balance shown while the user decides how to activate
    pub pending_balance: Option<i64>,
    /// Credit-card pocket, set once Active
    pub pocket_id: Option<String>,
    /// Bill whose pocket receives this account's transactions
    pub linked_bill_id: Option<String>,
    pub schedule: SyncSchedule,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SyncAccount {
    pub fn new(provider: ProviderKind, remote_account_id: String, name: String, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            provider,
            remote_account_id,
            name,
            state: SyncState::AccountSelected,
            pending_balance: None,
            pocket_id: None,
            linked_bill_id: None,
            schedule: SyncSchedule::default(),
            last_synced_at: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == SyncState::Active
    }

    /// Errors unless the account is in one of `allowed`.
    pub fn expect_state(&self, allowed: &[SyncState], operation: &str) -> Result<()> {
        if allowed.contains(&self.state) {
            return Ok(());
        }
        Err(ValidationError::InvalidState(format!(
            "cannot {} while account {} is {}",
            operation,
            self.id,
            self.state.as_str()
        ))
        .into())
    }
}

/// An account as listed by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAccount {
    pub id: String,
    pub name: String,
    pub institution: Option<String>,
    /// Raw provider balance in cents; credit balances are often negative.
    pub balance: Option<i64>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTransaction {
    pub id: String,
    pub date: NaiveDate,
    pub amount: i64,
    pub description: String,
    pub memo: Option<String>,
    pub pending: bool,
}

impl RemoteTransaction {
    /// Converts to a ledger transaction, namespacing the id by provider.
    pub fn into_transaction(self, provider: ProviderKind) -> Transaction {
        Transaction {
            id: format!("{}:{}", provider.as_str(), self.id),
            date: self.date,
            amount: self.amount,
            title: self.description,
            description: self.memo,
            subaccount_id: None,
            status: if self.pending {
                TransactionStatus::Pending
            } else {
                TransactionStatus::Posted
            },
        }
    }
}

/// Result of one sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub sync_account_id: String,
    /// Amount owed at the provider.
    pub remote_balance: i64,
    /// Net change to the credit-card pocket.
    pub pocket_delta: i64,
    /// Transactions applied to the linked bill.
    pub reconciled: usize,
    pub synced_at: DateTime<Utc>,
}

/// Per-account result of a sync-all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRunResult {
    pub sync_account_id: String,
    pub outcome: Option<SyncOutcome>,
    pub error: Option<String>,
}

/// A schedule converted back to the user's timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleView {
    pub timezone: String,
    pub local_times: Vec<String>,
    pub utc_times: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parsing_and_serde() {
        assert_eq!("SimpleFIN".parse::<ProviderKind>().unwrap(), ProviderKind::SimpleFin);
        assert_eq!("lunch-flow".parse::<ProviderKind>().unwrap(), ProviderKind::LunchFlow);
        assert!("plaid".parse::<ProviderKind>().is_err());
        assert_eq!(serde_json::to_string(&ProviderKind::LunchFlow).unwrap(), "\"lunchflow\"");
    }

    #[test]
    fn test_sync_state_strings_round_trip() {
        for state in [
            SyncState::Unconfigured,
            SyncState::AccountSelected,
            SyncState::BalanceDecisionPending,
            SyncState::Active,
        ] {
            assert_eq!(state.as_str().parse::<SyncState>().unwrap(), state);
        }
    }

    #[test]
    fn test_expect_state() {
        let account = SyncAccount::new(ProviderKind::SimpleFin, "r1".into(), "Visa".into(), Utc::now());
        assert!(account.expect_state(&[SyncState::AccountSelected], "fetch").is_ok());
        assert!(account.expect_state(&[SyncState::Active], "sync").is_err());
    }

    #[test]
    fn test_remote_transaction_conversion() {
        let tx = RemoteTransaction {
            id: "abc".into(),
            date: NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            amount: -1_999,
            description: "NETFLIX".into(),
            memo: None,
            pending: true,
        }
        .into_transaction(ProviderKind::LunchFlow);
        assert_eq!(tx.id, "lunchflow:abc");
        assert_eq!(tx.status, TransactionStatus::Pending);
    }
}
