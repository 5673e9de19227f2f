use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, ValidationError};

/// A named reservation carved out of the real account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pocket {
    pub id: String,
    pub name: String,
    pub balance: i64,
    pub target: Option<i64>,
    pub group_id: Option<String>,
    pub is_credit_card: bool,
    pub linked_bill_id: Option<String>,
}

/// Ledger view derived from a single gateway snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    pub account_balance: i64,
    pub primary_id: String,
    pub primary_name: String,
    pub primary_balance: i64,
    pub pockets: Vec<Pocket>,
    pub pocket_total: i64,
    pub safe_to_spend: i64,
    pub fetched_at: DateTime<Utc>,
    /// Served from cache after a failed refresh.
    pub stale: bool,
}

impl LedgerSnapshot {
    pub fn pocket(&self, id: &str) -> Option<&Pocket> {
        self.pockets.iter().find(|p| p.id == id)
    }
}

/// Input model for creating a pocket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPocket {
    pub name: String,
    pub target: Option<i64>,
    #[serde(default)]
    pub initial_funding: i64,
    pub group_id: Option<String>,
    pub note: Option<String>,
    #[serde(default)]
    pub is_credit_card: bool,
}

impl NewPocket {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name".to_string()).into());
        }
        if self.target.is_some_and(|t| t < 0) {
            return Err(ValidationError::InvalidInput("target amount cannot be negative".to_string()).into());
        }
        if self.initial_funding < 0 {
            return Err(ValidationError::InvalidInput("initial funding cannot be negative".to_string()).into());
        }
        Ok(())
    }
}

/// Local metadata the bank does not store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PocketMeta {
    pub pocket_id: String,
    pub group_id: Option<String>,
    pub is_credit_card: bool,
}
