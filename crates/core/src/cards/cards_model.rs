use serde::{Deserialize, Serialize};

use crate::errors::{Result, ValidationError};
use crate::gateway::{AccountSnapshot, DebitCard};

/// A debit card with its spend source resolved against the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub user_id: String,
    pub holder: Option<String>,
    pub last_four: Option<String>,
    pub color: Option<String>,
    pub status: String,
    /// Always a concrete sub-account id; the primary account when the bank
    /// reports no spend pocket.
    pub spend_pocket_id: String,
    pub spend_pocket_name: String,
    pub spends_from_primary: bool,
}

impl Card {
    /// A spend pocket the snapshot no longer knows falls back to the primary
    /// account, which is where the bank draws from once a pocket is gone.
    pub fn resolve(card: &DebitCard, snapshot: &AccountSnapshot) -> Self {
        let source = card
            .spend_subaccount_id
            .as_deref()
            .and_then(|id| snapshot.find(id))
            .or_else(|| snapshot.primary());
        let (spend_pocket_id, spend_pocket_name, spends_from_primary) = match source {
            Some(s) => (s.id.clone(), s.name.clone(), s.is_primary),
            None => (String::new(), String::new(), true),
        };
        Self {
            id: card.id.clone(),
            user_id: card.user_id.clone(),
            holder: card.holder.clone(),
            last_four: card.last_four.clone(),
            color: card.color.clone(),
            status: card.status.clone(),
            spend_pocket_id,
            spend_pocket_name,
            spends_from_primary,
        }
    }
}

/// Points every card of one holder at a pocket. `pocket_id` may be the
/// alias `checking`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendPocketChange {
    pub user_id: String,
    pub pocket_id: String,
}

impl SpendPocketChange {
    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            return Err(ValidationError::MissingField("userId".to_string()).into());
        }
        if self.pocket_id.trim().is_empty() {
            return Err(ValidationError::MissingField("pocketId".to_string()).into());
        }
        Ok(())
    }
}
