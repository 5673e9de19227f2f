use std::sync::Arc;

use async_trait::async_trait;
use log::info;

use super::transfers_model::{TransferReceipt, TransferRequest};
use super::transfers_traits::TransferServiceTrait;
use crate::changes::{Mutation, Resource};
use crate::constants::{DEFAULT_TRANSFER_NOTE, PRIMARY_ACCOUNT_ALIAS};
use crate::errors::{Error, Result, ValidationError};
use crate::events::DomainEvent;
use crate::gateway::AccountSnapshot;
use crate::ledger::LedgerService;

pub struct TransferService {
    ledger: Arc<LedgerService>,
}

/// An id resolved against a snapshot.
struct Endpoint {
    id: String,
    is_primary: bool,
    available: i64,
}

impl TransferService {
    pub fn new(ledger: Arc<LedgerService>) -> Self {
        Self { ledger }
    }

    fn resolve(snapshot: &AccountSnapshot, id: &str) -> Result<Endpoint> {
        let account = if id.trim().eq_ignore_ascii_case(PRIMARY_ACCOUNT_ALIAS) {
            snapshot.primary()
        } else {
            snapshot.find(id.trim())
        };
        let account = account.ok_or_else(|| Error::NotFound(format!("Account {} not found", id)))?;
        let available = if account.is_primary {
            snapshot.safe_to_spend()
        } else {
            account.balance
        };
        Ok(Endpoint {
            id: account.id.clone(),
            is_primary: account.is_primary,
            available,
        })
    }

    /// Checks the preconditions in order; the first failure wins.
    fn validate(snapshot: &AccountSnapshot, request: &TransferRequest) -> Result<(Endpoint, Endpoint)> {
        let from = Self::resolve(snapshot, &request.from_id)?;
        let to = Self::resolve(snapshot, &request.to_id)?;
        if from.id == to.id {
            return Err(ValidationError::SameAccount.into());
        }
        if request.amount <= 0 {
            return Err(ValidationError::NonPositiveAmount(request.amount).into());
        }
        if request.amount > from.available {
            return Err(Error::InsufficientFunds {
                requested: request.amount,
                available: from.available,
            });
        }
        Ok((from, to))
    }
}

#[async_trait]
impl TransferServiceTrait for TransferService {
    async fn transfer(&self, request: TransferRequest) -> Result<Mutation<TransferReceipt>> {
        self.ledger.ensure_writable()?;

        // Resolve against the cached view to learn which locks to take, then
        // validate again under the locks against a fresh one.
        let cached = self.ledger.gateway().snapshot(false).await?.value;
        let (from, to) = Self::validate(&cached, &request)?;
        let through_primary = from.is_primary || to.is_primary;
        let pocket_keys: Vec<String> = [&from, &to]
            .into_iter()
            .filter(|e| !e.is_primary)
            .map(|e| e.id.clone())
            .collect();
        let _locks = self.ledger.lock(pocket_keys, through_primary).await;

        let snapshot = self.ledger.fresh_snapshot().await?;
        let (from, to) = Self::validate(&snapshot, &request)?;

        let note = request
            .note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_TRANSFER_NOTE)
            .to_string();
        self.ledger
            .move_funds_unlocked(&from.id, &to.id, request.amount, &note)
            .await?;
        info!("Transferred {} from {} to {}", request.amount, from.id, to.id);

        let receipt = TransferReceipt {
            from_id: from.id.clone(),
            to_id: to.id.clone(),
            amount: request.amount,
            note,
        };
        let event = DomainEvent::transfer_completed(from.id, to.id, request.amount);
        self.ledger
            .finish_mutation(Mutation::new(receipt, Resource::balance_bearing()), event)
            .await
    }
}
