use std::sync::Arc;

use async_trait::async_trait;
use log::info;

use super::cards_model::{Card, SpendPocketChange};
use super::cards_traits::CardServiceTrait;
use crate::changes::{Mutation, Resource};
use crate::constants::PRIMARY_ACCOUNT_ALIAS;
use crate::errors::{Error, Result};
use crate::events::DomainEvent;
use crate::gateway::{AccountSnapshot, SpendSubaccountRequest, Subaccount};
use crate::ledger::LedgerService;

pub struct CardService {
    ledger: Arc<LedgerService>,
}

impl CardService {
    pub fn new(ledger: Arc<LedgerService>) -> Self {
        Self { ledger }
    }

    fn resolve<'a>(snapshot: &'a AccountSnapshot, id: &str) -> Result<&'a Subaccount> {
        let found = if id.trim().eq_ignore_ascii_case(PRIMARY_ACCOUNT_ALIAS) {
            snapshot.primary()
        } else {
            snapshot.find(id.trim())
        };
        found.ok_or_else(|| Error::NotFound(format!("Pocket {} not found", id)))
    }

    async fn cards_for(&self, force: bool, user_id: Option<&str>) -> Result<Vec<Card>> {
        let cards = self.ledger.gateway().debit_cards(force).await?;
        let snapshot = self.ledger.gateway().snapshot(force).await?.value;
        Ok(cards
            .iter()
            .filter(|c| user_id.map_or(true, |u| c.user_id == u))
            .map(|c| Card::resolve(c, &snapshot))
            .collect())
    }
}

#[async_trait]
impl CardServiceTrait for CardService {
    async fn list_cards(&self, force: bool) -> Result<Vec<Card>> {
        self.cards_for(force, None).await
    }

    async fn set_spend_pocket(&self, change: SpendPocketChange) -> Result<Mutation<Vec<Card>>> {
        change.validate()?;
        self.ledger.ensure_writable()?;

        let cached = self.ledger.gateway().snapshot(false).await?.value;
        let target = Self::resolve(&cached, &change.pocket_id)?;
        // Hold the pocket so it cannot be deleted between the check and the
        // bank call.
        let _locks = if target.is_primary {
            self.ledger.lock(Vec::<String>::new(), true).await
        } else {
            self.ledger.lock([target.id.clone()], false).await
        };

        let snapshot = self.ledger.fresh_snapshot().await?;
        let target = Self::resolve(&snapshot, &change.pocket_id)?.clone();
        let user_id = change.user_id.trim().to_string();
        let cards = self.ledger.gateway().debit_cards(true).await?;
        if !cards.iter().any(|c| c.user_id == user_id) {
            return Err(Error::NotFound(format!("No cards for user {}", user_id)));
        }

        self.ledger
            .gateway()
            .set_spend_subaccount(SpendSubaccountRequest {
                user_id: user_id.clone(),
                subaccount_id: target.id.clone(),
            })
            .await?;
        info!("Cards of {} now spend from {}", user_id, target.id);

        let event = DomainEvent::ledger_changed(vec![target.id.clone()], [Resource::Cards, Resource::Subaccounts]);
        let mutation = Mutation::new((), [Resource::Cards, Resource::Subaccounts]);
        let mutation = self.ledger.finish_mutation(mutation, event).await?;
        let updated = self.cards_for(false, Some(&user_id)).await?;
        Ok(mutation.map(|_| updated))
    }
}
