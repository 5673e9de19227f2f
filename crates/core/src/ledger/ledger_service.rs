use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use log::{debug, error, info, warn};

use super::ledger_model::{LedgerSnapshot, NewPocket, Pocket, PocketMeta};
use super::ledger_traits::{LedgerServiceTrait, PocketMetaRepositoryTrait};
use super::locks::{LockRegistry, LockSet};
use crate::cache::{CachedGateway, Fetched};
use crate::changes::{Mutation, Resource};
use crate::constants::PRIMARY_LOCK_KEY;
use crate::errors::{Error, Result, ValidationError};
use crate::events::{DomainEvent, DomainEventSink};
use crate::gateway::{AccountSnapshot, MoveMoneyRequest, NewPocketRequest};

/// Owns the pocket ledger and the safe-to-spend invariant.
///
/// Every money-moving path in the engine (pockets, bills, transfers, credit
/// sync) goes through this service's locks and finishes with
/// [`finish_mutation`](Self::finish_mutation), which re-verifies
/// `account balance == pockets + safe-to-spend` against a fresh snapshot.
pub struct LedgerService {
    gateway: Arc<CachedGateway>,
    meta_repository: Arc<dyn PocketMetaRepositoryTrait>,
    event_sink: Arc<dyn DomainEventSink>,
    locks: LockRegistry,
    halted: RwLock<Option<String>>,
}

impl LedgerService {
    pub fn new(
        gateway: Arc<CachedGateway>,
        meta_repository: Arc<dyn PocketMetaRepositoryTrait>,
        event_sink: Arc<dyn DomainEventSink>,
    ) -> Self {
        Self {
            gateway,
            meta_repository,
            event_sink,
            locks: LockRegistry::new(),
            halted: RwLock::new(None),
        }
    }

    pub fn gateway(&self) -> &Arc<CachedGateway> {
        &self.gateway
    }

    pub fn event_sink(&self) -> &Arc<dyn DomainEventSink> {
        &self.event_sink
    }

    /// Locks the given pocket ids, plus the primary account when
    /// `through_primary` is set.
    pub async fn lock<I, S>(&self, ids: I, through_primary: bool) -> LockSet
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut keys: Vec<String> = ids.into_iter().map(Into::into).collect();
        if through_primary {
            keys.push(PRIMARY_LOCK_KEY.to_string());
        }
        self.locks.acquire(keys).await
    }

    pub fn forget_lock(&self, id: &str) {
        self.locks.forget(id);
    }

    /// Fails with `Inconsistency` while the ledger is halted.
    pub fn ensure_writable(&self) -> Result<()> {
        match self.halt_reason() {
            Some(reason) => Err(Error::Inconsistency(format!(
                "mutations are halted until the ledger is reconciled: {}",
                reason
            ))),
            None => Ok(()),
        }
    }

    /// Snapshot fetched from the bank right now, bypassing the cache.
    pub async fn fresh_snapshot(&self) -> Result<AccountSnapshot> {
        Ok(self.gateway.snapshot(true).await?.value)
    }

    /// Moves money with one gateway call. The caller holds the locks.
    pub async fn move_funds_unlocked(&self, from_id: &str, to_id: &str, amount: i64, note: &str) -> Result<()> {
        debug!("Moving {} from {} to {}", amount, from_id, to_id);
        self.gateway
            .move_money(MoveMoneyRequest {
                from_id: from_id.to_string(),
                to_id: to_id.to_string(),
                amount,
                note: note.to_string(),
            })
            .await
    }

    /// Returns the pocket's balance to the primary account and deletes it.
    /// The caller holds the primary lock and the pocket's lock.
    pub async fn remove_pocket_unlocked(&self, snapshot: &AccountSnapshot, pocket_id: &str) -> Result<i64> {
        let pocket = snapshot
            .find(pocket_id)
            .ok_or_else(|| Error::NotFound(format!("Pocket {} not found", pocket_id)))?;
        if pocket.is_primary {
            return Err(ValidationError::InvalidInput("the primary account cannot be deleted".to_string()).into());
        }
        let primary = snapshot
            .primary()
            .ok_or_else(|| Error::Unexpected("bank reported no primary account".to_string()))?;

        let returned = pocket.balance.max(0);
        if returned > 0 {
            self.move_funds_unlocked(&pocket.id, &primary.id, returned, &format!("Close {}", pocket.name))
                .await?;
        }
        self.gateway.delete_pocket(&pocket.id).await?;
        if let Err(e) = self.meta_repository.delete(&pocket.id).await {
            warn!("Failed to delete metadata for pocket {}: {}", pocket.id, e);
        }
        info!("Deleted pocket {} ({}), returned {}", pocket.name, pocket.id, returned);
        Ok(returned)
    }

    /// Verifies the invariant after a committed mutation and emits `event`.
    pub async fn finish_mutation<T>(&self, mutation: Mutation<T>, event: DomainEvent) -> Result<Mutation<T>> {
        self.gateway.invalidate(&mutation.changed);
        self.event_sink.emit(event);
        self.verify_invariant().await?;
        Ok(mutation)
    }

    fn check_invariant(snapshot: &AccountSnapshot) -> std::result::Result<(), String> {
        let primary = snapshot
            .primary()
            .ok_or_else(|| "bank reported no primary account".to_string())?;
        if let Some(negative) = snapshot.pockets().find(|p| p.balance < 0) {
            return Err(format!("pocket {} has negative balance {}", negative.id, negative.balance));
        }
        let safe_to_spend = snapshot.safe_to_spend();
        if primary.balance != safe_to_spend {
            return Err(format!(
                "account balance {} != pockets {} + safe-to-spend {}",
                snapshot.balance,
                snapshot.pocket_total(),
                primary.balance
            ));
        }
        Ok(())
    }

    fn halt(&self, reason: String) {
        error!("Halting ledger mutations: {}", reason);
        if let Ok(mut halted) = self.halted.write() {
            *halted = Some(reason.clone());
        }
        self.event_sink.emit(DomainEvent::ledger_halted(reason));
    }

    async fn build_snapshot(&self, fetched: Fetched<AccountSnapshot>, force: bool) -> Result<LedgerSnapshot> {
        let snapshot = fetched.value;
        let bills = self.gateway.bills(force).await?;
        let metas: HashMap<String, PocketMeta> = self
            .meta_repository
            .list()?
            .into_iter()
            .map(|m| (m.pocket_id.clone(), m))
            .collect();
        let bill_by_pocket: HashMap<&str, &str> = bills
            .iter()
            .filter_map(|b| b.pocket_id.as_deref().map(|p| (p, b.id.as_str())))
            .collect();

        let primary = snapshot
            .primary()
            .ok_or_else(|| Error::Unexpected("bank reported no primary account".to_string()))?;
        let pockets: Vec<Pocket> = snapshot
            .pockets()
            .map(|s| {
                let meta = metas.get(&s.id);
                Pocket {
                    id: s.id.clone(),
                    name: s.name.clone(),
                    balance: s.balance,
                    target: s.target,
                    group_id: meta.and_then(|m| m.group_id.clone()),
                    is_credit_card: meta.is_some_and(|m| m.is_credit_card),
                    linked_bill_id: bill_by_pocket.get(s.id.as_str()).map(|b| b.to_string()),
                }
            })
            .collect();

        Ok(LedgerSnapshot {
            account_balance: snapshot.balance,
            primary_id: primary.id.clone(),
            primary_name: primary.name.clone(),
            primary_balance: primary.balance,
            pocket_total: snapshot.pocket_total(),
            safe_to_spend: snapshot.safe_to_spend(),
            pockets,
            fetched_at: fetched.fetched_at,
            stale: fetched.stale,
        })
    }

    async fn pocket_by_id(&self, pocket_id: &str) -> Result<Pocket> {
        self.get_snapshot(false)
            .await?
            .pocket(pocket_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Pocket {} not found", pocket_id)))
    }
}

#[async_trait]
impl LedgerServiceTrait for LedgerService {
    async fn get_snapshot(&self, force: bool) -> Result<LedgerSnapshot> {
        let fetched = self.gateway.snapshot_or_stale(force).await?;
        self.build_snapshot(fetched, force).await
    }

    async fn get_pockets(&self, force: bool) -> Result<Vec<Pocket>> {
        Ok(self.get_snapshot(force).await?.pockets)
    }

    async fn get_safe_to_spend(&self, force: bool) -> Result<i64> {
        Ok(self.gateway.snapshot(force).await?.value.safe_to_spend())
    }

    async fn create_pocket(&self, new_pocket: NewPocket) -> Result<Mutation<Pocket>> {
        new_pocket.validate()?;
        self.ensure_writable()?;
        let _locks = self.lock(Vec::<String>::new(), true).await;

        let snapshot = self.fresh_snapshot().await?;
        let available = snapshot.safe_to_spend();
        if new_pocket.initial_funding > available {
            return Err(Error::InsufficientFunds {
                requested: new_pocket.initial_funding,
                available,
            });
        }

        let name = new_pocket.name.trim().to_string();
        let created = self
            .gateway
            .create_pocket(NewPocketRequest {
                name: name.clone(),
                target: new_pocket.target,
                initial_funding: new_pocket.initial_funding,
                note: new_pocket.note.clone(),
            })
            .await?;
        info!("Created pocket {} ({}) with {}", created.name, created.id, created.balance);

        if new_pocket.group_id.is_some() || new_pocket.is_credit_card {
            let meta = PocketMeta {
                pocket_id: created.id.clone(),
                group_id: new_pocket.group_id.clone(),
                is_credit_card: new_pocket.is_credit_card,
            };
            if let Err(e) = self.meta_repository.upsert(meta).await {
                warn!("Failed to store metadata for pocket {}: {}", created.id, e);
            }
        }

        let pocket = Pocket {
            id: created.id.clone(),
            name: created.name,
            balance: created.balance,
            target: created.target,
            group_id: new_pocket.group_id,
            is_credit_card: new_pocket.is_credit_card,
            linked_bill_id: None,
        };
        let mutation = Mutation::new(pocket, Resource::balance_bearing());
        let event = DomainEvent::ledger_changed(vec![created.id], mutation.changed.iter().copied());
        self.finish_mutation(mutation, event).await
    }

    async fn delete_pocket(&self, pocket_id: &str) -> Result<Mutation<i64>> {
        self.ensure_writable()?;
        let returned = {
            let _locks = self.lock([pocket_id], true).await;
            let snapshot = self.fresh_snapshot().await?;
            self.remove_pocket_unlocked(&snapshot, pocket_id).await?
        };
        self.forget_lock(pocket_id);

        let mut changed = Resource::balance_bearing();
        changed.insert(Resource::Bills);
        let mutation = Mutation::new(returned, changed);
        let event = DomainEvent::ledger_changed(vec![pocket_id.to_string()], mutation.changed.iter().copied());
        self.finish_mutation(mutation, event).await
    }

    async fn update_pocket_group(&self, pocket_id: &str, group_id: Option<String>) -> Result<Mutation<Pocket>> {
        let _locks = self.lock([pocket_id], false).await;
        let mut pocket = self.pocket_by_id(pocket_id).await?;
        let group_id = group_id.filter(|g| !g.trim().is_empty());

        self.meta_repository
            .upsert(PocketMeta {
                pocket_id: pocket.id.clone(),
                group_id: group_id.clone(),
                is_credit_card: pocket.is_credit_card,
            })
            .await?;
        pocket.group_id = group_id;

        let changed: BTreeSet<Resource> = [Resource::Subaccounts].into_iter().collect();
        self.event_sink
            .emit(DomainEvent::ledger_changed(vec![pocket.id.clone()], changed.iter().copied()));
        Ok(Mutation::new(pocket, changed))
    }

    async fn verify_invariant(&self) -> Result<LedgerSnapshot> {
        let fetched = self.gateway.snapshot(true).await?;
        if let Err(reason) = Self::check_invariant(&fetched.value) {
            self.halt(reason.clone());
            return Err(Error::Inconsistency(reason));
        }
        self.build_snapshot(fetched, false).await
    }

    async fn reconcile_halt(&self) -> Result<LedgerSnapshot> {
        let snapshot = self.verify_invariant().await?;
        let was_halted = match self.halted.write() {
            Ok(mut halted) => halted.take().is_some(),
            Err(_) => false,
        };
        if was_halted {
            info!("Ledger reconciled; mutations resumed");
            self.event_sink.emit(DomainEvent::LedgerResumed);
        }
        Ok(snapshot)
    }

    fn halt_reason(&self) -> Option<String> {
        self.halted.read().ok().and_then(|h| h.clone())
    }
}
