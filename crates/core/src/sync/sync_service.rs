use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::sync::Semaphore;

use super::providers::{CreditProvider, ProviderRegistry};
use super::schedule::{ScheduleTimezone, TimeOfDay};
use super::scheduler::SyncScheduler;
use super::sync_model::{
    BalanceDecision, ProviderKind, RemoteAccount, ScheduleView, SyncAccount, SyncOutcome, SyncRunResult,
    SyncSchedule, SyncState,
};
use super::sync_traits::{SyncAccountRepositoryTrait, SyncRunner, SyncServiceTrait};
use crate::bills::BillServiceTrait;
use crate::changes::{Mutation, Resource};
use crate::constants::{DEFAULT_GATEWAY_TIMEOUT_SECS, DEFAULT_MAX_CONCURRENT_SYNCS};
use crate::errors::{Error, GatewayError, Result, ValidationError};
use crate::events::DomainEvent;
use crate::gateway::GatewayResult;
use crate::ledger::{LedgerService, LedgerServiceTrait, LockRegistry, NewPocket};
use crate::utils::clock::Clock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Bound on each provider call.
    pub provider_timeout: Duration,
    /// Sync runs allowed at once, manual and scheduled together.
    pub max_concurrent_syncs: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(DEFAULT_GATEWAY_TIMEOUT_SECS),
            max_concurrent_syncs: DEFAULT_MAX_CONCURRENT_SYNCS,
        }
    }
}

/// Drives each credit account through
/// `AccountSelected -> BalanceDecisionPending -> Active` and runs syncs.
pub struct SyncService {
    ledger: Arc<LedgerService>,
    bills: Arc<dyn BillServiceTrait>,
    repository: Arc<dyn SyncAccountRepositoryTrait>,
    providers: ProviderRegistry,
    scheduler: Arc<SyncScheduler>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
    permits: Arc<Semaphore>,
    run_locks: LockRegistry,
}

impl SyncService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ledger: Arc<LedgerService>,
        bills: Arc<dyn BillServiceTrait>,
        repository: Arc<dyn SyncAccountRepositoryTrait>,
        providers: ProviderRegistry,
        scheduler: Arc<SyncScheduler>,
        clock: Arc<dyn Clock>,
        config: SyncConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_syncs.max(1)));
        Self {
            ledger,
            bills,
            repository,
            providers,
            scheduler,
            clock,
            config,
            permits,
            run_locks: LockRegistry::new(),
        }
    }

    /// Providers with credentials registered at startup.
    pub fn provider_kinds(&self) -> Vec<ProviderKind> {
        self.providers.kinds()
    }

    /// Arms timers for every Active account. Called once at startup.
    pub fn arm_active(&self) -> Result<usize> {
        let mut armed = 0;
        for account in self.repository.list()?.into_iter().filter(|a| a.is_active()) {
            self.scheduler.arm(&account.id, account.schedule.times.clone());
            armed += 1;
        }
        Ok(armed)
    }

    fn load(&self, id: &str) -> Result<SyncAccount> {
        self.repository
            .get(id)?
            .ok_or_else(|| Error::NotFound(format!("Sync account {} not found", id)))
    }

    async fn save(&self, mut account: SyncAccount) -> Result<SyncAccount> {
        account.updated_at = self.clock.now();
        self.repository.update(account).await
    }

    async fn bounded<T>(&self, provider: ProviderKind, fut: impl Future<Output = GatewayResult<T>>) -> Result<T> {
        match tokio::time::timeout(self.config.provider_timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(GatewayError::timeout(provider.as_str()).into()),
        }
    }

    /// Amount owed at the provider. Credit balances come back negative from
    /// some providers and positive from others; both mean money owed.
    async fn remote_balance(&self, provider: &Arc<dyn CreditProvider>, account: &SyncAccount) -> Result<i64> {
        let raw = self
            .bounded(provider.kind(), provider.get_balance(&account.remote_account_id))
            .await?;
        Ok(raw.abs())
    }

    /// Adjusts the pocket to `target`. The caller holds no ledger locks.
    async fn sync_balance_inner(&self, account: &SyncAccount, target: i64) -> Result<Mutation<i64>> {
        if target < 0 {
            return Err(ValidationError::InvalidInput("target balance cannot be negative".to_string()).into());
        }
        let pocket_id = account
            .pocket_id
            .clone()
            .ok_or_else(|| ValidationError::InvalidState(format!("account {} has no pocket", account.id)))?;
        self.ledger.ensure_writable()?;
        let _locks = self.ledger.lock([pocket_id.as_str()], true).await;

        let snapshot = self.ledger.fresh_snapshot().await?;
        let pocket = snapshot
            .find(&pocket_id)
            .ok_or_else(|| Error::NotFound(format!("Pocket {} not found", pocket_id)))?;
        let primary_id = snapshot
            .primary()
            .map(|p| p.id.clone())
            .ok_or_else(|| Error::Unexpected("bank reported no primary account".to_string()))?;

        let delta = target - pocket.balance;
        if delta == 0 {
            return Ok(Mutation::unchanged(0));
        }
        let note = format!("{} sync", account.name);
        if delta > 0 {
            let available = snapshot.safe_to_spend();
            if delta > available {
                return Err(Error::InsufficientFunds {
                    requested: delta,
                    available,
                });
            }
            self.ledger
                .move_funds_unlocked(&primary_id, &pocket_id, delta, &note)
                .await?;
        } else {
            self.ledger
                .move_funds_unlocked(&pocket_id, &primary_id, -delta, &note)
                .await?;
        }
        info!("Synced pocket {} to {} (delta {})", pocket_id, target, delta);

        let event = DomainEvent::ledger_changed(vec![pocket_id], Resource::balance_bearing());
        self.ledger
            .finish_mutation(Mutation::new(delta, Resource::balance_bearing()), event)
            .await
    }

    async fn run_sync(&self, id: &str) -> Result<SyncOutcome> {
        let _run = self.run_locks.acquire([id]).await;
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| Error::Unexpected(format!("sync permits closed: {}", e)))?;

        let account = self.load(id)?;
        account.expect_state(&[SyncState::Active], "sync")?;
        let result = self.sync_account(&account).await;

        let mut account = account;
        match &result {
            Ok(outcome) => {
                account.last_synced_at = Some(outcome.synced_at);
                account.last_error = None;
                account.pending_balance = Some(outcome.remote_balance);
                self.ledger.event_sink().emit(DomainEvent::sync_completed(
                    &account.id,
                    outcome.pocket_delta,
                    outcome.reconciled,
                ));
            }
            Err(e) => {
                account.last_error = Some(e.to_string());
                self.ledger
                    .event_sink()
                    .emit(DomainEvent::sync_failed(&account.id, e.to_string()));
            }
        }
        if let Err(e) = self.save(account).await {
            warn!("Failed to record sync result for {}: {}", id, e);
        }
        result
    }

    async fn sync_account(&self, account: &SyncAccount) -> Result<SyncOutcome> {
        let provider = self.providers.get(account.provider)?;
        let remote_balance = self.remote_balance(&provider, account).await?;
        debug!("Sync {}: remote balance {}", account.id, remote_balance);

        let (pocket_delta, reconciled) = match account.linked_bill_id.as_deref() {
            Some(bill_id) => {
                let since = Some(account.created_at.date_naive());
                let transactions: Vec<_> = self
                    .bounded(
                        provider.kind(),
                        provider.list_transactions(&account.remote_account_id, since),
                    )
                    .await?
                    .into_iter()
                    .map(|t| t.into_transaction(account.provider))
                    .collect();
                let report = self
                    .bills
                    .reconcile_transactions(&transactions, Some(bill_id))
                    .await?
                    .value;
                (-report.total_released, report.applied.len())
            }
            None => (self.sync_balance_inner(account, remote_balance).await?.value, 0),
        };

        Ok(SyncOutcome {
            sync_account_id: account.id.clone(),
            remote_balance,
            pocket_delta,
            reconciled,
            synced_at: self.clock.now(),
        })
    }
}

#[async_trait]
impl SyncServiceTrait for SyncService {
    async fn list_remote_accounts(&self, provider: ProviderKind) -> Result<Vec<RemoteAccount>> {
        let client = self.providers.get(provider)?;
        self.bounded(provider, client.list_accounts()).await
    }

    fn list_sync_accounts(&self) -> Result<Vec<SyncAccount>> {
        self.repository.list()
    }

    fn get_sync_account(&self, id: &str) -> Result<SyncAccount> {
        self.load(id)
    }

    async fn select_account(&self, provider: ProviderKind, remote_account_id: &str) -> Result<SyncAccount> {
        let _selecting = self
            .run_locks
            .acquire([format!("select:{}:{}", provider, remote_account_id)])
            .await;
        if self
            .repository
            .list()?
            .iter()
            .any(|a| a.provider == provider && a.remote_account_id == remote_account_id)
        {
            return Err(ValidationError::InvalidInput(format!(
                "{} account {} is already connected",
                provider, remote_account_id
            ))
            .into());
        }
        let remote = self
            .list_remote_accounts(provider)
            .await?
            .into_iter()
            .find(|a| a.id == remote_account_id)
            .ok_or_else(|| Error::NotFound(format!("{} account {} not found", provider, remote_account_id)))?;

        let account = SyncAccount::new(provider, remote.id, remote.name, self.clock.now());
        info!("Selected {} account {} as {}", provider, remote_account_id, account.id);
        self.repository.insert(account).await
    }

    async fn fetch_decision_balance(&self, id: &str) -> Result<SyncAccount> {
        let _run = self.run_locks.acquire([id]).await;
        let mut account = self.load(id)?;
        account.expect_state(
            &[SyncState::AccountSelected, SyncState::BalanceDecisionPending],
            "fetch a decision balance",
        )?;
        let provider = self.providers.get(account.provider)?;
        account.pending_balance = Some(self.remote_balance(&provider, &account).await?);
        account.state = SyncState::BalanceDecisionPending;
        self.save(account).await
    }

    async fn activate(&self, id: &str, decision: BalanceDecision) -> Result<Mutation<SyncAccount>> {
        // Held until the pocket is recorded, so a second activation sees Active.
        let _run = self.run_locks.acquire([id]).await;
        let mut account = self.load(id)?;
        account.expect_state(&[SyncState::BalanceDecisionPending], "activate")?;

        let initial_funding = match decision {
            BalanceDecision::StartAtZero => 0,
            BalanceDecision::SyncToBalance => match account.pending_balance {
                Some(balance) => balance,
                None => {
                    let provider = self.providers.get(account.provider)?;
                    self.remote_balance(&provider, &account).await?
                }
            },
        };

        let created = self
            .ledger
            .create_pocket(NewPocket {
                name: account.name.clone(),
                target: None,
                initial_funding,
                group_id: None,
                note: Some(format!("{} credit card", account.provider)),
                is_credit_card: true,
            })
            .await?;

        account.pocket_id = Some(created.value.id.clone());
        account.state = SyncState::Active;
        account.pending_balance = Some(initial_funding);
        let account = self.save(account).await?;
        self.scheduler.arm(&account.id, account.schedule.times.clone());
        info!("Activated sync account {} with pocket {}", account.id, created.value.id);

        Ok(Mutation::new(account, created.changed).with(Resource::SyncAccounts))
    }

    async fn disconnect(&self, id: &str) -> Result<Mutation<i64>> {
        let _run = self.run_locks.acquire([id]).await;
        let account = self.load(id)?;
        self.scheduler.disarm(id);

        let mut mutation = Mutation::new(0, [Resource::SyncAccounts]);
        if let Some(pocket_id) = account.pocket_id.as_deref() {
            match self.ledger.delete_pocket(pocket_id).await {
                Ok(deleted) => mutation = deleted.with(Resource::SyncAccounts),
                Err(Error::NotFound(_)) => {
                    warn!("Pocket {} for sync account {} was already gone", pocket_id, id);
                }
                Err(e) => return Err(e),
            }
        }
        self.repository.delete(id).await?;
        info!("Disconnected sync account {}, returned {}", id, mutation.value);
        Ok(mutation)
    }

    async fn configure_schedule(&self, id: &str, local_times: &[String], timezone: &str) -> Result<SyncAccount> {
        let _run = self.run_locks.acquire([id]).await;
        let mut account = self.load(id)?;
        let zone = ScheduleTimezone::parse(timezone)?;
        let today = self.clock.today();
        let mut times = local_times
            .iter()
            .map(|t| t.parse::<TimeOfDay>().map(|local| zone.to_utc(local, today)))
            .collect::<Result<Vec<_>>>()?;
        times.sort();
        times.dedup();

        account.schedule = SyncSchedule {
            times,
            timezone: timezone.trim().to_string(),
        };
        let account = self.save(account).await?;
        if account.is_active() {
            self.scheduler.arm(&account.id, account.schedule.times.clone());
        }
        Ok(account)
    }

    fn get_schedule(&self, id: &str) -> Result<ScheduleView> {
        let account = self.load(id)?;
        let zone = ScheduleTimezone::parse(&account.schedule.timezone)?;
        let today = self.clock.today();
        Ok(ScheduleView {
            timezone: account.schedule.timezone.clone(),
            local_times: account
                .schedule
                .times
                .iter()
                .map(|t| zone.to_local(*t, today).to_string())
                .collect(),
            utc_times: account.schedule.times.iter().map(|t| t.to_string()).collect(),
        })
    }

    async fn link_bill(&self, id: &str, bill_id: Option<String>) -> Result<SyncAccount> {
        let _run = self.run_locks.acquire([id]).await;
        let mut account = self.load(id)?;
        if let Some(bill_id) = bill_id.as_deref() {
            let bills = self.ledger.gateway().bills(false).await?;
            if !bills.iter().any(|b| b.id == bill_id) {
                return Err(Error::NotFound(format!("Bill {} not found", bill_id)));
            }
        }
        account.linked_bill_id = bill_id;
        self.save(account).await
    }

    async fn sync_now(&self, id: &str) -> Result<SyncOutcome> {
        self.run_sync(id).await
    }

    async fn sync_all(&self) -> Result<Vec<SyncRunResult>> {
        let ids: Vec<String> = self
            .repository
            .list()?
            .into_iter()
            .filter(|a| a.is_active())
            .map(|a| a.id)
            .collect();
        let runs = ids.iter().map(|id| async move {
            let result = self.run_sync(id).await;
            SyncRunResult {
                sync_account_id: id.clone(),
                error: result.as_ref().err().map(|e| e.to_string()),
                outcome: result.ok(),
            }
        });
        Ok(futures::future::join_all(runs).await)
    }

    async fn sync_balance(&self, id: &str, target: i64) -> Result<Mutation<i64>> {
        let _run = self.run_locks.acquire([id]).await;
        let account = self.load(id)?;
        account.expect_state(&[SyncState::Active], "sync the balance")?;
        self.sync_balance_inner(&account, target).await
    }
}

#[async_trait]
impl SyncRunner for SyncService {
    async fn run_scheduled(&self, sync_account_id: &str) -> Result<SyncOutcome> {
        self.run_sync(sync_account_id).await
    }
}
