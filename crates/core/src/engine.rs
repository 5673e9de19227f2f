//! The engine object: every service wired once, passed around by `Arc`.

use std::sync::Arc;

use log::{info, warn};

use crate::bills::{BillService, BillServiceTrait, ReconciliationRepositoryTrait};
use crate::cache::{CacheConfig, CachedGateway};
use crate::cards::CardService;
use crate::errors::Result;
use crate::events::DomainEventSink;
use crate::gateway::BankGateway;
use crate::ledger::{LedgerService, LedgerServiceTrait, LedgerSnapshot, PocketMetaRepositoryTrait};
use crate::reports::{BalanceHistoryRepositoryTrait, ReportService, ReportServiceTrait};
use crate::sync::{
    ProviderRegistry, SchedulerConfig, SyncAccountRepositoryTrait, SyncConfig, SyncRunner, SyncScheduler,
    SyncService,
};
use crate::transfers::TransferService;
use crate::utils::clock::Clock;

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    pub scheduler: SchedulerConfig,
    pub sync: SyncConfig,
}

/// Collaborators supplied by the host: the bank, the local store and the
/// credit providers.
pub struct EngineDeps {
    pub gateway: Arc<dyn BankGateway>,
    pub pocket_metas: Arc<dyn PocketMetaRepositoryTrait>,
    pub reconciliations: Arc<dyn ReconciliationRepositoryTrait>,
    pub sync_accounts: Arc<dyn SyncAccountRepositoryTrait>,
    pub history: Arc<dyn BalanceHistoryRepositoryTrait>,
    pub providers: ProviderRegistry,
    pub event_sink: Arc<dyn DomainEventSink>,
    pub clock: Arc<dyn Clock>,
}

pub struct Engine {
    gateway: Arc<CachedGateway>,
    ledger: Arc<LedgerService>,
    bills: Arc<BillService>,
    transfers: Arc<TransferService>,
    cards: Arc<CardService>,
    reports: Arc<ReportService>,
    scheduler: Arc<SyncScheduler>,
    sync: Arc<SyncService>,
}

impl Engine {
    /// Builds the services with an empty cache. Timers do not run until
    /// [`start`](Self::start).
    pub fn new(config: EngineConfig, deps: EngineDeps) -> Arc<Self> {
        let gateway = Arc::new(CachedGateway::new(deps.gateway, config.cache, deps.clock.clone()));
        let ledger = Arc::new(LedgerService::new(
            gateway.clone(),
            deps.pocket_metas,
            deps.event_sink,
        ));
        let bills = Arc::new(BillService::new(
            ledger.clone(),
            deps.reconciliations,
            deps.clock.clone(),
        ));
        let transfers = Arc::new(TransferService::new(ledger.clone()));
        let cards = Arc::new(CardService::new(ledger.clone()));
        let reports = Arc::new(ReportService::new(gateway.clone(), deps.history, deps.clock.clone()));
        let scheduler = Arc::new(SyncScheduler::new(config.scheduler, deps.clock.clone()));
        let sync = Arc::new(SyncService::new(
            ledger.clone(),
            bills.clone(),
            deps.sync_accounts,
            deps.providers,
            scheduler.clone(),
            deps.clock,
            config.sync,
        ));
        let runner: Arc<dyn SyncRunner> = sync.clone();
        scheduler.bind(Arc::downgrade(&runner));

        Arc::new(Self {
            gateway,
            ledger,
            bills,
            transfers,
            cards,
            reports,
            scheduler,
            sync,
        })
    }

    /// Starts the scheduler and arms a timer for every Active account.
    pub fn start(&self) -> Result<()> {
        self.scheduler.start();
        let armed = self.sync.arm_active()?;
        info!("Engine started with {} scheduled credit accounts", armed);
        Ok(())
    }

    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        info!("Engine stopped");
    }

    /// Reads the ledger. When the snapshot came fresh from the bank, the
    /// day's balance point is recorded and new transactions are matched
    /// against bills.
    pub async fn refresh(&self, force: bool) -> Result<LedgerSnapshot> {
        let fetched = self.gateway.snapshot_or_stale(force).await?;
        if !fetched.from_cache && !fetched.stale {
            if let Err(e) = self.reports.record_balance(&fetched.value).await {
                warn!("Failed to record balance history: {}", e);
            }
            match self.gateway.transactions(force).await {
                Ok(transactions) => {
                    if let Err(e) = self.bills.reconcile_transactions(&transactions, None).await {
                        warn!("Bill reconciliation after refresh failed: {}", e);
                    }
                }
                Err(e) => warn!("Skipping bill reconciliation, transactions unavailable: {}", e),
            }
        }
        self.ledger.get_snapshot(false).await
    }

    pub fn gateway(&self) -> &Arc<CachedGateway> {
        &self.gateway
    }

    pub fn ledger(&self) -> &Arc<LedgerService> {
        &self.ledger
    }

    pub fn bills(&self) -> &Arc<BillService> {
        &self.bills
    }

    pub fn transfers(&self) -> &Arc<TransferService> {
        &self.transfers
    }

    pub fn cards(&self) -> &Arc<CardService> {
        &self.cards
    }

    pub fn reports(&self) -> &Arc<ReportService> {
        &self.reports
    }

    pub fn sync(&self) -> &Arc<SyncService> {
        &self.sync
    }

    pub fn scheduler(&self) -> &Arc<SyncScheduler> {
        &self.scheduler
    }
}
