//! In-memory repositories, a scripted credit provider and a ready-wired
//! service fixture. Used by unit tests, integration tests and demo mode.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::bills::{BillService, ReconciliationRepositoryTrait};
use crate::cache::{CacheConfig, CachedGateway};
use crate::cards::CardService;
use crate::errors::{Error, GatewayError, Result};
use crate::events::MockDomainEventSink;
use crate::gateway::{GatewayResult, InMemoryBank};
use crate::ledger::{LedgerService, PocketMeta, PocketMetaRepositoryTrait};
use crate::reports::{BalanceHistoryPoint, BalanceHistoryRepositoryTrait, ReportService};
use crate::sync::{
    CreditProvider, ProviderKind, ProviderRegistry, RemoteAccount, RemoteTransaction, SchedulerConfig,
    SyncAccount, SyncAccountRepositoryTrait, SyncConfig, SyncRunner, SyncScheduler, SyncService,
};
use crate::transfers::TransferService;
use crate::utils::clock::{Clock, FixedClock};

fn poisoned() -> Error {
    Error::Unexpected("in-memory store lock poisoned".to_string())
}

#[derive(Default)]
pub struct InMemoryPocketMetaRepository {
    items: RwLock<HashMap<String, PocketMeta>>,
}

impl InMemoryPocketMetaRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PocketMetaRepositoryTrait for InMemoryPocketMetaRepository {
    fn list(&self) -> Result<Vec<PocketMeta>> {
        let items = self.items.read().map_err(|_| poisoned())?;
        let mut metas: Vec<PocketMeta> = items.values().cloned().collect();
        metas.sort_by(|a, b| a.pocket_id.cmp(&b.pocket_id));
        Ok(metas)
    }

    fn get(&self, pocket_id: &str) -> Result<Option<PocketMeta>> {
        let items = self.items.read().map_err(|_| poisoned())?;
        Ok(items.get(pocket_id).cloned())
    }

    async fn upsert(&self, meta: PocketMeta) -> Result<PocketMeta> {
        let mut items = self.items.write().map_err(|_| poisoned())?;
        items.insert(meta.pocket_id.clone(), meta.clone());
        Ok(meta)
    }

    async fn delete(&self, pocket_id: &str) -> Result<usize> {
        let mut items = self.items.write().map_err(|_| poisoned())?;
        Ok(usize::from(items.remove(pocket_id).is_some()))
    }
}

#[derive(Default)]
pub struct InMemoryReconciliationRepository {
    items: RwLock<BTreeMap<(String, String), i64>>,
}

impl InMemoryReconciliationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReconciliationRepositoryTrait for InMemoryReconciliationRepository {
    fn is_reconciled(&self, scope: &str, transaction_id: &str) -> Result<bool> {
        let items = self.items.read().map_err(|_| poisoned())?;
        Ok(items.contains_key(&(scope.to_string(), transaction_id.to_string())))
    }

    fn list_reconciled(&self, scope: &str) -> Result<Vec<String>> {
        let items = self.items.read().map_err(|_| poisoned())?;
        Ok(items
            .keys()
            .filter(|(s, _)| s == scope)
            .map(|(_, id)| id.clone())
            .collect())
    }

    async fn mark_reconciled(&self, scope: &str, transaction_id: &str, amount: i64) -> Result<bool> {
        let mut items = self.items.write().map_err(|_| poisoned())?;
        let key = (scope.to_string(), transaction_id.to_string());
        if items.contains_key(&key) {
            return Ok(false);
        }
        items.insert(key, amount);
        Ok(true)
    }

    async fn unmark(&self, scope: &str, transaction_id: &str) -> Result<usize> {
        let mut items = self.items.write().map_err(|_| poisoned())?;
        let removed = items.remove(&(scope.to_string(), transaction_id.to_string()));
        Ok(usize::from(removed.is_some()))
    }

    async fn clear_scope(&self, scope: &str) -> Result<usize> {
        let mut items = self.items.write().map_err(|_| poisoned())?;
        let before = items.len();
        items.retain(|(s, _), _| s != scope);
        Ok(before - items.len())
    }
}

#[derive(Default)]
pub struct InMemorySyncAccountRepository {
    items: RwLock<Vec<SyncAccount>>,
}

impl InMemorySyncAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SyncAccountRepositoryTrait for InMemorySyncAccountRepository {
    fn list(&self) -> Result<Vec<SyncAccount>> {
        Ok(self.items.read().map_err(|_| poisoned())?.clone())
    }

    fn get(&self, id: &str) -> Result<Option<SyncAccount>> {
        let items = self.items.read().map_err(|_| poisoned())?;
        Ok(items.iter().find(|a| a.id == id).cloned())
    }

    async fn insert(&self, account: SyncAccount) -> Result<SyncAccount> {
        let mut items = self.items.write().map_err(|_| poisoned())?;
        items.push(account.clone());
        Ok(account)
    }

    async fn update(&self, account: SyncAccount) -> Result<SyncAccount> {
        let mut items = self.items.write().map_err(|_| poisoned())?;
        let slot = items
            .iter_mut()
            .find(|a| a.id == account.id)
            .ok_or_else(|| Error::NotFound(format!("Sync account {} not found", account.id)))?;
        *slot = account.clone();
        Ok(account)
    }

    async fn delete(&self, id: &str) -> Result<usize> {
        let mut items = self.items.write().map_err(|_| poisoned())?;
        let before = items.len();
        items.retain(|a| a.id != id);
        Ok(before - items.len())
    }
}

#[derive(Default)]
pub struct InMemoryBalanceHistoryRepository {
    points: RwLock<BTreeMap<NaiveDate, i64>>,
}

impl InMemoryBalanceHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BalanceHistoryRepositoryTrait for InMemoryBalanceHistoryRepository {
    fn list(&self) -> Result<Vec<BalanceHistoryPoint>> {
        let points = self.points.read().map_err(|_| poisoned())?;
        Ok(points
            .iter()
            .map(|(date, balance)| BalanceHistoryPoint {
                date: *date,
                balance: *balance,
            })
            .collect())
    }

    async fn upsert(&self, point: BalanceHistoryPoint) -> Result<BalanceHistoryPoint> {
        let mut points = self.points.write().map_err(|_| poisoned())?;
        points.insert(point.date, point.balance);
        Ok(point)
    }
}

#[derive(Default)]
struct ProviderState {
    accounts: Vec<RemoteAccount>,
    transactions: HashMap<String, Vec<RemoteTransaction>>,
    calls: HashMap<&'static str, usize>,
    fail_next: Option<GatewayError>,
}

/// A credit provider whose accounts and balances are set by the test.
pub struct InMemoryCreditProvider {
    kind: ProviderKind,
    state: Mutex<ProviderState>,
}

impl InMemoryCreditProvider {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            state: Mutex::new(ProviderState::default()),
        }
    }

    pub fn add_account(&self, id: &str, name: &str, balance: i64) {
        if let Ok(mut state) = self.state.lock() {
            state.accounts.push(RemoteAccount {
                id: id.to_string(),
                name: name.to_string(),
                institution: Some("Test Bank".to_string()),
                balance: Some(balance),
                currency: Some("USD".to_string()),
            });
        }
    }

    pub fn set_balance(&self, id: &str, balance: i64) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(account) = state.accounts.iter_mut().find(|a| a.id == id) {
                account.balance = Some(balance);
            }
        }
    }

    pub fn push_transaction(&self, account_id: &str, transaction: RemoteTransaction) {
        if let Ok(mut state) = self.state.lock() {
            state
                .transactions
                .entry(account_id.to_string())
                .or_default()
                .push(transaction);
        }
    }

    pub fn fail_next(&self, err: GatewayError) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_next = Some(err);
        }
    }

    pub fn calls(&self, op: &str) -> usize {
        self.state
            .lock()
            .ok()
            .and_then(|s| s.calls.get(op).copied())
            .unwrap_or(0)
    }

    fn begin(&self, op: &'static str) -> GatewayResult<std::sync::MutexGuard<'_, ProviderState>> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| GatewayError::remote(self.kind.as_str(), "provider state poisoned"))?;
        *state.calls.entry(op).or_insert(0) += 1;
        if let Some(err) = state.fail_next.take() {
            return Err(err);
        }
        Ok(state)
    }
}

#[async_trait]
impl CreditProvider for InMemoryCreditProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn list_accounts(&self) -> GatewayResult<Vec<RemoteAccount>> {
        Ok(self.begin("list_accounts")?.accounts.clone())
    }

    async fn get_balance(&self, account_id: &str) -> GatewayResult<i64> {
        let state = self.begin("get_balance")?;
        state
            .accounts
            .iter()
            .find(|a| a.id == account_id)
            .and_then(|a| a.balance)
            .ok_or_else(|| GatewayError::remote(self.kind.as_str(), format!("unknown account {}", account_id)))
    }

    async fn list_transactions(
        &self,
        account_id: &str,
        since: Option<NaiveDate>,
    ) -> GatewayResult<Vec<RemoteTransaction>> {
        let state = self.begin("list_transactions")?;
        Ok(state
            .transactions
            .get(account_id)
            .map(|txs| {
                txs.iter()
                    .filter(|t| !since.is_some_and(|s| t.date < s))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Every service wired against an [`InMemoryBank`] at a fixed date.
pub struct Fixture {
    pub clock: Arc<FixedClock>,
    pub bank: Arc<InMemoryBank>,
    pub gateway: Arc<CachedGateway>,
    pub events: Arc<MockDomainEventSink>,
    pub metas: Arc<InMemoryPocketMetaRepository>,
    pub reconciliations: Arc<InMemoryReconciliationRepository>,
    pub sync_accounts: Arc<InMemorySyncAccountRepository>,
    pub history: Arc<InMemoryBalanceHistoryRepository>,
    pub provider: Arc<InMemoryCreditProvider>,
    pub ledger: Arc<LedgerService>,
    pub bills: Arc<BillService>,
    pub transfers: Arc<TransferService>,
    pub cards: Arc<CardService>,
    pub reports: Arc<ReportService>,
    pub scheduler: Arc<SyncScheduler>,
    pub sync: Arc<SyncService>,
}

impl Fixture {
    /// A bank holding `primary_balance` in checking, on 2025-09-16.
    pub fn new(primary_balance: i64) -> Self {
        let today = NaiveDate::from_ymd_opt(2025, 9, 16).unwrap_or_default();
        Self::at(primary_balance, today)
    }

    pub fn at(primary_balance: i64, today: NaiveDate) -> Self {
        let clock = Arc::new(FixedClock::at_date(today));
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let bank = Arc::new(InMemoryBank::with_clock(primary_balance, dyn_clock.clone()));
        let gateway = Arc::new(CachedGateway::new(bank.clone(), CacheConfig::default(), dyn_clock.clone()));
        let events = Arc::new(MockDomainEventSink::new());
        let metas = Arc::new(InMemoryPocketMetaRepository::new());
        let reconciliations = Arc::new(InMemoryReconciliationRepository::new());
        let sync_accounts = Arc::new(InMemorySyncAccountRepository::new());
        let history = Arc::new(InMemoryBalanceHistoryRepository::new());
        let provider = Arc::new(InMemoryCreditProvider::new(ProviderKind::SimpleFin));

        let ledger = Arc::new(LedgerService::new(gateway.clone(), metas.clone(), events.clone()));
        let bills = Arc::new(BillService::new(ledger.clone(), reconciliations.clone(), dyn_clock.clone()));
        let transfers = Arc::new(TransferService::new(ledger.clone()));
        let cards = Arc::new(CardService::new(ledger.clone()));
        let reports = Arc::new(ReportService::new(gateway.clone(), history.clone(), dyn_clock.clone()));
        let scheduler = Arc::new(SyncScheduler::new(SchedulerConfig::default(), dyn_clock.clone()));
        let providers = ProviderRegistry::new().with(provider.clone());
        let sync = Arc::new(SyncService::new(
            ledger.clone(),
            bills.clone(),
            sync_accounts.clone(),
            providers,
            scheduler.clone(),
            dyn_clock,
            SyncConfig::default(),
        ));
        let runner: Arc<dyn SyncRunner> = sync.clone();
        scheduler.bind(Arc::downgrade(&runner));

        Self {
            clock,
            bank,
            gateway,
            events,
            metas,
            reconciliations,
            sync_accounts,
            history,
            provider,
            ledger,
            bills,
            transfers,
            cards,
            reports,
            scheduler,
            sync,
        }
    }
}
