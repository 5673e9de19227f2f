//! Bank gateway wrapped in per-resource TTL caches and bounded timeouts.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use super::ttl_cache::{Fetched, TtlCache};
use crate::changes::Resource;
use crate::constants::{
    DEFAULT_CACHE_TTL_SECS, DEFAULT_GATEWAY_TIMEOUT_SECS, DEFAULT_TRANSACTION_PAGE_SIZE,
};
use crate::errors::{GatewayError, Result};
use crate::gateway::{
    AccountSnapshot, BankGateway, BillRecord, DebitCard, GatewayResult, MoveMoneyRequest,
    NewBillRequest, NewPocketRequest, SpendSubaccountRequest, Subaccount, Transaction,
    TransactionDetail,
};
use crate::utils::clock::Clock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub snapshot_ttl: Duration,
    pub transactions_ttl: Duration,
    pub bills_ttl: Duration,
    pub funding_source_ttl: Duration,
    pub cards_ttl: Duration,
    pub gateway_timeout: Duration,
    pub transaction_page_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let ttl = Duration::from_secs(DEFAULT_CACHE_TTL_SECS);
        Self {
            snapshot_ttl: ttl,
            transactions_ttl: ttl,
            bills_ttl: ttl,
            funding_source_ttl: ttl,
            cards_ttl: ttl,
            gateway_timeout: Duration::from_secs(DEFAULT_GATEWAY_TIMEOUT_SECS),
            transaction_page_size: DEFAULT_TRANSACTION_PAGE_SIZE,
        }
    }
}

impl CacheConfig {
    /// Same TTL for every resource.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            snapshot_ttl: ttl,
            transactions_ttl: ttl,
            bills_ttl: ttl,
            funding_source_ttl: ttl,
            cards_ttl: ttl,
            ..Self::default()
        }
    }
}

/// Logical cache keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Account balance plus sub-accounts, always fetched together.
    Snapshot,
    Transactions { page_size: usize },
    Bills,
    FundingSource,
    Cards,
    TransactionDetail { id: String },
}

impl CacheKey {
    /// Keys whose values a change to `resource` could affect.
    fn affected_by(&self, resource: Resource) -> bool {
        match self {
            CacheKey::Snapshot => matches!(
                resource,
                Resource::AccountBalance | Resource::Subaccounts | Resource::Goals
            ),
            CacheKey::Transactions { .. } => resource == Resource::Transactions,
            CacheKey::Bills => resource == Resource::Bills,
            CacheKey::FundingSource => false,
            CacheKey::Cards => resource == Resource::Cards,
            CacheKey::TransactionDetail { .. } => resource == Resource::Transactions,
        }
    }
}

#[derive(Clone)]
enum CachedValue {
    Snapshot(AccountSnapshot),
    Transactions(Arc<Vec<Transaction>>),
    Bills(Arc<Vec<BillRecord>>),
    FundingSource(String),
    Cards(Arc<Vec<DebitCard>>),
    TransactionDetail(Option<Arc<TransactionDetail>>),
}

async fn bounded<T>(
    service: String,
    limit: Duration,
    fut: impl Future<Output = GatewayResult<T>>,
) -> GatewayResult<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!("{} call exceeded {:?}", service, limit);
            Err(GatewayError::Timeout { service })
        }
    }
}

/// Caching front for a [`BankGateway`].
///
/// Reads go through the cache. Mutations go straight to the gateway and
/// then invalidate every key they could have changed, whether the call
/// succeeded or not: a timed-out write may still have been applied.
pub struct CachedGateway {
    gateway: Arc<dyn BankGateway>,
    cache: TtlCache<CacheKey, CachedValue>,
    config: CacheConfig,
}

impl CachedGateway {
    pub fn new(gateway: Arc<dyn BankGateway>, config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            gateway,
            cache: TtlCache::with_clock(clock),
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn service_name(&self) -> &str {
        self.gateway.name()
    }

    fn ttl_for(&self, key: &CacheKey) -> Duration {
        match key {
            CacheKey::Snapshot => self.config.snapshot_ttl,
            CacheKey::Transactions { .. } => self.config.transactions_ttl,
            CacheKey::Bills => self.config.bills_ttl,
            CacheKey::FundingSource => self.config.funding_source_ttl,
            CacheKey::Cards => self.config.cards_ttl,
            CacheKey::TransactionDetail { .. } => self.config.transactions_ttl,
        }
    }

    async fn read(&self, key: CacheKey, force: bool, allow_stale: bool) -> GatewayResult<Fetched<CachedValue>> {
        let gateway = Arc::clone(&self.gateway);
        let service = gateway.name().to_string();
        let limit = self.config.gateway_timeout;
        let ttl = self.ttl_for(&key);
        let request = key.clone();
        let fetch = move || async move {
            debug!("Cache miss for {:?}, fetching from {}", request, service);
            match request {
                CacheKey::Snapshot => bounded(service, limit, gateway.fetch_snapshot())
                    .await
                    .map(CachedValue::Snapshot),
                CacheKey::Transactions { page_size } => {
                    bounded(service, limit, gateway.list_transactions(page_size))
                        .await
                        .map(|t| CachedValue::Transactions(Arc::new(t)))
                }
                CacheKey::Bills => bounded(service, limit, gateway.list_bills())
                    .await
                    .map(|b| CachedValue::Bills(Arc::new(b))),
                CacheKey::FundingSource => bounded(service, limit, gateway.funding_source_name())
                    .await
                    .map(CachedValue::FundingSource),
                CacheKey::Cards => bounded(service, limit, gateway.list_debit_cards())
                    .await
                    .map(|c| CachedValue::Cards(Arc::new(c))),
                CacheKey::TransactionDetail { id } => {
                    bounded(service, limit, gateway.transaction_detail(&id))
                        .await
                        .map(|d| CachedValue::TransactionDetail(d.map(Arc::new)))
                }
            }
        };
        if allow_stale {
            self.cache.get_or_stale(key, ttl, force, fetch).await
        } else {
            self.cache.fetch(key, ttl, force, fetch).await
        }
    }

    fn unexpected(key: &CacheKey) -> GatewayError {
        GatewayError::decode("cache", format!("unexpected value stored for {:?}", key))
    }

    /// Strict snapshot read: a failed fetch is an error even if an older
    /// value is stored.
    pub async fn snapshot(&self, force: bool) -> Result<Fetched<AccountSnapshot>> {
        self.snapshot_inner(force, false).await
    }

    /// Snapshot read that falls back to the last stored value on failure.
    pub async fn snapshot_or_stale(&self, force: bool) -> Result<Fetched<AccountSnapshot>> {
        self.snapshot_inner(force, true).await
    }

    async fn snapshot_inner(&self, force: bool, allow_stale: bool) -> Result<Fetched<AccountSnapshot>> {
        let fetched = self.read(CacheKey::Snapshot, force, allow_stale).await?;
        match fetched.value {
            CachedValue::Snapshot(snapshot) => Ok(Fetched {
                value: snapshot,
                fetched_at: fetched.fetched_at,
                from_cache: fetched.from_cache,
                stale: fetched.stale,
            }),
            _ => Err(Self::unexpected(&CacheKey::Snapshot).into()),
        }
    }

    pub async fn transactions(&self, force: bool) -> Result<Arc<Vec<Transaction>>> {
        let key = CacheKey::Transactions {
            page_size: self.config.transaction_page_size,
        };
        match self.read(key.clone(), force, false).await?.value {
            CachedValue::Transactions(transactions) => Ok(transactions),
            _ => Err(Self::unexpected(&key).into()),
        }
    }

    pub async fn bills(&self, force: bool) -> Result<Arc<Vec<BillRecord>>> {
        match self.read(CacheKey::Bills, force, false).await?.value {
            CachedValue::Bills(bills) => Ok(bills),
            _ => Err(Self::unexpected(&CacheKey::Bills).into()),
        }
    }

    pub async fn funding_source_name(&self, force: bool) -> Result<String> {
        match self.read(CacheKey::FundingSource, force, false).await?.value {
            CachedValue::FundingSource(name) => Ok(name),
            _ => Err(Self::unexpected(&CacheKey::FundingSource).into()),
        }
    }

    pub async fn debit_cards(&self, force: bool) -> Result<Arc<Vec<DebitCard>>> {
        match self.read(CacheKey::Cards, force, false).await?.value {
            CachedValue::Cards(cards) => Ok(cards),
            _ => Err(Self::unexpected(&CacheKey::Cards).into()),
        }
    }

    pub async fn transaction_detail(&self, transaction_id: &str, force: bool) -> Result<Option<Arc<TransactionDetail>>> {
        let key = CacheKey::TransactionDetail {
            id: transaction_id.to_string(),
        };
        match self.read(key.clone(), force, false).await?.value {
            CachedValue::TransactionDetail(detail) => Ok(detail),
            _ => Err(Self::unexpected(&key).into()),
        }
    }

    /// Removes every cached value the given resources could have changed.
    pub fn invalidate(&self, resources: &BTreeSet<Resource>) {
        debug!("Invalidating cache for {:?}", resources);
        self.cache
            .invalidate_where(|key| resources.iter().any(|r| key.affected_by(*r)));
    }

    pub fn invalidate_key(&self, key: &CacheKey) {
        self.cache.invalidate(key);
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    async fn mutate<T>(
        &self,
        resources: &BTreeSet<Resource>,
        fut: impl Future<Output = GatewayResult<T>>,
    ) -> Result<T> {
        let result = bounded(
            self.gateway.name().to_string(),
            self.config.gateway_timeout,
            fut,
        )
        .await;
        self.invalidate(resources);
        Ok(result?)
    }

    pub async fn move_money(&self, request: MoveMoneyRequest) -> Result<()> {
        self.mutate(&Resource::balance_bearing(), self.gateway.move_money(request))
            .await
    }

    pub async fn create_pocket(&self, request: NewPocketRequest) -> Result<Subaccount> {
        self.mutate(&Resource::balance_bearing(), self.gateway.create_pocket(request))
            .await
    }

    pub async fn delete_pocket(&self, pocket_id: &str) -> Result<()> {
        let mut resources = Resource::balance_bearing();
        resources.insert(Resource::Bills);
        resources.insert(Resource::Cards);
        self.mutate(&resources, self.gateway.delete_pocket(pocket_id))
            .await
    }

    pub async fn create_bill(&self, request: NewBillRequest) -> Result<BillRecord> {
        let mut resources = Resource::balance_bearing();
        resources.insert(Resource::Bills);
        self.mutate(&resources, self.gateway.create_bill(request)).await
    }

    pub async fn delete_bill(&self, bill_id: &str) -> Result<()> {
        let resources: BTreeSet<Resource> = [Resource::Bills].into_iter().collect();
        self.mutate(&resources, self.gateway.delete_bill(bill_id)).await
    }

    pub async fn set_spend_subaccount(&self, request: SpendSubaccountRequest) -> Result<()> {
        let resources: BTreeSet<Resource> = [Resource::Cards, Resource::Subaccounts].into_iter().collect();
        self.mutate(&resources, self.gateway.set_spend_subaccount(request))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::InMemoryBank;
    use crate::utils::clock::SystemClock;

    fn setup() -> (Arc<InMemoryBank>, CachedGateway) {
        let bank = Arc::new(InMemoryBank::new(50_000));
        let cached = CachedGateway::new(bank.clone(), CacheConfig::default(), Arc::new(SystemClock));
        (bank, cached)
    }

    #[tokio::test]
    async fn test_two_reads_within_ttl_hit_gateway_once() {
        let (bank, cached) = setup();
        cached.snapshot(false).await.unwrap();
        let second = cached.snapshot(false).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(bank.calls("fetch_snapshot"), 1);
    }

    #[tokio::test]
    async fn test_mutation_invalidates_balance_keys_before_returning() {
        let (bank, cached) = setup();
        let before = cached.snapshot(false).await.unwrap().value;
        cached.bills(false).await.unwrap();

        cached
            .create_pocket(NewPocketRequest {
                name: "Trip".into(),
                target: None,
                initial_funding: 1_000,
                note: None,
            })
            .await
            .unwrap();

        let after = cached.snapshot(false).await.unwrap();
        assert!(!after.from_cache);
        assert_eq!(after.value.safe_to_spend(), before.safe_to_spend() - 1_000);
        assert_eq!(bank.calls("fetch_snapshot"), 2);
        // bills were not touched by a pocket creation
        cached.bills(false).await.unwrap();
        assert_eq!(bank.calls("list_bills"), 1);
    }

    #[tokio::test]
    async fn test_failed_mutation_still_invalidates() {
        let (bank, cached) = setup();
        cached.snapshot(false).await.unwrap();
        let err = cached
            .move_money(MoveMoneyRequest {
                from_id: "nope".into(),
                to_id: bank.primary_id(),
                amount: 5,
                note: "Transfer".into(),
            })
            .await;
        assert!(err.is_err());
        cached.snapshot(false).await.unwrap();
        assert_eq!(bank.calls("fetch_snapshot"), 2);
    }

    #[tokio::test]
    async fn test_spend_change_invalidates_cards_only() {
        let (bank, cached) = setup();
        bank.add_debit_card("user-1", "Alex", "4242");
        let pocket = bank.add_pocket("Groceries", 0, None);
        cached.debit_cards(false).await.unwrap();
        cached.bills(false).await.unwrap();

        cached
            .set_spend_subaccount(SpendSubaccountRequest {
                user_id: "user-1".into(),
                subaccount_id: pocket.clone(),
            })
            .await
            .unwrap();

        let cards = cached.debit_cards(false).await.unwrap();
        assert_eq!(cards[0].spend_subaccount_id.as_deref(), Some(pocket.as_str()));
        assert_eq!(bank.calls("list_debit_cards"), 2);
        cached.bills(false).await.unwrap();
        assert_eq!(bank.calls("list_bills"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_gateway_times_out() {
        let bank = Arc::new(InMemoryBank::new(0));
        bank.set_latency(Duration::from_secs(60));
        let config = CacheConfig {
            gateway_timeout: Duration::from_secs(1),
            ..CacheConfig::default()
        };
        let cached = CachedGateway::new(bank, config, Arc::new(SystemClock));
        let err = cached.snapshot(false).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
