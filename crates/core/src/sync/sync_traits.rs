use async_trait::async_trait;

use super::sync_model::{
    BalanceDecision, ProviderKind, RemoteAccount, ScheduleView, SyncAccount, SyncOutcome, SyncRunResult,
};
use crate::changes::Mutation;
use crate::errors::Result;

/// Trait for sync account repository operations
#[async_trait]
pub trait SyncAccountRepositoryTrait: Send + Sync {
    fn list(&self) -> Result<Vec<SyncAccount>>;
    fn get(&self, id: &str) -> Result<Option<SyncAccount>>;
    async fn insert(&self, account: SyncAccount) -> Result<SyncAccount>;
    async fn update(&self, account: SyncAccount) -> Result<SyncAccount>;
    async fn delete(&self, id: &str) -> Result<usize>;
}

/// Trait for credit-account sync operations
#[async_trait]
pub trait SyncServiceTrait: Send + Sync {
    async fn list_remote_accounts(&self, provider: ProviderKind) -> Result<Vec<RemoteAccount>>;
    fn list_sync_accounts(&self) -> Result<Vec<SyncAccount>>;
    fn get_sync_account(&self, id: &str) -> Result<SyncAccount>;
    async fn select_account(&self, provider: ProviderKind, remote_account_id: &str) -> Result<SyncAccount>;
    async fn fetch_decision_balance(&self, id: &str) -> Result<SyncAccount>;
    async fn activate(&self, id: &str, decision: BalanceDecision) -> Result<Mutation<SyncAccount>>;
    /// Returns the amount moved back to safe-to-spend.
    async fn disconnect(&self, id: &str) -> Result<Mutation<i64>>;
    async fn configure_schedule(&self, id: &str, local_times: &[String], timezone: &str) -> Result<SyncAccount>;
    fn get_schedule(&self, id: &str) -> Result<ScheduleView>;
    async fn link_bill(&self, id: &str, bill_id: Option<String>) -> Result<SyncAccount>;
    async fn sync_now(&self, id: &str) -> Result<SyncOutcome>;
    async fn sync_all(&self) -> Result<Vec<SyncRunResult>>;
    /// Moves `|target - pocket balance|` between safe-to-spend and the
    /// account's pocket. Returns the signed delta.
    async fn sync_balance(&self, id: &str, target: i64) -> Result<Mutation<i64>>;
}

/// Called by the scheduler when an account's time comes up.
#[async_trait]
pub trait SyncRunner: Send + Sync {
    async fn run_scheduled(&self, sync_account_id: &str) -> Result<SyncOutcome>;
}
