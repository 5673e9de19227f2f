use async_trait::async_trait;

use super::ledger_model::{LedgerSnapshot, NewPocket, Pocket, PocketMeta};
use crate::changes::Mutation;
use crate::errors::Result;

/// Trait for pocket metadata repository operations
#[async_trait]
pub trait PocketMetaRepositoryTrait: Send + Sync {
    fn list(&self) -> Result<Vec<PocketMeta>>;
    fn get(&self, pocket_id: &str) -> Result<Option<PocketMeta>>;
    async fn upsert(&self, meta: PocketMeta) -> Result<PocketMeta>;
    async fn delete(&self, pocket_id: &str) -> Result<usize>;
}

/// Trait for ledger service operations
#[async_trait]
pub trait LedgerServiceTrait: Send + Sync {
    async fn get_snapshot(&self, force: bool) -> Result<LedgerSnapshot>;
    async fn get_pockets(&self, force: bool) -> Result<Vec<Pocket>>;
    async fn get_safe_to_spend(&self, force: bool) -> Result<i64>;
    async fn create_pocket(&self, new_pocket: NewPocket) -> Result<Mutation<Pocket>>;
    /// Returns the amount moved back to safe-to-spend.
    async fn delete_pocket(&self, pocket_id: &str) -> Result<Mutation<i64>>;
    async fn update_pocket_group(&self, pocket_id: &str, group_id: Option<String>) -> Result<Mutation<Pocket>>;
    async fn verify_invariant(&self) -> Result<LedgerSnapshot>;
    async fn reconcile_halt(&self) -> Result<LedgerSnapshot>;
    fn halt_reason(&self) -> Option<String>;
}
