use async_trait::async_trait;

use super::cards_model::{Card, SpendPocketChange};
use crate::changes::Mutation;
use crate::errors::Result;

#[async_trait]
pub trait CardServiceTrait: Send + Sync {
    async fn list_cards(&self, force: bool) -> Result<Vec<Card>>;

    /// Returns the holder's cards as they read after the change.
    async fn set_spend_pocket(&self, change: SpendPocketChange) -> Result<Mutation<Vec<Card>>>;
}
