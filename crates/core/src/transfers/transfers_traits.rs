use async_trait::async_trait;

use super::transfers_model::{TransferReceipt, TransferRequest};
use crate::changes::Mutation;
use crate::errors::Result;

#[async_trait]
pub trait TransferServiceTrait: Send + Sync {
    /// Moves money with a single gateway call. Not de-duplicated: every call
    /// is a new movement.
    async fn transfer(&self, request: TransferRequest) -> Result<Mutation<TransferReceipt>>;
}
