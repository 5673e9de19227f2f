use async_trait::async_trait;

use super::gateway_model::{
    AccountSnapshot, BillRecord, DebitCard, MoveMoneyRequest, NewBillRequest, NewPocketRequest,
    SpendSubaccountRequest, Subaccount, Transaction, TransactionDetail,
};
use crate::errors::GatewayError;

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Contract to the external bank that owns the real account.
///
/// Reads are idempotent and safe to cache. Every mutating call performs its
/// whole effect in one remote request (a transfer debits and credits
/// together; pocket and bill creation fund the new pocket in the same call).
#[async_trait]
pub trait BankGateway: Send + Sync {
    /// Service name used in errors and logs.
    fn name(&self) -> &str;

    async fn get_account_balance(&self) -> GatewayResult<i64>;

    async fn list_subaccounts(&self) -> GatewayResult<Vec<Subaccount>>;

    /// Balance and sub-accounts together. Implementations that can read both
    /// in one request should override this.
    async fn fetch_snapshot(&self) -> GatewayResult<AccountSnapshot> {
        let (balance, subaccounts) =
            futures::try_join!(self.get_account_balance(), self.list_subaccounts())?;
        Ok(AccountSnapshot {
            balance,
            subaccounts,
            fetched_at: chrono::Utc::now(),
        })
    }

    async fn list_transactions(&self, page_size: usize) -> GatewayResult<Vec<Transaction>>;

    async fn move_money(&self, request: MoveMoneyRequest) -> GatewayResult<()>;

    async fn create_pocket(&self, request: NewPocketRequest) -> GatewayResult<Subaccount>;

    async fn delete_pocket(&self, pocket_id: &str) -> GatewayResult<()>;

    async fn list_bills(&self) -> GatewayResult<Vec<BillRecord>>;

    async fn create_bill(&self, request: NewBillRequest) -> GatewayResult<BillRecord>;

    async fn delete_bill(&self, bill_id: &str) -> GatewayResult<()>;

    /// Display name of the account bills are funded from.
    async fn funding_source_name(&self) -> GatewayResult<String>;

    /// `None` when the bank does not know the transaction.
    async fn transaction_detail(&self, transaction_id: &str) -> GatewayResult<Option<TransactionDetail>>;

    async fn list_debit_cards(&self) -> GatewayResult<Vec<DebitCard>>;

    /// Points every card of `request.user_id` at another sub-account.
    async fn set_spend_subaccount(&self, request: SpendSubaccountRequest) -> GatewayResult<()>;
}
