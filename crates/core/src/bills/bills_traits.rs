use async_trait::async_trait;

use super::bills_model::{Bill, BillReserveSummary, BillsOverview, CreatedBill, FundingReport, NewBill, ReconciliationReport};
use crate::changes::Mutation;
use crate::errors::Result;
use crate::gateway::Transaction;

/// Remembers which transactions were already applied, per scope
/// (`bill:<id>` for bills, `sync:<id>` for credit accounts).
#[async_trait]
pub trait ReconciliationRepositoryTrait: Send + Sync {
    fn is_reconciled(&self, scope: &str, transaction_id: &str) -> Result<bool>;
    fn list_reconciled(&self, scope: &str) -> Result<Vec<String>>;
    /// Returns `false` when the pair was already recorded.
    async fn mark_reconciled(&self, scope: &str, transaction_id: &str, amount: i64) -> Result<bool>;
    async fn unmark(&self, scope: &str, transaction_id: &str) -> Result<usize>;
    async fn clear_scope(&self, scope: &str) -> Result<usize>;
}

/// Trait for bill service operations
#[async_trait]
pub trait BillServiceTrait: Send + Sync {
    async fn list_bills(&self, force: bool) -> Result<Vec<Bill>>;
    async fn bills_overview(&self, force: bool) -> Result<BillsOverview>;
    async fn bill_reserve_summary(&self, force: bool) -> Result<BillReserveSummary>;
    async fn create_bill(&self, new_bill: NewBill) -> Result<Mutation<CreatedBill>>;
    /// Returns the amount moved back to safe-to-spend.
    async fn delete_bill(&self, bill_id: &str) -> Result<Mutation<i64>>;
    async fn fund_bills(&self) -> Result<Mutation<FundingReport>>;
    /// Applies matching posted debits to bill pockets. `only_bill` limits
    /// matching to one bill.
    async fn reconcile_transactions(
        &self,
        transactions: &[Transaction],
        only_bill: Option<&str>,
    ) -> Result<Mutation<ReconciliationReport>>;
}

pub fn bill_scope(bill_id: &str) -> String {
    format!("bill:{}", bill_id)
}
