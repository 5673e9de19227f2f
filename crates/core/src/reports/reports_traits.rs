use async_trait::async_trait;

use super::reports_model::{BalanceHistoryPoint, MonthlyTrends, TransactionFilter};
use crate::errors::Result;
use crate::gateway::{AccountSnapshot, Transaction, TransactionDetail};

/// Trait for balance history repository operations
#[async_trait]
pub trait BalanceHistoryRepositoryTrait: Send + Sync {
    /// All points, oldest first.
    fn list(&self) -> Result<Vec<BalanceHistoryPoint>>;
    /// Inserts or replaces the point for `point.date`.
    async fn upsert(&self, point: BalanceHistoryPoint) -> Result<BalanceHistoryPoint>;
}

/// Trait for reporting operations
#[async_trait]
pub trait ReportServiceTrait: Send + Sync {
    async fn list_transactions(&self, filter: &TransactionFilter, force: bool) -> Result<Vec<Transaction>>;
    /// One transaction with merchant data; `NotFound` when the bank has no
    /// record of it.
    async fn transaction_detail(&self, transaction_id: &str, force: bool) -> Result<TransactionDetail>;
    async fn monthly_trends(&self, force: bool) -> Result<MonthlyTrends>;
    fn balance_history(&self) -> Result<Vec<BalanceHistoryPoint>>;
    /// Records today's point from a freshly fetched snapshot.
    async fn record_balance(&self, snapshot: &AccountSnapshot) -> Result<BalanceHistoryPoint>;
}
