use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use super::reports_model::{BalanceHistoryPoint, MonthlyTrends, TransactionFilter};
use super::reports_traits::{BalanceHistoryRepositoryTrait, ReportServiceTrait};
use crate::cache::CachedGateway;
use crate::errors::{Error, Result, ValidationError};
use crate::gateway::{AccountSnapshot, Transaction, TransactionDetail};
use crate::utils::clock::Clock;
use crate::utils::time_utils::start_of_month;

pub struct ReportService {
    gateway: Arc<CachedGateway>,
    history: Arc<dyn BalanceHistoryRepositoryTrait>,
    clock: Arc<dyn Clock>,
}

impl ReportService {
    pub fn new(
        gateway: Arc<CachedGateway>,
        history: Arc<dyn BalanceHistoryRepositoryTrait>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { gateway, history, clock }
    }
}

#[async_trait]
impl ReportServiceTrait for ReportService {
    async fn list_transactions(&self, filter: &TransactionFilter, force: bool) -> Result<Vec<Transaction>> {
        let transactions = self.gateway.transactions(force).await?;
        let mut matched: Vec<Transaction> = transactions.iter().filter(|t| filter.matches(t)).cloned().collect();
        matched.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(matched)
    }

    async fn transaction_detail(&self, transaction_id: &str, force: bool) -> Result<TransactionDetail> {
        let transaction_id = transaction_id.trim();
        if transaction_id.is_empty() {
            return Err(ValidationError::MissingField("transactionId".to_string()).into());
        }
        self.gateway
            .transaction_detail(transaction_id, force)
            .await?
            .map(|detail| detail.as_ref().clone())
            .ok_or_else(|| Error::NotFound(format!("Transaction {} not found", transaction_id)))
    }

    async fn monthly_trends(&self, force: bool) -> Result<MonthlyTrends> {
        let today = self.clock.today();
        let month_start = start_of_month(today);
        let transactions = self.gateway.transactions(force).await?;

        let mut trends = MonthlyTrends {
            month_start: Some(month_start),
            ..Default::default()
        };
        for tx in transactions.iter().filter(|t| t.date >= month_start && t.date <= today) {
            if tx.amount > 0 {
                trends.earned += tx.amount;
            } else {
                trends.spent += -tx.amount;
            }
            trends.transaction_count += 1;
        }
        trends.net = trends.earned - trends.spent;
        Ok(trends)
    }

    fn balance_history(&self) -> Result<Vec<BalanceHistoryPoint>> {
        let mut points = self.history.list()?;
        points.sort_by_key(|p| p.date);
        Ok(points)
    }

    async fn record_balance(&self, snapshot: &AccountSnapshot) -> Result<BalanceHistoryPoint> {
        let point = BalanceHistoryPoint {
            date: self.clock.today(),
            balance: snapshot.balance,
        };
        debug!("Recording balance {} for {}", point.balance, point.date);
        self.history.upsert(point).await
    }
}
