//! Ledger of bank transactions already applied to a reservation, so a
//! re-fetched transaction never releases money twice.

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use std::sync::Arc;

use pocketbook_core::bills::ReconciliationRepositoryTrait;
use pocketbook_core::Result;

use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::reconciled_transactions;

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = reconciled_transactions)]
struct NewReconciledDB {
    scope: String,
    transaction_id: String,
    amount: i64,
    reconciled_at: NaiveDateTime,
}

pub struct ReconciliationRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl ReconciliationRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl ReconciliationRepositoryTrait for ReconciliationRepository {
    fn is_reconciled(&self, scope: &str, transaction_id: &str) -> Result<bool> {
        let mut conn = get_connection(&self.pool)?;
        let count: i64 = reconciled_transactions::table
            .filter(reconciled_transactions::scope.eq(scope))
            .filter(reconciled_transactions::transaction_id.eq(transaction_id))
            .count()
            .get_result(&mut conn)
            .map_err(StorageError::from)?;
        Ok(count > 0)
    }

    fn list_reconciled(&self, scope: &str) -> Result<Vec<String>> {
        let mut conn = get_connection(&self.pool)?;
        let ids = reconciled_transactions::table
            .filter(reconciled_transactions::scope.eq(scope))
            .select(reconciled_transactions::transaction_id)
            .order(reconciled_transactions::reconciled_at.asc())
            .load::<String>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(ids)
    }

    /// Returns `true` only for the call that recorded the pair.
    async fn mark_reconciled(&self, scope: &str, transaction_id: &str, amount: i64) -> Result<bool> {
        let row = NewReconciledDB {
            scope: scope.to_string(),
            transaction_id: transaction_id.to_string(),
            amount,
            reconciled_at: Utc::now().naive_utc(),
        };
        self.writer
            .exec(move |conn| {
                let inserted = diesel::insert_or_ignore_into(reconciled_transactions::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(inserted == 1)
            })
            .await
    }

    async fn unmark(&self, scope: &str, transaction_id: &str) -> Result<usize> {
        let scope = scope.to_string();
        let transaction_id = transaction_id.to_string();
        self.writer
            .exec(move |conn| {
                Ok(diesel::delete(
                    reconciled_transactions::table
                        .filter(reconciled_transactions::scope.eq(scope))
                        .filter(reconciled_transactions::transaction_id.eq(transaction_id)),
                )
                .execute(conn)
                .map_err(StorageError::from)?)
            })
            .await
    }

    async fn clear_scope(&self, scope: &str) -> Result<usize> {
        let scope = scope.to_string();
        self.writer
            .exec(move |conn| {
                Ok(
                    diesel::delete(reconciled_transactions::table.filter(reconciled_transactions::scope.eq(scope)))
                        .execute(conn)
                        .map_err(StorageError::from)?,
                )
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::test_db;

    #[tokio::test]
    async fn test_mark_is_recorded_once_per_scope() {
        let (pool, writer, _dir) = test_db();
        let repo = ReconciliationRepository::new(pool, writer);

        assert!(repo.mark_reconciled("bill:rent", "tx-1", 150_000).await.unwrap());
        assert!(!repo.mark_reconciled("bill:rent", "tx-1", 150_000).await.unwrap());
        assert!(repo.mark_reconciled("bill:phone", "tx-1", 6_000).await.unwrap());

        assert!(repo.is_reconciled("bill:rent", "tx-1").unwrap());
        assert!(!repo.is_reconciled("bill:rent", "tx-2").unwrap());
        assert_eq!(repo.list_reconciled("bill:rent").unwrap(), vec!["tx-1".to_string()]);
    }

    #[tokio::test]
    async fn test_unmark_and_clear_scope() {
        let (pool, writer, _dir) = test_db();
        let repo = ReconciliationRepository::new(pool, writer);
        repo.mark_reconciled("bill:rent", "tx-1", 1).await.unwrap();
        repo.mark_reconciled("bill:rent", "tx-2", 1).await.unwrap();
        repo.mark_reconciled("bill:gym", "tx-3", 1).await.unwrap();

        assert_eq!(repo.unmark("bill:rent", "tx-1").await.unwrap(), 1);
        assert!(!repo.is_reconciled("bill:rent", "tx-1").unwrap());
        assert_eq!(repo.clear_scope("bill:rent").await.unwrap(), 1);
        assert!(repo.list_reconciled("bill:rent").unwrap().is_empty());
        assert!(repo.is_reconciled("bill:gym", "tx-3").unwrap());
    }
}
