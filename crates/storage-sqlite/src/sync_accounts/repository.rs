use async_trait::async_trait;
use diesel::prelude::*;
use diesel::SqliteConnection;
use std::sync::Arc;

use pocketbook_core::errors::Error;
use pocketbook_core::sync::{SyncAccount, SyncAccountRepositoryTrait};
use pocketbook_core::Result;

use super::model::SyncAccountDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::sync_accounts;

pub struct SyncAccountRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl SyncAccountRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl SyncAccountRepositoryTrait for SyncAccountRepository {
    fn list(&self) -> Result<Vec<SyncAccount>> {
        let mut conn = get_connection(&self.pool)?;
        sync_accounts::table
            .select(SyncAccountDB::as_select())
            .order(sync_accounts::created_at.asc())
            .load::<SyncAccountDB>(&mut conn)
            .map_err(StorageError::from)?
            .into_iter()
            .map(SyncAccount::try_from)
            .collect()
    }

    fn get(&self, id: &str) -> Result<Option<SyncAccount>> {
        let mut conn = get_connection(&self.pool)?;
        sync_accounts::table
            .find(id)
            .select(SyncAccountDB::as_select())
            .first::<SyncAccountDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?
            .map(SyncAccount::try_from)
            .transpose()
    }

    async fn insert(&self, account: SyncAccount) -> Result<SyncAccount> {
        let row = SyncAccountDB::try_from(account)?;
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<SyncAccount> {
                let saved = diesel::insert_into(sync_accounts::table)
                    .values(&row)
                    .returning(SyncAccountDB::as_returning())
                    .get_result(conn)
                    .map_err(StorageError::from)?;
                SyncAccount::try_from(saved)
            })
            .await
    }

    async fn update(&self, account: SyncAccount) -> Result<SyncAccount> {
        let row = SyncAccountDB::try_from(account)?;
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<SyncAccount> {
                let saved = diesel::update(sync_accounts::table.find(row.id.clone()))
                    .set(&row)
                    .returning(SyncAccountDB::as_returning())
                    .get_result(conn)
                    .optional()
                    .map_err(StorageError::from)?
                    .ok_or_else(|| Error::NotFound(format!("sync account {}", row.id)))?;
                SyncAccount::try_from(saved)
            })
            .await
    }

    async fn delete(&self, id: &str) -> Result<usize> {
        let id = id.to_string();
        self.writer
            .exec(move |conn| {
                Ok(diesel::delete(sync_accounts::table.find(id))
                    .execute(conn)
                    .map_err(StorageError::from)?)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::test_db;
    use chrono::{TimeZone, Utc};
    use pocketbook_core::errors::DatabaseError;
    use pocketbook_core::sync::{ProviderKind, SyncState};

    fn account(remote_id: &str) -> SyncAccount {
        let now = Utc.with_ymd_and_hms(2025, 9, 16, 8, 30, 0).unwrap();
        SyncAccount::new(ProviderKind::SimpleFin, remote_id.to_string(), "Visa".to_string(), now)
    }

    #[tokio::test]
    async fn test_insert_update_delete() {
        let (pool, writer, _dir) = test_db();
        let repo = SyncAccountRepository::new(pool, writer);

        let mut stored = repo.insert(account("card-1")).await.unwrap();
        assert_eq!(repo.get(&stored.id).unwrap(), Some(stored.clone()));

        stored.state = SyncState::Active;
        stored.pocket_id = Some("pocket-7".to_string());
        stored.pending_balance = None;
        stored.last_error = Some("timed out".to_string());
        let updated = repo.update(stored.clone()).await.unwrap();
        assert_eq!(updated, stored);

        stored.last_error = None;
        repo.update(stored.clone()).await.unwrap();
        assert_eq!(repo.get(&stored.id).unwrap().unwrap().last_error, None);

        assert_eq!(repo.delete(&stored.id).await.unwrap(), 1);
        assert!(repo.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remote_account_is_unique_per_provider() {
        let (pool, writer, _dir) = test_db();
        let repo = SyncAccountRepository::new(pool, writer);
        repo.insert(account("card-1")).await.unwrap();

        let err = repo.insert(account("card-1")).await.unwrap_err();

        assert!(matches!(err, Error::Database(DatabaseError::UniqueViolation(_))));
    }

    #[tokio::test]
    async fn test_update_missing_account_is_not_found() {
        let (pool, writer, _dir) = test_db();
        let repo = SyncAccountRepository::new(pool, writer);

        let err = repo.update(account("card-9")).await.unwrap_err();

        assert!(matches!(err, Error::NotFound(_)));
    }
}
