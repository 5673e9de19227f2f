use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use diesel::prelude::*;
use std::sync::Arc;

use pocketbook_core::reports::{BalanceHistoryPoint, BalanceHistoryRepositoryTrait};
use pocketbook_core::Result;

use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::balance_history;

#[derive(Queryable, Selectable, Insertable, AsChangeset, Debug, Clone)]
#[diesel(table_name = balance_history)]
#[diesel(primary_key(date))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
struct BalanceHistoryDB {
    date: NaiveDate,
    balance: i64,
    recorded_at: NaiveDateTime,
}

impl From<BalanceHistoryDB> for BalanceHistoryPoint {
    fn from(db: BalanceHistoryDB) -> Self {
        Self {
            date: db.date,
            balance: db.balance,
        }
    }
}

/// One balance per day; a later refresh on the same day overwrites it.
pub struct BalanceHistoryRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl BalanceHistoryRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl BalanceHistoryRepositoryTrait for BalanceHistoryRepository {
    fn list(&self) -> Result<Vec<BalanceHistoryPoint>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = balance_history::table
            .select(BalanceHistoryDB::as_select())
            .order(balance_history::date.asc())
            .load::<BalanceHistoryDB>(&mut conn)
            .into_core()?;
        Ok(rows.into_iter().map(BalanceHistoryPoint::from).collect())
    }

    async fn upsert(&self, point: BalanceHistoryPoint) -> Result<BalanceHistoryPoint> {
        let row = BalanceHistoryDB {
            date: point.date,
            balance: point.balance,
            recorded_at: Utc::now().naive_utc(),
        };
        self.writer
            .exec(move |conn| {
                diesel::insert_into(balance_history::table)
                    .values(&row)
                    .on_conflict(balance_history::date)
                    .do_update()
                    .set(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(point)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::test_db;

    fn point(day: u32, balance: i64) -> BalanceHistoryPoint {
        BalanceHistoryPoint {
            date: NaiveDate::from_ymd_opt(2025, 9, day).unwrap(),
            balance,
        }
    }

    #[tokio::test]
    async fn test_one_point_per_day_sorted_by_date() {
        let (pool, writer, _dir) = test_db();
        let repo = BalanceHistoryRepository::new(pool, writer);

        repo.upsert(point(16, 50_000)).await.unwrap();
        repo.upsert(point(14, 42_000)).await.unwrap();
        repo.upsert(point(16, 51_250)).await.unwrap();

        assert_eq!(repo.list().unwrap(), vec![point(14, 42_000), point(16, 51_250)]);
    }
}
