use async_trait::async_trait;
use diesel::prelude::*;
use diesel::SqliteConnection;
use std::sync::Arc;

use pocketbook_core::ledger::{PocketMeta, PocketMetaRepositoryTrait};
use pocketbook_core::Result;

use super::model::PocketMetaDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::pocket_meta;

pub struct PocketMetaRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl PocketMetaRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl PocketMetaRepositoryTrait for PocketMetaRepository {
    fn list(&self) -> Result<Vec<PocketMeta>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = pocket_meta::table
            .select(PocketMetaDB::as_select())
            .order(pocket_meta::pocket_id.asc())
            .load::<PocketMetaDB>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(PocketMeta::from).collect())
    }

    fn get(&self, pocket_id: &str) -> Result<Option<PocketMeta>> {
        let mut conn = get_connection(&self.pool)?;
        let row = pocket_meta::table
            .find(pocket_id)
            .select(PocketMetaDB::as_select())
            .first::<PocketMetaDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row.map(PocketMeta::from))
    }

    async fn upsert(&self, meta: PocketMeta) -> Result<PocketMeta> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<PocketMeta> {
                let row = PocketMetaDB::from(meta);
                let saved = diesel::insert_into(pocket_meta::table)
                    .values(&row)
                    .on_conflict(pocket_meta::pocket_id)
                    .do_update()
                    .set(&row)
                    .returning(PocketMetaDB::as_returning())
                    .get_result(conn)
                    .map_err(StorageError::from)?;
                Ok(saved.into())
            })
            .await
    }

    async fn delete(&self, pocket_id: &str) -> Result<usize> {
        let pocket_id = pocket_id.to_string();
        self.writer
            .exec(move |conn| {
                Ok(diesel::delete(pocket_meta::table.find(pocket_id))
                    .execute(conn)
                    .map_err(StorageError::from)?)
            })
            .await
    }
}
