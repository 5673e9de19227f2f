use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use pocketbook_core::ledger::PocketMeta;

/// Local metadata the bank does not store for a pocket.
#[derive(Queryable, Selectable, Insertable, AsChangeset, Identifiable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::pocket_meta)]
#[diesel(primary_key(pocket_id))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PocketMetaDB {
    pub pocket_id: String,
    pub group_id: Option<String>,
    pub is_credit_card: bool,
    pub updated_at: NaiveDateTime,
}

impl From<PocketMetaDB> for PocketMeta {
    fn from(db: PocketMetaDB) -> Self {
        Self {
            pocket_id: db.pocket_id,
            group_id: db.group_id,
            is_credit_card: db.is_credit_card,
        }
    }
}

impl From<PocketMeta> for PocketMetaDB {
    fn from(meta: PocketMeta) -> Self {
        Self {
            pocket_id: meta.pocket_id,
            group_id: meta.group_id,
            is_credit_card: meta.is_credit_card,
            updated_at: Utc::now().naive_utc(),
        }
    }
}
