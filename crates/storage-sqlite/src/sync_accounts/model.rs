use chrono::{NaiveDateTime, TimeZone, Utc};
use diesel::prelude::*;

use pocketbook_core::errors::Error;
use pocketbook_core::sync::{SyncAccount, SyncSchedule, TimeOfDay};

use crate::errors::StorageError;

#[derive(Queryable, Selectable, Insertable, AsChangeset, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::sync_accounts)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[diesel(treat_none_as_null = true)]
pub struct SyncAccountDB {
    pub id: String,
    pub provider: String,
    pub remote_account_id: String,
    pub name: String,
    pub state: String,
    pub pending_balance: Option<i64>,
    pub pocket_id: Option<String>,
    pub linked_bill_id: Option<String>,
    /// JSON array of "HH:MM" UTC times
    pub schedule_times: String,
    pub schedule_timezone: String,
    pub last_synced_at: Option<NaiveDateTime>,
    pub last_error: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl TryFrom<SyncAccount> for SyncAccountDB {
    type Error = StorageError;

    fn try_from(account: SyncAccount) -> Result<Self, Self::Error> {
        Ok(Self {
            schedule_times: serde_json::to_string(&account.schedule.times)?,
            id: account.id,
            provider: account.provider.as_str().to_string(),
            remote_account_id: account.remote_account_id,
            name: account.name,
            state: account.state.as_str().to_string(),
            pending_balance: account.pending_balance,
            pocket_id: account.pocket_id,
            linked_bill_id: account.linked_bill_id,
            schedule_timezone: account.schedule.timezone,
            last_synced_at: account.last_synced_at.map(|t| t.naive_utc()),
            last_error: account.last_error,
            created_at: account.created_at.naive_utc(),
            updated_at: account.updated_at.naive_utc(),
        })
    }
}

impl TryFrom<SyncAccountDB> for SyncAccount {
    type Error = Error;

    fn try_from(db: SyncAccountDB) -> Result<Self, Self::Error> {
        let times: Vec<TimeOfDay> =
            serde_json::from_str(&db.schedule_times).map_err(StorageError::from)?;
        Ok(Self {
            id: db.id,
            provider: db.provider.parse()?,
            remote_account_id: db.remote_account_id,
            name: db.name,
            state: db.state.parse()?,
            pending_balance: db.pending_balance,
            pocket_id: db.pocket_id,
            linked_bill_id: db.linked_bill_id,
            schedule: SyncSchedule {
                times,
                timezone: db.schedule_timezone,
            },
            last_synced_at: db.last_synced_at.map(|t| Utc.from_utc_datetime(&t)),
            last_error: db.last_error,
            created_at: Utc.from_utc_datetime(&db.created_at),
            updated_at: Utc.from_utc_datetime(&db.updated_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pocketbook_core::sync::{ProviderKind, SyncState};

    #[test]
    fn test_sync_account_row_conversion_keeps_schedule() {
        let now = Utc.with_ymd_and_hms(2025, 9, 16, 12, 0, 0).unwrap();
        let mut account = SyncAccount::new(ProviderKind::LunchFlow, "acct-9".to_string(), "Amex".to_string(), now);
        account.state = SyncState::Active;
        account.schedule = SyncSchedule {
            times: vec!["11:00".parse().unwrap(), "23:00".parse().unwrap()],
            timezone: "America/New_York".to_string(),
        };

        let row = SyncAccountDB::try_from(account.clone()).unwrap();
        assert_eq!(row.provider, "lunchflow");
        assert_eq!(row.state, "ACTIVE");
        assert_eq!(row.schedule_times, r#"["11:00","23:00"]"#);

        assert_eq!(SyncAccount::try_from(row).unwrap(), account);
    }

    #[test]
    fn test_corrupt_state_is_rejected() {
        let now = Utc.with_ymd_and_hms(2025, 9, 16, 12, 0, 0).unwrap();
        let account = SyncAccount::new(ProviderKind::SimpleFin, "a".to_string(), "Visa".to_string(), now);
        let mut row = SyncAccountDB::try_from(account).unwrap();
        row.state = "SOMETHING".to_string();

        assert!(SyncAccount::try_from(row).is_err());
    }
}
