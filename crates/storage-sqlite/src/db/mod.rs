use log::{error, info};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use diesel::connection::{Connection, SimpleConnection};
use diesel::r2d2::{self, ConnectionManager, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use pocketbook_core::errors::{DatabaseError, Error, Result};

use crate::errors::{IntoCore, StorageError};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

pub type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;
pub type DbConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

pub mod write_actor;
pub use write_actor::{spawn_writer, WriteHandle};

/// Creates the database file (and its directory) and switches it to WAL.
///
/// Returns the resolved database path.
pub fn init(app_data_dir: &str) -> Result<String> {
    let db_path = get_db_path(app_data_dir);

    if let Some(db_dir) = Path::new(&db_path).parent() {
        if !db_dir.as_os_str().is_empty() && !db_dir.exists() {
            fs::create_dir_all(db_dir).map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "cannot create {}: {}",
                    db_dir.display(),
                    e
                )))
            })?;
        }
    }

    let mut conn = SqliteConnection::establish(&db_path).map_err(StorageError::from)?;
    conn.batch_execute(
        "
            PRAGMA journal_mode = WAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 30000;
            PRAGMA synchronous  = NORMAL;
        ",
    )
    .map_err(StorageError::from)?;

    Ok(db_path)
}

pub fn create_pool(db_path: &str) -> Result<Arc<DbPool>> {
    let manager = ConnectionManager::<SqliteConnection>::new(db_path);
    let pool = r2d2::Pool::builder()
        .max_size(8)
        .min_idle(Some(1))
        .connection_timeout(std::time::Duration::from_secs(30))
        .connection_customizer(Box::new(ConnectionCustomizer))
        .build(manager)
        .map_err(|e| Error::Database(DatabaseError::PoolCreationFailed(e.to_string())))?;
    Ok(Arc::new(pool))
}

pub fn run_migrations(pool: &DbPool) -> Result<()> {
    info!("Running database migrations");
    let mut connection = get_connection(pool)?;

    let result = connection.run_pending_migrations(MIGRATIONS).map_err(|e| {
        error!("Database migration failed: {}", e);
        Error::Database(DatabaseError::MigrationFailed(e.to_string()))
    })?;

    if result.is_empty() {
        info!("No pending migrations to apply.");
    } else {
        info!("Applied the following migrations:");
        for migration_version in &result {
            info!("  - {}", migration_version);
        }
    }

    Ok(())
}

/// `DATABASE_URL` wins over the data directory.
pub fn get_db_path(app_data_dir: &str) -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| {
        Path::new(app_data_dir)
            .join("pocketbook.db")
            .to_string_lossy()
            .into_owned()
    })
}

pub fn get_connection(pool: &Pool<ConnectionManager<SqliteConnection>>) -> Result<DbConnection> {
    pool.get().into_core()
}

/// Opens the database, applies migrations and starts the writer.
pub fn open(app_data_dir: &str) -> Result<(Arc<DbPool>, WriteHandle)> {
    let db_path = init(app_data_dir)?;
    let pool = create_pool(&db_path)?;
    run_migrations(&pool)?;
    let writer = spawn_writer((*pool).clone())?;
    Ok((pool, writer))
}

#[derive(Debug)]
struct ConnectionCustomizer;

impl r2d2::CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionCustomizer {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), r2d2::Error> {
        conn.batch_execute(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 30000;
            PRAGMA synchronous = NORMAL;
        ",
        )
        .map_err(r2d2::Error::QueryError)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Migrated pool plus writer over a throwaway file. Keep the `TempDir`
    /// alive for the duration of the test.
    pub fn test_db() -> (Arc<DbPool>, WriteHandle, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db").to_string_lossy().to_string();
        let pool = create_pool(&db_path).expect("Failed to create pool");
        run_migrations(&pool).expect("Failed to run migrations");
        let writer = spawn_writer((*pool).clone()).expect("Failed to start writer");
        (pool, writer, temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::test_db;
    use super::*;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let (pool, _writer, _dir) = test_db();
        run_migrations(&pool).unwrap();
    }

    #[tokio::test]
    async fn test_failed_job_rolls_back() {
        use diesel::{QueryDsl, RunQueryDsl};

        let (pool, writer, _dir) = test_db();
        let result: Result<()> = writer
            .exec(|conn| {
                diesel::sql_query("INSERT INTO balance_history (date, balance) VALUES ('2025-09-16', 100)")
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Err(Error::Unexpected("abort".to_string()))
            })
            .await;
        assert!(matches!(result, Err(Error::Unexpected(_))));

        let mut conn = get_connection(&pool).unwrap();
        let rows: i64 = crate::schema::balance_history::table
            .count()
            .get_result(&mut conn)
            .unwrap();
        assert_eq!(rows, 0);
    }
}
