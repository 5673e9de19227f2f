//! SQLite storage for the Pocketbook engine.
//!
//! Implements the repository traits defined in `pocketbook-core` for the
//! state the bank does not hold: pocket metadata, credit-sync records,
//! reconciled transactions and the daily balance history.
//!
//! ```text
//! core (domain)          connect (remote APIs)
//!       │
//!       ▼
//! storage-sqlite (this crate)
//!       │
//!       ▼
//!   SQLite DB
//! ```
//!
//! Reads use pooled connections; every write goes through the single
//! writer actor so SQLite never sees concurrent writers.

pub mod db;
pub mod errors;
pub mod schema;

pub mod history;
pub mod pockets;
pub mod reconciliations;
pub mod sync_accounts;

pub use db::{create_pool, get_connection, get_db_path, init, open, run_migrations, DbConnection, DbPool, WriteHandle};
pub use errors::{IntoCore, StorageError};

pub use history::BalanceHistoryRepository;
pub use pockets::PocketMetaRepository;
pub use reconciliations::ReconciliationRepository;
pub use sync_accounts::SyncAccountRepository;

pub use pocketbook_core::errors::{DatabaseError, Error, Result};
