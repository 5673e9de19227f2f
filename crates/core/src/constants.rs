/// Default time-to-live for cached gateway reads.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Default bound on any single gateway or provider call.
pub const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 15;

/// Number of transactions requested per page from the bank gateway.
pub const DEFAULT_TRANSACTION_PAGE_SIZE: usize = 100;

/// Alias accepted for the primary (checking) account in transfers.
pub const PRIMARY_ACCOUNT_ALIAS: &str = "checking";

/// Display name used when the gateway does not report one for the primary account.
pub const DEFAULT_FUNDING_SOURCE_NAME: &str = "Checking";

/// Lock key held by every operation that moves money through safe-to-spend.
pub const PRIMARY_LOCK_KEY: &str = "__primary__";

/// Note attached to transfers when the caller does not supply one.
pub const DEFAULT_TRANSFER_NOTE: &str = "Transfer";

/// Default number of credit-account syncs allowed to run at once.
pub const DEFAULT_MAX_CONCURRENT_SYNCS: usize = 4;
