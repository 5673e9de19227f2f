use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use pocketbook_core::{
    cache::CacheConfig,
    constants::{
        DEFAULT_CACHE_TTL_SECS, DEFAULT_GATEWAY_TIMEOUT_SECS, DEFAULT_MAX_CONCURRENT_SYNCS,
        DEFAULT_TRANSACTION_PAGE_SIZE,
    },
    sync::{SchedulerConfig, SyncConfig},
    EngineConfig,
};

/// Where the bank ledger comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BankSource {
    /// Seeded in-memory bank; nothing leaves the process.
    Demo,
    Remote { url: String, token: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    /// Directory holding `pocketbook.db`. `DATABASE_URL` overrides the file.
    pub data_dir: String,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    pub static_dir: String,
    pub bank: BankSource,
    pub simplefin_access_url: Option<String>,
    pub lunchflow_api_key: Option<String>,
    pub lunchflow_api_url: Option<String>,
    pub cache_ttl: Duration,
    pub gateway_timeout: Duration,
    pub transaction_page_size: usize,
    pub max_concurrent_syncs: usize,
    pub scheduler_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            data_dir: "./data".to_string(),
            cors_allow: vec!["*".to_string()],
            request_timeout: Duration::from_millis(30_000),
            static_dir: "dist".to_string(),
            bank: BankSource::Demo,
            simplefin_access_url: None,
            lunchflow_api_key: None,
            lunchflow_api_url: None,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            gateway_timeout: Duration::from_secs(DEFAULT_GATEWAY_TIMEOUT_SECS),
            transaction_page_size: DEFAULT_TRANSACTION_PAGE_SIZE,
            max_concurrent_syncs: DEFAULT_MAX_CONCURRENT_SYNCS,
            scheduler_enabled: true,
        }
    }
}

fn var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn flag(key: &str) -> bool {
    var(key).is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

impl Config {
    /// Reads `PB_*` variables, loading `.env` first when present.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let listen_addr = match var("PB_LISTEN_ADDR") {
            Some(addr) => addr
                .parse()
                .with_context(|| format!("Invalid PB_LISTEN_ADDR '{}'", addr))?,
            None => defaults.listen_addr,
        };
        let cors_allow = var("PB_CORS_ALLOW_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.cors_allow);

        let bank = if flag("PB_DEMO") {
            BankSource::Demo
        } else {
            match (var("PB_BANK_URL"), var("PB_BANK_TOKEN")) {
                (Some(url), Some(token)) => BankSource::Remote { url, token },
                _ => anyhow::bail!("PB_BANK_URL and PB_BANK_TOKEN are required unless PB_DEMO=1"),
            }
        };

        Ok(Self {
            listen_addr,
            data_dir: var("PB_DATA_DIR").unwrap_or(defaults.data_dir),
            cors_allow,
            request_timeout: Duration::from_millis(parse_var("PB_REQUEST_TIMEOUT_MS", 30_000)),
            static_dir: var("PB_STATIC_DIR").unwrap_or(defaults.static_dir),
            bank,
            simplefin_access_url: var("PB_SIMPLEFIN_ACCESS_URL"),
            lunchflow_api_key: var("PB_LUNCHFLOW_API_KEY"),
            lunchflow_api_url: var("PB_LUNCHFLOW_API_URL"),
            cache_ttl: Duration::from_secs(parse_var("PB_CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)),
            gateway_timeout: Duration::from_secs(parse_var(
                "PB_GATEWAY_TIMEOUT_SECS",
                DEFAULT_GATEWAY_TIMEOUT_SECS,
            )),
            transaction_page_size: parse_var("PB_TRANSACTION_PAGE_SIZE", DEFAULT_TRANSACTION_PAGE_SIZE),
            max_concurrent_syncs: parse_var("PB_MAX_CONCURRENT_SYNCS", DEFAULT_MAX_CONCURRENT_SYNCS),
            scheduler_enabled: var("PB_SCHEDULER_ENABLED").map_or(true, |_| flag("PB_SCHEDULER_ENABLED")),
        })
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            cache: CacheConfig {
                gateway_timeout: self.gateway_timeout,
                transaction_page_size: self.transaction_page_size,
                ..CacheConfig::with_ttl(self.cache_ttl)
            },
            scheduler: SchedulerConfig {
                enabled: self.scheduler_enabled,
            },
            sync: SyncConfig {
                provider_timeout: self.gateway_timeout,
                max_concurrent_syncs: self.max_concurrent_syncs,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_config_carries_overrides() {
        let config = Config {
            cache_ttl: Duration::from_secs(60),
            gateway_timeout: Duration::from_secs(5),
            transaction_page_size: 25,
            max_concurrent_syncs: 2,
            scheduler_enabled: false,
            ..Config::default()
        };

        let engine = config.engine_config();

        assert_eq!(engine.cache.snapshot_ttl, Duration::from_secs(60));
        assert_eq!(engine.cache.bills_ttl, Duration::from_secs(60));
        assert_eq!(engine.cache.gateway_timeout, Duration::from_secs(5));
        assert_eq!(engine.cache.transaction_page_size, 25);
        assert_eq!(engine.sync.max_concurrent_syncs, 2);
        assert!(!engine.scheduler.enabled);
    }
}
