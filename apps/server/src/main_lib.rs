use std::sync::Arc;

use crate::{
    config::{BankSource, Config},
    domain_events::WebDomainEventSink,
};
use pocketbook_connect::{
    BankGatewayConfig, GraphQlBankGateway, LunchFlowProvider, SimpleFinProvider, DEFAULT_LUNCHFLOW_API_URL,
};
use pocketbook_core::{
    gateway::{BankGateway, InMemoryBank},
    sync::ProviderRegistry,
    utils::{Clock, SystemClock},
    Engine, EngineDeps,
};
use pocketbook_storage_sqlite::{
    db, BalanceHistoryRepository, PocketMetaRepository, ReconciliationRepository, SyncAccountRepository,
};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub struct AppState {
    pub engine: Arc<Engine>,
    pub db_path: String,
    pub demo: bool,
}

pub fn init_tracing() {
    let log_format = std::env::var("PB_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

fn build_gateway(config: &Config, clock: Arc<dyn Clock>) -> anyhow::Result<Arc<dyn BankGateway>> {
    Ok(match &config.bank {
        BankSource::Demo => {
            tracing::warn!("Demo mode: using the seeded in-memory bank");
            Arc::new(InMemoryBank::demo(clock))
        }
        BankSource::Remote { url, token } => {
            let mut bank_config = BankGatewayConfig::new(url.clone(), token.clone());
            bank_config.timeout = config.gateway_timeout;
            Arc::new(GraphQlBankGateway::new(bank_config)?)
        }
    })
}

fn build_providers(config: &Config) -> anyhow::Result<ProviderRegistry> {
    let mut providers = ProviderRegistry::new();
    if let Some(access_url) = &config.simplefin_access_url {
        providers.register(Arc::new(SimpleFinProvider::with_timeout(
            access_url,
            config.gateway_timeout,
        )?));
    }
    if let Some(api_key) = &config.lunchflow_api_key {
        let base_url = config
            .lunchflow_api_url
            .as_deref()
            .unwrap_or(DEFAULT_LUNCHFLOW_API_URL);
        providers.register(Arc::new(LunchFlowProvider::with_base_url(
            base_url,
            api_key,
            config.gateway_timeout,
        )?));
    }
    tracing::info!("Credit providers configured: {:?}", providers.kinds());
    Ok(providers)
}

pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let (pool, writer) = db::open(&config.data_dir)?;
    let db_path = db::get_db_path(&config.data_dir);
    tracing::info!("Database path in use: {}", db_path);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let gateway = build_gateway(config, clock.clone())?;
    let providers = build_providers(config)?;

    // Phase 1: the sink buffers events until the worker starts.
    let event_sink = Arc::new(WebDomainEventSink::new());

    let engine = Engine::new(
        config.engine_config(),
        EngineDeps {
            gateway,
            pocket_metas: Arc::new(PocketMetaRepository::new(pool.clone(), writer.clone())),
            reconciliations: Arc::new(ReconciliationRepository::new(pool.clone(), writer.clone())),
            sync_accounts: Arc::new(SyncAccountRepository::new(pool.clone(), writer.clone())),
            history: Arc::new(BalanceHistoryRepository::new(pool, writer)),
            providers,
            event_sink: event_sink.clone(),
            clock,
        },
    );

    // Phase 2: the worker needs the engine it reports into.
    event_sink.start_worker(&engine);
    engine.start()?;

    Ok(Arc::new(AppState {
        engine,
        db_path,
        demo: config.bank == BankSource::Demo,
    }))
}
