use std::sync::Arc;
use pocketbook_core::ledger::LedgerServiceTrait;

use crate::{config::Config, main_lib::AppState};
use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

mod bills;
mod cards;
mod ledger;
mod reports;
mod sync;

/// `?refresh=true` bypasses the cache for read endpoints.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RefreshQuery {
    #[serde(default)]
    pub refresh: bool,
}

pub async fn healthz() -> &'static str {
    "ok"
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServerStatus {
    demo: bool,
    db_path: String,
    ledger_halted: Option<String>,
    scheduler_running: bool,
    scheduled_accounts: usize,
}

async fn get_status(State(state): State<Arc<AppState>>) -> Json<ServerStatus> {
    let engine = &state.engine;
    Json(ServerStatus {
        demo: state.demo,
        db_path: state.db_path.clone(),
        ledger_halted: engine.ledger().halt_reason(),
        scheduler_running: engine.scheduler().is_running(),
        scheduled_accounts: engine.scheduler().armed().len(),
    })
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.cors_allow.iter().any(|o| o == "*") {
        return CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    }
    let origins = config
        .cors_allow
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(origin) => Some(origin),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect::<Vec<_>>();
    CorsLayer::new().allow_origin(origins).allow_methods(Any).allow_headers(Any)
}

pub fn app_router(state: Arc<AppState>, config: &Config) -> Router {
    let api = Router::new()
        .route("/healthz", get(healthz))
        .route("/status", get(get_status))
        .merge(ledger::router())
        .merge(bills::router())
        .merge(cards::router())
        .merge(reports::router())
        .merge(sync::router());

    Router::new()
        .nest("/api/v1", api)
        .with_state(state)
        .layer(cors_layer(config))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(TraceLayer::new_for_http())
}
