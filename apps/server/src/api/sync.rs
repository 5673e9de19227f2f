use std::sync::Arc;

use crate::{error::ApiResult, main_lib::AppState};
use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use pocketbook_core::{
    sync::{
        BalanceDecision, ProviderKind, RemoteAccount, ScheduleView, SyncAccount, SyncOutcome, SyncRunResult,
        SyncServiceTrait,
    },
    Mutation,
};
use serde::Deserialize;

async fn get_providers(State(state): State<Arc<AppState>>) -> Json<Vec<ProviderKind>> {
    Json(state.engine.sync().provider_kinds())
}

async fn get_remote_accounts(
    Path(provider): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Vec<RemoteAccount>>> {
    let provider: ProviderKind = provider.parse()?;
    let accounts = state.engine.sync().list_remote_accounts(provider).await?;
    Ok(Json(accounts))
}

async fn get_sync_accounts(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<SyncAccount>>> {
    let accounts = state.engine.sync().list_sync_accounts()?;
    Ok(Json(accounts))
}

async fn get_sync_account(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<SyncAccount>> {
    let account = state.engine.sync().get_sync_account(&id)?;
    Ok(Json(account))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectAccountRequest {
    provider: ProviderKind,
    remote_account_id: String,
}

async fn select_account(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SelectAccountRequest>,
) -> ApiResult<Json<SyncAccount>> {
    let account = state
        .engine
        .sync()
        .select_account(body.provider, &body.remote_account_id)
        .await?;
    Ok(Json(account))
}

/// Fetches the remote balance for the user to decide on; moves no money.
async fn fetch_decision_balance(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<SyncAccount>> {
    let account = state.engine.sync().fetch_decision_balance(&id).await?;
    Ok(Json(account))
}

#[derive(Deserialize)]
struct ActivateRequest {
    decision: BalanceDecision,
}

async fn activate(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<ActivateRequest>,
) -> ApiResult<Json<Mutation<SyncAccount>>> {
    let activated = state.engine.sync().activate(&id, body.decision).await?;
    Ok(Json(activated))
}

async fn disconnect(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Mutation<i64>>> {
    let returned = state.engine.sync().disconnect(&id).await?;
    Ok(Json(returned))
}

async fn get_schedule(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ScheduleView>> {
    let view = state.engine.sync().get_schedule(&id)?;
    Ok(Json(view))
}

#[derive(Deserialize)]
struct ScheduleRequest {
    times: Vec<String>,
    timezone: String,
}

async fn configure_schedule(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<ScheduleRequest>,
) -> ApiResult<Json<ScheduleView>> {
    let sync = state.engine.sync();
    sync.configure_schedule(&id, &body.times, &body.timezone).await?;
    Ok(Json(sync.get_schedule(&id)?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkBillRequest {
    bill_id: Option<String>,
}

async fn link_bill(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<LinkBillRequest>,
) -> ApiResult<Json<SyncAccount>> {
    let account = state.engine.sync().link_bill(&id, body.bill_id).await?;
    Ok(Json(account))
}

async fn sync_now(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<SyncOutcome>> {
    let outcome = state.engine.sync().sync_now(&id).await?;
    Ok(Json(outcome))
}

async fn sync_all(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<SyncRunResult>>> {
    let results = state.engine.sync().sync_all().await?;
    Ok(Json(results))
}

#[derive(Deserialize)]
struct SyncBalanceRequest {
    target: i64,
}

async fn sync_balance(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<SyncBalanceRequest>,
) -> ApiResult<Json<Mutation<i64>>> {
    let moved = state.engine.sync().sync_balance(&id, body.target).await?;
    Ok(Json(moved))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sync/providers", get(get_providers))
        .route("/sync/providers/{provider}/accounts", get(get_remote_accounts))
        .route("/sync/accounts", get(get_sync_accounts).post(select_account))
        .route("/sync/accounts/{id}", get(get_sync_account).delete(disconnect))
        .route("/sync/accounts/{id}/balance", post(fetch_decision_balance).put(sync_balance))
        .route("/sync/accounts/{id}/activate", post(activate))
        .route("/sync/accounts/{id}/schedule", get(get_schedule).put(configure_schedule))
        .route("/sync/accounts/{id}/bill", put(link_bill))
        .route("/sync/accounts/{id}/sync", post(sync_now))
        .route("/sync/run", post(sync_all))
}
