use std::sync::Arc;

use crate::{api::RefreshQuery, error::ApiResult, main_lib::AppState};
use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use pocketbook_core::{
    ledger::{LedgerServiceTrait, LedgerSnapshot, NewPocket, Pocket},
    transfers::{TransferReceipt, TransferRequest, TransferServiceTrait},
    Mutation,
};
use serde::{Deserialize, Serialize};

/// Snapshot for the dashboard header. A fresh fetch also records the day's
/// balance and runs bill matching.
async fn get_savings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RefreshQuery>,
) -> ApiResult<Json<LedgerSnapshot>> {
    let snapshot = state.engine.refresh(query.refresh).await?;
    Ok(Json(snapshot))
}

async fn get_pockets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RefreshQuery>,
) -> ApiResult<Json<Vec<Pocket>>> {
    let pockets = state.engine.ledger().get_pockets(query.refresh).await?;
    Ok(Json(pockets))
}

async fn create_pocket(
    State(state): State<Arc<AppState>>,
    Json(pocket): Json<NewPocket>,
) -> ApiResult<Json<Mutation<Pocket>>> {
    let created = state.engine.ledger().create_pocket(pocket).await?;
    Ok(Json(created))
}

async fn delete_pocket(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Mutation<i64>>> {
    let returned = state.engine.ledger().delete_pocket(&id).await?;
    Ok(Json(returned))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupUpdate {
    group_id: Option<String>,
}

async fn update_pocket_group(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<GroupUpdate>,
) -> ApiResult<Json<Mutation<Pocket>>> {
    let group_id = body.group_id.filter(|g| !g.trim().is_empty());
    let updated = state.engine.ledger().update_pocket_group(&id, group_id).await?;
    Ok(Json(updated))
}

async fn move_money(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TransferRequest>,
) -> ApiResult<Json<Mutation<TransferReceipt>>> {
    let receipt = state.engine.transfers().transfer(request).await?;
    Ok(Json(receipt))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LedgerStatus {
    halted: bool,
    reason: Option<String>,
}

async fn get_ledger_status(State(state): State<Arc<AppState>>) -> Json<LedgerStatus> {
    let reason = state.engine.ledger().halt_reason();
    Json(LedgerStatus {
        halted: reason.is_some(),
        reason,
    })
}

async fn verify_ledger(State(state): State<Arc<AppState>>) -> ApiResult<Json<LedgerSnapshot>> {
    let snapshot = state.engine.ledger().verify_invariant().await?;
    Ok(Json(snapshot))
}

/// Clears a halt once the ledger verifies clean against a fresh snapshot.
async fn reconcile_ledger(State(state): State<Arc<AppState>>) -> ApiResult<Json<LedgerSnapshot>> {
    let snapshot = state.engine.ledger().reconcile_halt().await?;
    tracing::info!("Ledger reconciled, safe to spend {}", snapshot.safe_to_spend);
    Ok(Json(snapshot))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/savings", get(get_savings))
        .route("/pockets", get(get_pockets).post(create_pocket))
        .route("/pockets/{id}", delete(delete_pocket))
        .route("/pockets/{id}/group", put(update_pocket_group))
        .route("/move-money", post(move_money))
        .route("/ledger/status", get(get_ledger_status))
        .route("/ledger/verify", post(verify_ledger))
        .route("/ledger/reconcile", post(reconcile_ledger))
}
