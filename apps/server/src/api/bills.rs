use std::sync::Arc;

use crate::{api::RefreshQuery, error::ApiResult, main_lib::AppState};
use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use pocketbook_core::{
    bills::{
        Bill, BillReserveSummary, BillServiceTrait, BillsOverview, CreatedBill, FundingReport, NewBill,
        ReconciliationReport,
    },
    Mutation,
};

async fn get_expenses(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RefreshQuery>,
) -> ApiResult<Json<BillsOverview>> {
    let overview = state.engine.bills().bills_overview(query.refresh).await?;
    Ok(Json(overview))
}

async fn get_bills(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RefreshQuery>,
) -> ApiResult<Json<Vec<Bill>>> {
    let bills = state.engine.bills().list_bills(query.refresh).await?;
    Ok(Json(bills))
}

async fn get_bill_summary(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RefreshQuery>,
) -> ApiResult<Json<BillReserveSummary>> {
    let summary = state.engine.bills().bill_reserve_summary(query.refresh).await?;
    Ok(Json(summary))
}

async fn create_bill(
    State(state): State<Arc<AppState>>,
    Json(bill): Json<NewBill>,
) -> ApiResult<Json<Mutation<CreatedBill>>> {
    let created = state.engine.bills().create_bill(bill).await?;
    Ok(Json(created))
}

async fn delete_bill(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Mutation<i64>>> {
    let returned = state.engine.bills().delete_bill(&id).await?;
    Ok(Json(returned))
}

async fn fund_bills(State(state): State<Arc<AppState>>) -> ApiResult<Json<Mutation<FundingReport>>> {
    let report = state.engine.bills().fund_bills().await?;
    Ok(Json(report))
}

/// Matches the latest bank transactions against every bill.
async fn reconcile_bills(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Mutation<ReconciliationReport>>> {
    let transactions = state.engine.gateway().transactions(true).await?;
    let report = state
        .engine
        .bills()
        .reconcile_transactions(&transactions, None)
        .await?;
    Ok(Json(report))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/expenses", get(get_expenses))
        .route("/bills", get(get_bills).post(create_bill))
        .route("/bills/summary", get(get_bill_summary))
        .route("/bills/fund", post(fund_bills))
        .route("/bills/reconcile", post(reconcile_bills))
        .route("/bills/{id}", delete(delete_bill))
}
