use std::sync::Arc;

use crate::{api::RefreshQuery, error::ApiResult, main_lib::AppState};
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use pocketbook_core::{
    gateway::{Transaction, TransactionDetail},
    reports::{BalanceHistoryPoint, MonthlyTrends, ReportServiceTrait, TransactionFilter},
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionsQuery {
    search: Option<String>,
    min_date: Option<NaiveDate>,
    max_date: Option<NaiveDate>,
    min_amount: Option<i64>,
    max_amount: Option<i64>,
    #[serde(default)]
    refresh: bool,
}

impl From<TransactionsQuery> for TransactionFilter {
    fn from(query: TransactionsQuery) -> Self {
        TransactionFilter {
            search: query.search,
            min_date: query.min_date,
            max_date: query.max_date,
            min_amount: query.min_amount,
            max_amount: query.max_amount,
        }
    }
}

async fn get_transactions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TransactionsQuery>,
) -> ApiResult<Json<Vec<Transaction>>> {
    let force = query.refresh;
    let filter = TransactionFilter::from(query);
    let transactions = state.engine.reports().list_transactions(&filter, force).await?;
    Ok(Json(transactions))
}

async fn get_transaction_detail(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Query(query): Query<RefreshQuery>,
) -> ApiResult<Json<TransactionDetail>> {
    let detail = state.engine.reports().transaction_detail(&id, query.refresh).await?;
    Ok(Json(detail))
}

async fn get_trends(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RefreshQuery>,
) -> ApiResult<Json<MonthlyTrends>> {
    let trends = state.engine.reports().monthly_trends(query.refresh).await?;
    Ok(Json(trends))
}

async fn get_history(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<BalanceHistoryPoint>>> {
    let history = state.engine.reports().balance_history()?;
    Ok(Json(history))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/transactions", get(get_transactions))
        .route("/transactions/{id}", get(get_transaction_detail))
        .route("/trends", get(get_trends))
        .route("/history", get(get_history))
}
