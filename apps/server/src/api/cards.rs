use std::sync::Arc;

use crate::{api::RefreshQuery, error::ApiResult, main_lib::AppState};
use axum::{
    extract::{Query, State},
    routing::{get, put},
    Json, Router,
};
use pocketbook_core::{
    cards::{Card, CardServiceTrait, SpendPocketChange},
    Mutation,
};

async fn get_cards(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RefreshQuery>,
) -> ApiResult<Json<Vec<Card>>> {
    let cards = state.engine.cards().list_cards(query.refresh).await?;
    Ok(Json(cards))
}

async fn set_spend_pocket(
    State(state): State<Arc<AppState>>,
    Json(change): Json<SpendPocketChange>,
) -> ApiResult<Json<Mutation<Vec<Card>>>> {
    let updated = state.engine.cards().set_spend_pocket(change).await?;
    Ok(Json(updated))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/cards", get(get_cards))
        .route("/cards/spend-pocket", put(set_spend_pocket))
}
