use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use domain::{AssetDetail, AssetSummary, PriceHistory};

use crate::{error::GatewayError, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/crypto", get(get_market_snapshot))
        .route("/crypto/:id", get(get_asset_detail))
        .route("/crypto/:id/history", get(get_price_history))
}

async fn get_market_snapshot(
    State(state): State<AppState>,
) -> Result<Json<Vec<AssetSummary>>, GatewayError> {
    Ok(Json(state.gateway.market_snapshot().await?))
}

async fn get_asset_detail(
    State(state): State<AppState>,
    Path(asset_id): Path<String>,
) -> Result<Json<AssetDetail>, GatewayError> {
    Ok(Json(state.gateway.asset_detail(&asset_id).await?))
}

#[derive(Debug, serde::Deserialize)]
struct HistoryQuery {
    days: Option<u32>,
}

async fn get_price_history(
    State(state): State<AppState>,
    Path(asset_id): Path<String>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<PriceHistory>, GatewayError> {
    let days = params.days.unwrap_or(1);
    Ok(Json(state.gateway.price_history(&asset_id, days).await?))
}
