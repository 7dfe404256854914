use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    models::{StockItemView, StockMovementView},
    services::inventory::Reconciliation,
    ApiResponse, AppState,
};

pub fn stock_routes() -> Router<AppState> {
    Router::new()
        .route("/alerts", get(low_stock_alerts))
        .route("/:id/movements", get(stock_movements))
        .route("/:id/reconcile", get(reconcile_stock))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AlertQuery {
    pub branch_id: Uuid,
}

#[utoipa::path(
    get,
    path = "/api/v1/stock/alerts",
    summary = "Low stock alert",
    description = "Stock items at or below their threshold, negative balances included",
    params(AlertQuery),
    responses(
        (status = 200, description = "Low stock items, lowest first", body = ApiResponse<Vec<StockItemView>>),
    ),
    tag = "stock"
)]
pub async fn low_stock_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertQuery>,
) -> Result<Json<ApiResponse<Vec<StockItemView>>>, ServiceError> {
    let items = state.services.inventory.low_stock(query.branch_id).await?;
    Ok(Json(ApiResponse::success(
        items.into_iter().map(StockItemView::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/stock/{id}/movements",
    summary = "Stock movement ledger",
    params(("id" = Uuid, Path, description = "Stock item ID")),
    responses(
        (status = 200, description = "Movements, oldest first", body = ApiResponse<Vec<StockMovementView>>),
        (status = 404, description = "Stock item not found", body = crate::errors::ErrorResponse),
    ),
    tag = "stock"
)]
pub async fn stock_movements(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<StockMovementView>>>, ServiceError> {
    let movements = state
        .services
        .inventory
        .movements_for_stock_item(id)
        .await?
        .into_iter()
        .map(StockMovementView::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(ApiResponse::success(movements)))
}

#[utoipa::path(
    get,
    path = "/api/v1/stock/{id}/reconcile",
    summary = "Check stock against its ledger",
    params(("id" = Uuid, Path, description = "Stock item ID")),
    responses(
        (status = 200, description = "Stored quantity versus Σ movements", body = ApiResponse<Reconciliation>),
        (status = 404, description = "Stock item not found", body = crate::errors::ErrorResponse),
    ),
    tag = "stock"
)]
pub async fn reconcile_stock(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Reconciliation>>, ServiceError> {
    let report = state.services.inventory.reconcile(id).await?;
    Ok(Json(ApiResponse::success(report)))
}
