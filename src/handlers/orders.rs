use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    models::{OrderReceipt, OrderView},
    services::{
        order_status::{MarkPaidRequest, TransitionRequest},
        orders::{CreateOrderRequest, OrderFilter, OrderPage},
    },
    ApiResponse, AppState,
};

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_order).get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id/status", post(transition_status))
        .route("/:id/payment", post(mark_paid))
        .route("/by-code/:branch_id/:order_code", get(get_order_by_code))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    summary = "Create order",
    description = "Price and place an order from a table. Honors the Idempotency-Key header.",
    request_body = CreateOrderRequest,
    params(("Idempotency-Key" = Option<String>, Header, description = "Client key; a repeat returns the first order")),
    responses(
        (status = 201, description = "Order created", body = ApiResponse<OrderReceipt>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Empty or malformed order", body = crate::errors::ErrorResponse),
        (status = 422, description = "Unknown or unavailable menu item, modifier or table", body = crate::errors::ErrorResponse),
        (status = 503, description = "Order could not be persisted; safe to retry", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderReceipt>>), ServiceError> {
    if let Some(key) = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        request.idempotency_key = Some(key.trim().to_string());
    }
    let receipt = state.services.orders.create_order(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(receipt))))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List orders",
    description = "Pull endpoint for staff screens and reconnecting realtime clients",
    params(OrderFilter),
    responses(
        (status = 200, description = "Orders", body = ApiResponse<OrderPage>),
        (status = 400, description = "Invalid filter", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<ApiResponse<OrderPage>>, ServiceError> {
    let page = state.services.orders.list_orders(filter).await?;
    Ok(Json(ApiResponse::success(page)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get order",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Full order projection", body = ApiResponse<OrderView>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderView>>, ServiceError> {
    let order = state.services.orders.get_order(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/by-code/{branch_id}/{order_code}",
    summary = "Get order by code",
    params(
        ("branch_id" = Uuid, Path, description = "Branch ID"),
        ("order_code" = String, Path, description = "Order code, e.g. CAS-20251028-0002"),
    ),
    responses(
        (status = 200, description = "Full order projection", body = ApiResponse<OrderView>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn get_order_by_code(
    State(state): State<AppState>,
    Path((branch_id, order_code)): Path<(Uuid, String)>,
) -> Result<Json<ApiResponse<OrderView>>, ServiceError> {
    let order = state
        .services
        .orders
        .get_by_code(branch_id, &order_code)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/status",
    summary = "Change order status",
    request_body = TransitionRequest,
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Updated order", body = ApiResponse<OrderView>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Transition not allowed from the current status", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn transition_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<ApiResponse<OrderView>>, ServiceError> {
    let order = state
        .services
        .order_status
        .transition_status(id, request.status, request.actor_id)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/payment",
    summary = "Mark order paid",
    description = "Called by the payment collaborator once a payment has settled",
    request_body = MarkPaidRequest,
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Updated order", body = ApiResponse<OrderView>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order was cancelled", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn mark_paid(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<MarkPaidRequest>,
) -> Result<Json<ApiResponse<OrderView>>, ServiceError> {
    let order = state.services.order_status.mark_paid(id, request).await?;
    Ok(Json(ApiResponse::success(order)))
}
