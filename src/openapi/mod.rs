use axum::{response::Json, routing::get, Router};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tableside API",
        version = "0.1.0",
        description = r#"
# Tableside order lifecycle API

Orders placed from table QR codes, tracked by floor, kitchen and admin staff.

## Order lifecycle

```
SUBMITTED        -> PENDING, CONFIRMED, CANCELLED
AWAITING_PAYMENT -> PENDING, CANCELLED
PENDING          -> CONFIRMED, CANCELLED
CONFIRMED        -> PREPARING, CANCELLED
PREPARING        -> READY, CANCELLED
READY            -> SERVED
SERVED           -> COMPLETED
```

Cash orders start `SUBMITTED`, card orders `AWAITING_PAYMENT`. Entering
`CONFIRMED` consumes stock once; cancelling a confirmed or preparing order puts
it back.

## Realtime

`GET /api/v1/realtime?rooms=branch:{id}:kitchen` streams lifecycle events as
Server-Sent Events. Each event carries the full order; keep the copy with the
newest `updated_at`. There is no replay, so re-fetch orders after reconnecting.

## Errors

```json
{
  "error": "Conflict",
  "kind": "invalid_transition",
  "message": "invalid transition: SUBMITTED -> READY",
  "request_id": "req-abc123xyz",
  "timestamp": "2025-10-28T10:30:00Z"
}
```
"#
    ),
    paths(
        crate::handlers::orders::create_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::get_order_by_code,
        crate::handlers::orders::transition_status,
        crate::handlers::orders::mark_paid,
        crate::handlers::inventory::low_stock_alerts,
        crate::handlers::inventory::stock_movements,
        crate::handlers::inventory::reconcile_stock,
        crate::handlers::realtime::subscribe,
    ),
    components(
        schemas(
            crate::services::orders::CreateOrderRequest,
            crate::services::orders::OrderLineRequest,
            crate::services::orders::OrderPage,
            crate::services::order_status::TransitionRequest,
            crate::services::order_status::MarkPaidRequest,
            crate::services::inventory::Reconciliation,
            crate::models::OrderReceipt,
            crate::models::OrderView,
            crate::models::OrderItemView,
            crate::models::OrderItemModifierView,
            crate::models::OrderStatus,
            crate::models::PaymentStatus,
            crate::models::PaymentMethod,
            crate::models::StockItemView,
            crate::models::StockMovementView,
            crate::entities::stock_movement::MovementReason,
            crate::events::LifecycleEvent,
            crate::events::EventKind,
            crate::errors::ErrorResponse
        )
    ),
    tags(
        (name = "orders", description = "Order creation, lookup and lifecycle"),
        (name = "stock", description = "Stock ledger read side"),
        (name = "realtime", description = "Lifecycle event stream"),
    )
)]
pub struct ApiDocV1;

/// Serves the generated document at `/api-docs/openapi.json`.
pub fn openapi_routes() -> Router {
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDocV1::openapi()) }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_lifecycle_paths() {
        let json = serde_json::to_string(&ApiDocV1::openapi()).unwrap();
        assert!(json.contains("Tableside API"));
        assert!(json.contains("/api/v1/orders/{id}/status"));
        assert!(json.contains("/api/v1/realtime"));
        assert!(json.contains("AWAITING_PAYMENT"));
    }
}
