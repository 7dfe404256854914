mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

use common::TestApp;

#[tokio::test]
async fn create_then_fetch_by_id_and_code() {
    let app = TestApp::new().await;
    let burger = app.menu_item("Burger", dec!(95));
    let cheese = app.modifier(Some(burger), "Extra cheese", dec!(5));

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "branch_id": app.branch_id,
                "table_id": app.table_id,
                "customer_name": "Table 7",
                "payment_method": "CASH",
                "items": [{ "menu_item_id": burger, "quantity": 2, "modifier_ids": [cheese] }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["order_code"], "CAS-20251028-0001");
    assert_eq!(body["data"]["status"], "SUBMITTED");
    let total: Decimal = body["data"]["total"].as_str().unwrap().parse().unwrap();
    assert_eq!(total, dec!(230));

    let order_id = body["data"]["order_id"].as_str().unwrap().to_string();
    let (status, body) = app
        .request(Method::GET, &format!("/api/v1/orders/{order_id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["items"][0]["modifiers"][0]["name"], "Extra cheese");

    let (status, body) = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/by-code/{}/CAS-20251028-0001", app.branch_id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], order_id.as_str());
}

#[tokio::test]
async fn idempotency_header_wins_over_body() {
    let app = TestApp::new().await;
    let tea = app.menu_item("Tea", dec!(20));
    let payload = json!({
        "branch_id": app.branch_id,
        "table_id": app.table_id,
        "payment_method": "CARD",
        "idempotency_key": "from-body",
        "items": [{ "menu_item_id": tea, "quantity": 1 }]
    });

    let mut codes = Vec::new();
    for _ in 0..2 {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/orders")
            .header("content-type", "application/json")
            .header("idempotency-key", "from-header")
            .body(Body::from(payload.to_string()))
            .unwrap();
        let response = app.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        codes.push(body["data"]["order_code"].as_str().unwrap().to_string());
    }
    assert_eq!(codes[0], codes[1]);

    let (_, body) = app.request(Method::POST, "/api/v1/orders", Some(payload)).await;
    assert_eq!(body["data"]["order_code"], "CAS-20251028-0002");
}

#[tokio::test]
async fn errors_map_to_status_codes() {
    let app = TestApp::new().await;
    let tea = app.menu_item("Tea", dec!(20));

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "branch_id": app.branch_id,
                "table_id": app.table_id,
                "payment_method": "CASH",
                "items": []
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation_error");

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "branch_id": app.branch_id,
                "table_id": app.table_id,
                "payment_method": "CASH",
                "items": [{ "menu_item_id": Uuid::new_v4(), "quantity": 1 }]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "reference_error");

    let (status, _) = app
        .request(Method::GET, &format!("/api/v1/orders/{}", Uuid::new_v4()), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let receipt = app
        .place(tableside_api::models::PaymentMethod::Cash, vec![common::line(tea, 1)])
        .await;
    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{}/status", receipt.order_id),
            Some(json!({ "status": "READY" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "invalid_transition");
}

#[tokio::test]
async fn payment_and_status_endpoints_drive_the_lifecycle() {
    let app = TestApp::new().await;
    let tea = app.menu_item("Tea", dec!(20));
    let receipt = app
        .place(tableside_api::models::PaymentMethod::Card, vec![common::line(tea, 1)])
        .await;

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{}/payment", receipt.order_id),
            Some(json!({ "payment_method": "CARD", "transaction_ref": "txn-9" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "CONFIRMED");
    assert_eq!(body["data"]["payment_status"], "PAID");

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{}/status", receipt.order_id),
            Some(json!({ "status": "PREPARING" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "PREPARING");

    let (status, body) = app
        .request(
            Method::GET,
            &format!("/api/v1/orders?branch_id={}&status=PREPARING", app.branch_id),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
}

#[tokio::test]
async fn stock_endpoints_report_alerts_and_ledger() {
    let app = TestApp::new().await;
    let beans = app.stock_item("Coffee beans", dec!(100), dec!(250)).await;
    app.stock_item("Milk", dec!(5000), dec!(1000)).await;

    let (status, body) = app
        .request(Method::GET, &format!("/api/v1/stock/alerts?branch_id={}", app.branch_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let alerts = body["data"].as_array().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["id"], beans.to_string());
    assert_eq!(alerts[0]["low"], true);

    let (status, body) = app
        .request(Method::GET, &format!("/api/v1/stock/{beans}/movements"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["reason"], "MANUAL");

    let (status, body) = app
        .request(Method::GET, &format!("/api/v1/stock/{beans}/reconcile"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["balanced"], true);

    let (status, _) = app
        .request(Method::GET, &format!("/api/v1/stock/{}/movements", Uuid::new_v4()), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn request_id_is_echoed() {
    let app = TestApp::new().await;
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "req-abc123")
        .body(Body::empty())
        .unwrap();
    let response = app.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "req-abc123");
}

#[tokio::test]
async fn readiness_reports_database_and_realtime() {
    let app = TestApp::new().await;
    let _sub = app.hub.subscribe([tableside_api::events::Room::branch(app.branch_id)]);

    let (status, body) = app.request(Method::GET, "/health/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "up");
}

#[tokio::test]
async fn malformed_room_is_a_bad_request() {
    let app = TestApp::new().await;
    let (status, body) = app
        .request(Method::GET, "/api/v1/realtime?rooms=kitchen", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation_error");
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new().await;
    let (status, body) = app.request(Method::GET, "/api-docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["info"]["title"], "Tableside API");
}
