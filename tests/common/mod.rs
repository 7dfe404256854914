#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{DatabaseConnection, EntityTrait};
use serde_json::Value;
use tableside_api::{
    config::AppConfig,
    db::{self, RetryPolicy},
    entities::order,
    events::RealtimeHub,
    models::{OrderReceipt, PaymentMethod},
    services::{
        catalog::{BranchProfile, InMemoryCatalog, MenuItemSnapshot, ModifierSnapshot},
        clock::FixedClock,
        factory::{ServiceContainer, ServiceFactory},
        inventory::{DbRecipeBook, RecipeBook},
        orders::{CreateOrderRequest, OrderLineRequest},
    },
    AppState,
};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

pub const BRANCH_CODE: &str = "CAS";

/// 2025-10-28 10:00:00 UTC
pub fn opening_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 28, 10, 0, 0).unwrap()
}

/// Services over a fresh SQLite file, an in-memory catalog with one branch
/// and one table, and a clock that only moves when told to.
pub struct TestApp {
    pub db: Arc<DatabaseConnection>,
    pub catalog: InMemoryCatalog,
    pub clock: Arc<FixedClock>,
    pub hub: RealtimeHub,
    pub services: ServiceContainer,
    pub state: AppState,
    pub branch_id: Uuid,
    pub table_id: Uuid,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_recipes(Arc::new(DbRecipeBook)).await
    }

    /// Same harness with recipes read from `recipes` instead of the database.
    pub async fn with_recipes(recipes: Arc<dyn RecipeBook>) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("tableside_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", path.display()),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 8;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let branch_id = Uuid::new_v4();
        let table_id = Uuid::new_v4();
        let catalog = InMemoryCatalog::new();
        catalog.put_branch(BranchProfile {
            id: branch_id,
            code: BRANCH_CODE.to_string(),
            tax_rate: dec!(0.10),
            service_rate: dec!(0.05),
            utc_offset_minutes: 0,
        });
        catalog.put_table(branch_id, table_id);

        let clock = Arc::new(FixedClock::new(opening_time()));
        let hub = RealtimeHub::new(cfg.subscriber_buffer);

        // concurrent writers on one SQLite file lose races often; be patient
        let retry = RetryPolicy {
            max_attempts: 25,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(100),
        };

        let factory = ServiceFactory::new(db_arc.clone(), Arc::new(hub.clone()))
            .configured(&cfg)
            .with_catalog(Arc::new(catalog.clone()))
            .with_branches(Arc::new(catalog.clone()))
            .with_clock(clock.clone())
            .with_recipes(recipes)
            .with_retry(retry);
        let services = ServiceContainer::new(&factory);
        let state = AppState::new(db_arc.clone(), cfg, services.clone(), hub.clone());

        Self {
            db: db_arc,
            catalog,
            clock,
            hub,
            services,
            state,
            branch_id,
            table_id,
            _dir: dir,
        }
    }

    pub fn router(&self) -> Router {
        tableside_api::app_router(self.state.clone())
    }

    pub fn menu_item(&self, name: &str, price: Decimal) -> Uuid {
        let id = Uuid::new_v4();
        self.catalog.put_menu_item(MenuItemSnapshot {
            id,
            branch_id: self.branch_id,
            name: name.to_string(),
            price,
            available: true,
        });
        id
    }

    pub fn modifier(&self, menu_item_id: Option<Uuid>, name: &str, extra_price: Decimal) -> Uuid {
        let id = Uuid::new_v4();
        self.catalog.put_modifier(ModifierSnapshot {
            id,
            menu_item_id,
            name: name.to_string(),
            extra_price,
            available: true,
        });
        id
    }

    pub async fn stock_item(&self, name: &str, quantity: Decimal, min_threshold: Decimal) -> Uuid {
        self.services
            .inventory
            .create_stock_item(self.branch_id, name, "g", min_threshold, quantity)
            .await
            .expect("create stock item")
            .id
    }

    pub async fn recipe(&self, menu_item_id: Uuid, stock_item_id: Uuid, qty_per_serving: Decimal) {
        DbRecipeBook::set(&*self.db, menu_item_id, stock_item_id, qty_per_serving)
            .await
            .expect("set recipe");
    }

    pub async fn quantity_of(&self, stock_item_id: Uuid) -> Decimal {
        self.services
            .inventory
            .stock_item(stock_item_id)
            .await
            .expect("stock item")
            .quantity
    }

    pub async fn stored_order(&self, order_id: Uuid) -> order::Model {
        order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await
            .expect("order query")
            .expect("order row")
    }

    /// Net of every movement recorded against a stock item.
    pub async fn ledger_sum(&self, stock_item_id: Uuid) -> Decimal {
        self.services
            .inventory
            .movements_for_stock_item(stock_item_id)
            .await
            .expect("movements")
            .iter()
            .map(|m| m.change)
            .sum()
    }

    pub fn order_request(&self, method: PaymentMethod, lines: Vec<OrderLineRequest>) -> CreateOrderRequest {
        CreateOrderRequest {
            branch_id: self.branch_id,
            table_id: self.table_id,
            customer_name: Some("Table 7".to_string()),
            items: lines,
            payment_method: method,
            idempotency_key: None,
        }
    }

    pub async fn place(&self, method: PaymentMethod, lines: Vec<OrderLineRequest>) -> OrderReceipt {
        self.services
            .orders
            .create_order(self.order_request(method, lines))
            .await
            .expect("create order")
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self.router().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}

pub fn line(menu_item_id: Uuid, quantity: i32) -> OrderLineRequest {
    OrderLineRequest {
        menu_item_id,
        quantity,
        note: None,
        modifier_ids: Vec::new(),
    }
}

pub fn line_with(menu_item_id: Uuid, quantity: i32, modifier_ids: Vec<Uuid>) -> OrderLineRequest {
    OrderLineRequest {
        menu_item_id,
        quantity,
        note: None,
        modifier_ids,
    }
}
