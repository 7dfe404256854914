//! Tableside API library
//!
//! Order lifecycle engine for table-side QR ordering: transactional order
//! creation with per-branch daily order codes, the status state machine and
//! its stock side effects, and post-commit fan-out of lifecycle events.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod health;
pub mod migrator;
pub mod models;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{response::Json, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::events::RealtimeHub;
use crate::services::factory::ServiceContainer;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: ServiceContainer,
    pub hub: RealtimeHub,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        services: ServiceContainer,
        hub: RealtimeHub,
    ) -> Self {
        Self {
            db,
            config,
            services,
            hub,
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .nest("/orders", handlers::orders::order_routes())
        .nest("/stock", handlers::inventory::stock_routes())
        .nest("/realtime", handlers::realtime::realtime_routes())
}

/// The full application router: API, health checks and the OpenAPI document,
/// with request-id propagation. Transport layers (trace, CORS, compression)
/// are added by the binary.
pub fn app_router(state: AppState) -> Router {
    let health = health::health_routes(health::HealthState::new(
        state.db.clone(),
        state.hub.clone(),
    ));
    Router::new()
        .nest("/api/v1", api_v1_routes())
        .with_state(state)
        .merge(health)
        .merge(openapi::openapi_routes())
        .layer(axum::middleware::from_fn(crate::tracing::request_id_middleware))
}
