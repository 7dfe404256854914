/*!
 * # Health Check Module
 *
 * - `/health`: liveness, always up while the process serves requests
 * - `/health/ready`: readiness, checks the database and reports realtime load
 */

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::error;
use utoipa::ToSchema;

use crate::events::RealtimeHub;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Down,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct HealthDetail {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct HealthInfo {
    pub status: HealthStatus,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, HealthDetail>,
}

#[derive(Clone)]
pub struct HealthState {
    pub db_pool: Arc<DatabaseConnection>,
    pub hub: RealtimeHub,
    pub start_time: Instant,
}

impl HealthState {
    pub fn new(db_pool: Arc<DatabaseConnection>, hub: RealtimeHub) -> Self {
        Self {
            db_pool,
            hub,
            start_time: Instant::now(),
        }
    }

    fn info(&self, status: HealthStatus) -> HealthInfo {
        HealthInfo {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            details: BTreeMap::new(),
        }
    }
}

pub async fn health(State(state): State<HealthState>) -> Json<HealthInfo> {
    Json(state.info(HealthStatus::Up))
}

pub async fn readiness(State(state): State<HealthState>) -> (StatusCode, Json<HealthInfo>) {
    let database = match state.db_pool.ping().await {
        Ok(()) => HealthDetail {
            status: HealthStatus::Up,
            message: None,
        },
        Err(e) => {
            error!(error = %e, "Database readiness check failed");
            HealthDetail {
                status: HealthStatus::Down,
                message: Some("database unreachable".to_string()),
            }
        }
    };
    let status = database.status;

    let mut info = state.info(status);
    info.details.insert("database".to_string(), database);
    info.details.insert(
        "realtime".to_string(),
        HealthDetail {
            status: HealthStatus::Up,
            message: Some(format!("{} connections", state.hub.connection_count())),
        },
    );

    let code = match status {
        HealthStatus::Up => StatusCode::OK,
        HealthStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
    };
    (code, Json(info))
}

pub fn health_routes(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .with_state(state)
}
