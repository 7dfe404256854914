use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::DbErr;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::{
    stock_item,
    stock_movement::{self, MovementReason},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StockItemView {
    pub id: Uuid,
    pub branch_id: Uuid,
    pub name: String,
    pub unit: String,
    #[schema(value_type = String, example = "-1.5")]
    pub quantity: Decimal,
    #[schema(value_type = String)]
    pub min_threshold: Decimal,
    /// At or below the threshold
    pub low: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<stock_item::Model> for StockItemView {
    fn from(item: stock_item::Model) -> Self {
        Self {
            low: item.is_low(),
            id: item.id,
            branch_id: item.branch_id,
            name: item.name,
            unit: item.unit,
            quantity: item.quantity,
            min_threshold: item.min_threshold,
            updated_at: item.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StockMovementView {
    pub id: Uuid,
    pub stock_item_id: Uuid,
    /// Signed; negative for consumption
    #[schema(value_type = String, example = "-2")]
    pub change: Decimal,
    pub reason: MovementReason,
    pub order_id: Option<Uuid>,
    pub order_reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<stock_movement::Model> for StockMovementView {
    type Error = DbErr;

    fn try_from(m: stock_movement::Model) -> Result<Self, Self::Error> {
        let reason = MovementReason::from_str(&m.reason)
            .map_err(|_| DbErr::Type(format!("unknown movement reason '{}'", m.reason)))?;
        Ok(Self {
            id: m.id,
            stock_item_id: m.stock_item_id,
            change: m.change,
            reason,
            order_id: m.order_id,
            order_reference: m.order_reference,
            created_at: m.created_at,
        })
    }
}
