use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::models::order_status::{OrderStatus, PaymentMethod, PaymentStatus};

/// An order as persisted. Totals are fixed at creation; afterwards only the
/// status, payment and bookkeeping columns change.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub branch_id: Uuid,
    pub table_id: Uuid,
    pub order_code: String,
    pub customer_name: Option<String>,
    pub status: String,
    pub payment_status: String,
    pub payment_method: String,
    pub payment_reference: String,
    pub transaction_ref: Option<String>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub service_charge: Decimal,
    pub total: Decimal,
    pub idempotency_key: Option<String>,
    pub business_date: NaiveDate,
    pub inventory_committed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItem,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn order_status(&self) -> Result<OrderStatus, DbErr> {
        OrderStatus::from_str(&self.status)
            .map_err(|_| DbErr::Type(format!("unknown order status '{}'", self.status)))
    }

    pub fn payment_state(&self) -> Result<PaymentStatus, DbErr> {
        PaymentStatus::from_str(&self.payment_status).map_err(|_| {
            DbErr::Type(format!("unknown payment status '{}'", self.payment_status))
        })
    }

    pub fn method(&self) -> Result<PaymentMethod, DbErr> {
        PaymentMethod::from_str(&self.payment_method).map_err(|_| {
            DbErr::Type(format!("unknown payment method '{}'", self.payment_method))
        })
    }
}
