use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::{order, order_item, order_item_modifier};
use crate::models::order_status::{OrderStatus, PaymentMethod, PaymentStatus};
use sea_orm::DbErr;

/// What a successful `create_order` hands back to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrderReceipt {
    pub order_id: Uuid,
    #[schema(example = "CAS-20251028-0002")]
    pub order_code: String,
    pub payment_reference: String,
    pub status: OrderStatus,
    #[schema(value_type = String, example = "230.00")]
    pub total: Decimal,
}

/// Full current state of an order. Every lifecycle event carries one, and
/// receivers keep the copy with the newest `updated_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrderView {
    pub id: Uuid,
    pub branch_id: Uuid,
    pub table_id: Uuid,
    pub order_code: String,
    pub customer_name: Option<String>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub payment_reference: String,
    pub transaction_ref: Option<String>,
    #[schema(value_type = String)]
    pub subtotal: Decimal,
    #[schema(value_type = String)]
    pub tax: Decimal,
    #[schema(value_type = String)]
    pub service_charge: Decimal,
    #[schema(value_type = String)]
    pub total: Decimal,
    pub business_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub version: i32,
    pub items: Vec<OrderItemView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrderItemView {
    pub id: Uuid,
    pub menu_item_id: Uuid,
    pub name: String,
    pub quantity: i32,
    #[schema(value_type = String)]
    pub unit_price: Decimal,
    #[schema(value_type = String)]
    pub line_total: Decimal,
    pub note: Option<String>,
    pub modifiers: Vec<OrderItemModifierView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrderItemModifierView {
    pub id: Uuid,
    pub modifier_id: Uuid,
    pub name: String,
    #[schema(value_type = String)]
    pub extra_price: Decimal,
}

impl OrderReceipt {
    pub fn from_model(order: &order::Model) -> Result<Self, DbErr> {
        Ok(Self {
            order_id: order.id,
            order_code: order.order_code.clone(),
            payment_reference: order.payment_reference.clone(),
            status: order.order_status()?,
            total: order.total,
        })
    }
}

impl OrderView {
    /// Assembles the projection from an order row and its already-loaded
    /// children. Items keep their creation order.
    pub fn assemble(
        order: order::Model,
        mut items: Vec<order_item::Model>,
        modifiers: &[order_item_modifier::Model],
    ) -> Result<Self, DbErr> {
        items.sort_by_key(|item| item.position);
        let items = items
            .into_iter()
            .map(|item| OrderItemView {
                modifiers: modifiers
                    .iter()
                    .filter(|m| m.order_item_id == item.id)
                    .map(|m| OrderItemModifierView {
                        id: m.id,
                        modifier_id: m.modifier_id,
                        name: m.name.clone(),
                        extra_price: m.extra_price,
                    })
                    .collect(),
                id: item.id,
                menu_item_id: item.menu_item_id,
                name: item.name,
                quantity: item.quantity,
                unit_price: item.unit_price,
                line_total: item.line_total,
                note: item.note,
            })
            .collect();

        Ok(Self {
            status: order.order_status()?,
            payment_status: order.payment_state()?,
            payment_method: order.method()?,
            id: order.id,
            branch_id: order.branch_id,
            table_id: order.table_id,
            order_code: order.order_code,
            customer_name: order.customer_name,
            payment_reference: order.payment_reference,
            transaction_ref: order.transaction_ref,
            subtotal: order.subtotal,
            tax: order.tax,
            service_charge: order.service_charge,
            total: order.total,
            business_date: order.business_date,
            created_at: order.created_at,
            updated_at: order.updated_at,
            paid_at: order.paid_at,
            version: order.version,
            items,
        })
    }
}
