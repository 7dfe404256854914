use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, OnConflict},
    ActiveModelTrait,
    ActiveValue::Set,
    ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::clock::Clock;
use crate::db::transaction;
use crate::entities::{
    order, order_item, recipe, stock_item,
    stock_movement::{self, MovementReason},
};
use crate::errors::ServiceError;

/// One row of a recipe: how much of a stock item a single serving uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecipeLine {
    pub stock_item_id: Uuid,
    pub qty_per_serving: Decimal,
}

/// Source of recipes. Reads go through the caller's transaction so the
/// consumption sees the same snapshot as the status change it belongs to.
#[async_trait]
pub trait RecipeBook: Send + Sync {
    async fn recipe_for(
        &self,
        txn: &DatabaseTransaction,
        menu_item_id: Uuid,
    ) -> Result<Vec<RecipeLine>, ServiceError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DbRecipeBook;

#[async_trait]
impl RecipeBook for DbRecipeBook {
    async fn recipe_for(
        &self,
        txn: &DatabaseTransaction,
        menu_item_id: Uuid,
    ) -> Result<Vec<RecipeLine>, ServiceError> {
        let rows = recipe::Entity::find()
            .filter(recipe::Column::MenuItemId.eq(menu_item_id))
            .all(txn)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| RecipeLine {
                stock_item_id: r.stock_item_id,
                qty_per_serving: r.qty_per_serving,
            })
            .collect())
    }
}

impl DbRecipeBook {
    /// Inserts or replaces one recipe row.
    pub async fn set<C: ConnectionTrait>(
        conn: &C,
        menu_item_id: Uuid,
        stock_item_id: Uuid,
        qty_per_serving: Decimal,
    ) -> Result<(), ServiceError> {
        recipe::Entity::insert(recipe::ActiveModel {
            menu_item_id: Set(menu_item_id),
            stock_item_id: Set(stock_item_id),
            qty_per_serving: Set(qty_per_serving),
        })
        .on_conflict(
            OnConflict::columns([recipe::Column::MenuItemId, recipe::Column::StockItemId])
                .update_column(recipe::Column::QtyPerServing)
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;
        Ok(())
    }
}

/// Result of checking a stock item against its movement ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Reconciliation {
    pub stock_item_id: Uuid,
    #[schema(value_type = String)]
    pub stored_quantity: Decimal,
    #[schema(value_type = String)]
    pub ledger_quantity: Decimal,
    pub balanced: bool,
}

/// Stock bookkeeping driven by order transitions.
///
/// Quantities are only ever changed with `quantity = quantity + Δ` in SQL and
/// every change is paired with a movement row, so Σ movements per item equals
/// its stored quantity. Stock may go negative; nothing here blocks an order.
#[derive(Clone)]
pub struct InventoryLedger {
    db: Arc<DatabaseConnection>,
    recipes: Arc<dyn RecipeBook>,
    clock: Arc<dyn Clock>,
}

impl InventoryLedger {
    pub fn new(db: Arc<DatabaseConnection>, recipes: Arc<dyn RecipeBook>, clock: Arc<dyn Clock>) -> Self {
        Self { db, recipes, clock }
    }

    /// Decrements stock for every recipe row of every item on the order and
    /// records one `ORDER_CONSUMED` movement per stock item. Runs inside the
    /// transition's transaction.
    #[instrument(skip(self, txn, order, items), fields(order_id = %order.id))]
    pub async fn consume_for_order(
        &self,
        txn: &DatabaseTransaction,
        order: &order::Model,
        items: &[order_item::Model],
        now: DateTime<Utc>,
    ) -> Result<Vec<stock_movement::Model>, ServiceError> {
        let mut required: BTreeMap<Uuid, Decimal> = BTreeMap::new();
        for item in items {
            for line in self.recipes.recipe_for(txn, item.menu_item_id).await? {
                *required.entry(line.stock_item_id).or_default() +=
                    line.qty_per_serving * Decimal::from(item.quantity);
            }
        }

        let mut movements = Vec::with_capacity(required.len());
        for (stock_item_id, qty) in required {
            if qty.is_zero() {
                continue;
            }
            let movement = apply_change(
                txn,
                stock_item_id,
                -qty,
                MovementReason::OrderConsumed,
                Some(order.id),
                Some(order.order_code.clone()),
                now,
            )
            .await?;
            movements.push(movement);
        }

        counter!("tableside_inventory.consumed", 1);
        debug!(order_code = %order.order_code, movements = movements.len(), "Stock consumed for order");
        Ok(movements)
    }

    /// Applies the exact inverse of what the order has consumed so far, read
    /// back from the ledger. Recipe edits after confirmation do not affect it.
    #[instrument(skip(self, txn, order), fields(order_id = %order.id))]
    pub async fn restore_for_order(
        &self,
        txn: &DatabaseTransaction,
        order: &order::Model,
        now: DateTime<Utc>,
    ) -> Result<Vec<stock_movement::Model>, ServiceError> {
        let mut net: BTreeMap<Uuid, Decimal> = BTreeMap::new();
        for m in movements_by_order(txn, order.id).await? {
            *net.entry(m.stock_item_id).or_default() += m.change;
        }

        let mut movements = Vec::new();
        for (stock_item_id, outstanding) in net {
            if outstanding.is_zero() {
                continue;
            }
            let movement = apply_change(
                txn,
                stock_item_id,
                -outstanding,
                MovementReason::OrderRestored,
                Some(order.id),
                Some(order.order_code.clone()),
                now,
            )
            .await?;
            movements.push(movement);
        }

        counter!("tableside_inventory.restored", 1);
        debug!(order_code = %order.order_code, movements = movements.len(), "Stock restored for order");
        Ok(movements)
    }

    /// Creates a stock item with an opening balance recorded as a manual
    /// movement.
    #[instrument(skip(self))]
    pub async fn create_stock_item(
        &self,
        branch_id: Uuid,
        name: &str,
        unit: &str,
        min_threshold: Decimal,
        opening_quantity: Decimal,
    ) -> Result<stock_item::Model, ServiceError> {
        let now = self.clock.now();
        let txn = transaction::begin(&self.db).await?;
        let result: Result<stock_item::Model, ServiceError> = async {
            let item = stock_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                branch_id: Set(branch_id),
                name: Set(name.to_string()),
                unit: Set(unit.to_string()),
                quantity: Set(Decimal::ZERO),
                min_threshold: Set(min_threshold),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await?;
            if !opening_quantity.is_zero() {
                apply_change(
                    &txn,
                    item.id,
                    opening_quantity,
                    MovementReason::Manual,
                    None,
                    Some("opening balance".to_string()),
                    now,
                )
                .await?;
            }
            find_stock_item(&txn, item.id).await
        }
        .await;
        let item = transaction::finish(txn, result).await?;
        info!(stock_item_id = %item.id, %name, "Stock item created");
        Ok(item)
    }

    /// Manual receipt or correction. `change` may be negative.
    #[instrument(skip(self))]
    pub async fn receive_stock(
        &self,
        stock_item_id: Uuid,
        change: Decimal,
        reference: Option<String>,
    ) -> Result<stock_item::Model, ServiceError> {
        if change.is_zero() {
            return Err(ServiceError::ValidationError("change must not be zero".into()));
        }
        let now = self.clock.now();
        let txn = transaction::begin(&self.db).await?;
        let result: Result<stock_item::Model, ServiceError> = async {
            apply_change(&txn, stock_item_id, change, MovementReason::Manual, None, reference, now)
                .await?;
            find_stock_item(&txn, stock_item_id).await
        }
        .await;
        transaction::finish(txn, result).await
    }

    /// Items at or below their threshold, negative ones included. Lowest first.
    pub async fn low_stock(&self, branch_id: Uuid) -> Result<Vec<stock_item::Model>, ServiceError> {
        let items = stock_item::Entity::find()
            .filter(stock_item::Column::BranchId.eq(branch_id))
            .filter(Expr::col(stock_item::Column::Quantity).lte(Expr::col(stock_item::Column::MinThreshold)))
            .order_by_asc(stock_item::Column::Quantity)
            .all(&*self.db)
            .await?;
        if !items.is_empty() {
            warn!(%branch_id, count = items.len(), "Stock items at or below threshold");
        }
        Ok(items)
    }

    pub async fn stock_item(&self, stock_item_id: Uuid) -> Result<stock_item::Model, ServiceError> {
        find_stock_item(&*self.db, stock_item_id).await
    }

    pub async fn movements_for_stock_item(
        &self,
        stock_item_id: Uuid,
    ) -> Result<Vec<stock_movement::Model>, ServiceError> {
        find_stock_item(&*self.db, stock_item_id).await?;
        Ok(stock_movement::Entity::find()
            .filter(stock_movement::Column::StockItemId.eq(stock_item_id))
            .order_by_asc(stock_movement::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    pub async fn movements_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<stock_movement::Model>, ServiceError> {
        movements_by_order(&*self.db, order_id).await
    }

    /// Compares the stored quantity with the sum of the item's movements.
    pub async fn reconcile(&self, stock_item_id: Uuid) -> Result<Reconciliation, ServiceError> {
        let item = find_stock_item(&*self.db, stock_item_id).await?;
        let ledger_quantity: Decimal = self
            .movements_for_stock_item(stock_item_id)
            .await?
            .iter()
            .map(|m| m.change)
            .sum();
        let balanced = ledger_quantity == item.quantity;
        if !balanced {
            warn!(%stock_item_id, stored = %item.quantity, ledger = %ledger_quantity, "Stock ledger out of balance");
        }
        Ok(Reconciliation {
            stock_item_id,
            stored_quantity: item.quantity,
            ledger_quantity,
            balanced,
        })
    }
}

async fn find_stock_item<C: ConnectionTrait>(
    conn: &C,
    stock_item_id: Uuid,
) -> Result<stock_item::Model, ServiceError> {
    stock_item::Entity::find_by_id(stock_item_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Stock item {} not found", stock_item_id)))
}

async fn movements_by_order<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<Vec<stock_movement::Model>, ServiceError> {
    Ok(stock_movement::Entity::find()
        .filter(stock_movement::Column::OrderId.eq(order_id))
        .order_by_asc(stock_movement::Column::CreatedAt)
        .all(conn)
        .await?)
}

/// Adds `change` to the stored quantity in one statement and appends the
/// matching movement. A missing stock item aborts the surrounding transaction.
async fn apply_change<C: ConnectionTrait>(
    conn: &C,
    stock_item_id: Uuid,
    change: Decimal,
    reason: MovementReason,
    order_id: Option<Uuid>,
    reference: Option<String>,
    now: DateTime<Utc>,
) -> Result<stock_movement::Model, ServiceError> {
    let updated = stock_item::Entity::update_many()
        .col_expr(
            stock_item::Column::Quantity,
            Expr::col(stock_item::Column::Quantity).add(change),
        )
        .col_expr(stock_item::Column::UpdatedAt, Expr::value(now))
        .filter(stock_item::Column::Id.eq(stock_item_id))
        .exec(conn)
        .await?;
    if updated.rows_affected == 0 {
        return Err(ServiceError::reference(format!(
            "stock item {} not found",
            stock_item_id
        )));
    }

    let movement = stock_movement::ActiveModel {
        id: Set(Uuid::new_v4()),
        stock_item_id: Set(stock_item_id),
        change: Set(change),
        reason: Set(reason.to_string()),
        order_id: Set(order_id),
        order_reference: Set(reference),
        created_at: Set(now),
    }
    .insert(conn)
    .await?;
    Ok(movement)
}
