use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use sea_orm::{
    sea_query::Expr, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QuerySelect, UpdateMany, UpdateResult,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::audit::{AuditEntry, AuditSink};
use super::clock::Clock;
use super::inventory::InventoryLedger;
use super::orders::load_view;
use crate::db::{self, transaction, RetryPolicy};
use crate::entities::{order, order_item};
use crate::errors::ServiceError;
use crate::events::{EventKind, EventPublisher, LifecycleEvent};
use crate::models::{OrderStatus, OrderView, PaymentMethod, PaymentStatus};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransitionRequest {
    pub status: OrderStatus,
    #[serde(default)]
    pub actor_id: Option<Uuid>,
}

/// Settlement notice from the payment collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct MarkPaidRequest {
    pub payment_method: PaymentMethod,
    #[validate(length(min = 1, max = 128, message = "transaction reference is required"))]
    pub transaction_ref: String,
    #[serde(default)]
    pub actor_id: Option<Uuid>,
}

/// A committed change plus the events it still has to announce.
struct Applied {
    view: OrderView,
    events: Vec<EventKind>,
}

/// Applies status and payment transitions.
///
/// Every call is one transaction that re-reads the order, checks the move
/// against the status it actually found, writes through an update guarded on
/// that status and version, runs the stock side effects and appends an audit
/// entry. A guard miss means another writer got there first; the attempt is
/// rolled back and retried against the fresh row, where a duplicate request
/// then fails the legality check instead of applying twice.
#[derive(Clone)]
pub struct OrderStatusService {
    db: Arc<DatabaseConnection>,
    inventory: InventoryLedger,
    audit: Arc<dyn AuditSink>,
    publisher: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl OrderStatusService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        inventory: InventoryLedger,
        audit: Arc<dyn AuditSink>,
        publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            db,
            inventory,
            audit,
            publisher,
            clock,
            retry,
        }
    }

    #[instrument(skip(self), fields(order_id = %order_id, target = %target))]
    pub async fn transition_status(
        &self,
        order_id: Uuid,
        target: OrderStatus,
        actor_id: Option<Uuid>,
    ) -> Result<OrderView, ServiceError> {
        let applied = self
            .retry
            .run("order.transition", |_| async move {
                let txn = transaction::begin(&self.db).await?;
                let result = self.apply_transition(&txn, order_id, target, actor_id).await;
                transaction::finish(txn, result).await
            })
            .await?;
        Ok(self.announce(applied))
    }

    async fn apply_transition(
        &self,
        txn: &DatabaseTransaction,
        order_id: Uuid,
        target: OrderStatus,
        actor_id: Option<Uuid>,
    ) -> Result<Applied, ServiceError> {
        let current = lock_order(txn, order_id).await?;
        let from = current.order_status()?;
        if !from.can_transition_to(target) {
            counter!("tableside_orders.transition_rejected", 1, "from" => from.to_string(), "to" => target.to_string());
            warn!(%from, to = %target, "Rejected status transition");
            return Err(ServiceError::invalid_transition(from, target));
        }

        let now = next_timestamp(self.clock.now(), current.updated_at);
        let consume = target == OrderStatus::Confirmed && !current.inventory_committed;
        let restore =
            target == OrderStatus::Cancelled && from.holds_stock() && current.inventory_committed;

        let mut update = order::Entity::update_many()
            .col_expr(order::Column::Status, Expr::value(target.to_string()))
            .col_expr(order::Column::UpdatedAt, Expr::value(now))
            .col_expr(order::Column::Version, Expr::col(order::Column::Version).add(1));
        if consume {
            update = update.col_expr(order::Column::InventoryCommitted, Expr::value(true));
        }
        if restore {
            update = update.col_expr(order::Column::InventoryCommitted, Expr::value(false));
        }
        expect_one(guard(update, &current).exec(txn).await?)?;

        if consume {
            let items = items_of(txn, current.id).await?;
            self.inventory
                .consume_for_order(txn, &current, &items, now)
                .await?;
        }
        if restore {
            self.inventory.restore_for_order(txn, &current, now).await?;
        }

        self.audit
            .record(
                txn,
                AuditEntry::for_order(
                    actor_id,
                    "order.status_changed",
                    current.id,
                    json!({
                        "from": from,
                        "to": target,
                        "version": current.version + 1,
                        "inventory_consumed": consume,
                        "inventory_restored": restore,
                    }),
                    now,
                ),
            )
            .await?;

        let mut events = Vec::with_capacity(2);
        if target == OrderStatus::Cancelled {
            events.push(EventKind::OrderCancelled);
        }
        if from == OrderStatus::Confirmed && target == OrderStatus::Preparing {
            events.push(EventKind::KitchenAck);
        }
        events.push(EventKind::OrderUpdated);

        counter!("tableside_orders.transitions", 1, "to" => target.to_string());
        info!(order_code = %current.order_code, %from, to = %target, "Order status changed");
        Ok(Applied {
            view: reload(txn, order_id).await?,
            events,
        })
    }

    /// Records a settled payment. Orders waiting for payment move to
    /// `CONFIRMED` in the same transaction and the kitchen gets its ticket.
    ///
    /// Settling an already paid order returns it unchanged and announces
    /// nothing.
    #[instrument(skip(self, request), fields(order_id = %order_id, method = %request.payment_method))]
    pub async fn mark_paid(
        &self,
        order_id: Uuid,
        request: MarkPaidRequest,
    ) -> Result<OrderView, ServiceError> {
        request.validate()?;
        let request = &request;
        let applied = self
            .retry
            .run("order.mark_paid", |_| async move {
                let txn = transaction::begin(&self.db).await?;
                let result = self.apply_payment(&txn, order_id, request).await;
                transaction::finish(txn, result).await
            })
            .await?;
        Ok(self.announce(applied))
    }

    async fn apply_payment(
        &self,
        txn: &DatabaseTransaction,
        order_id: Uuid,
        request: &MarkPaidRequest,
    ) -> Result<Applied, ServiceError> {
        let current = lock_order(txn, order_id).await?;
        let from = current.order_status()?;
        let payment = current.payment_state()?;

        if payment == PaymentStatus::Paid {
            debug!(order_code = %current.order_code, "Order already paid");
            return Ok(Applied {
                view: load_view(txn, current).await?,
                events: Vec::new(),
            });
        }
        if from == OrderStatus::Cancelled {
            return Err(ServiceError::invalid_transition(
                format!("{}/{}", from, payment),
                PaymentStatus::Paid,
            ));
        }

        let now = next_timestamp(self.clock.now(), current.updated_at);
        let target = if from.awaits_payment() {
            OrderStatus::Confirmed
        } else {
            from
        };
        let consume = target == OrderStatus::Confirmed && !current.inventory_committed;

        let mut update = order::Entity::update_many()
            .col_expr(order::Column::Status, Expr::value(target.to_string()))
            .col_expr(order::Column::PaymentStatus, Expr::value(PaymentStatus::Paid.to_string()))
            .col_expr(order::Column::PaymentMethod, Expr::value(request.payment_method.to_string()))
            .col_expr(order::Column::TransactionRef, Expr::value(request.transaction_ref.clone()))
            .col_expr(order::Column::PaidAt, Expr::value(now))
            .col_expr(order::Column::UpdatedAt, Expr::value(now))
            .col_expr(order::Column::Version, Expr::col(order::Column::Version).add(1));
        if consume {
            update = update.col_expr(order::Column::InventoryCommitted, Expr::value(true));
        }
        expect_one(
            guard(update, &current)
                .filter(order::Column::PaymentStatus.eq(current.payment_status.clone()))
                .exec(txn)
                .await?,
        )?;

        if consume {
            let items = items_of(txn, current.id).await?;
            self.inventory
                .consume_for_order(txn, &current, &items, now)
                .await?;
        }

        self.audit
            .record(
                txn,
                AuditEntry::for_order(
                    request.actor_id,
                    "order.paid",
                    current.id,
                    json!({
                        "payment_method": request.payment_method,
                        "transaction_ref": request.transaction_ref,
                        "from": from,
                        "to": target,
                        "version": current.version + 1,
                    }),
                    now,
                ),
            )
            .await?;

        counter!("tableside_orders.paid", 1, "method" => request.payment_method.to_string());
        info!(order_code = %current.order_code, %from, to = %target, "Order paid");
        Ok(Applied {
            view: reload(txn, order_id).await?,
            events: vec![
                EventKind::PaymentUpdated,
                EventKind::OrderPaid,
                EventKind::OrderUpdated,
            ],
        })
    }

    /// Publishes after commit. Never fails the call that produced the change.
    fn announce(&self, applied: Applied) -> OrderView {
        for kind in applied.events {
            self.publisher
                .publish(LifecycleEvent::new(kind, applied.view.clone()));
        }
        applied.view
    }
}

/// `updated_at` for a write: the clock, but never at or before the stored
/// value.
fn next_timestamp(now: DateTime<Utc>, previous: DateTime<Utc>) -> DateTime<Utc> {
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

fn guard(update: UpdateMany<order::Entity>, current: &order::Model) -> UpdateMany<order::Entity> {
    update
        .filter(order::Column::Id.eq(current.id))
        .filter(order::Column::Status.eq(current.status.clone()))
        .filter(order::Column::Version.eq(current.version))
}

/// A guarded update that touched nothing lost a race.
fn expect_one(result: UpdateResult) -> Result<(), ServiceError> {
    if result.rows_affected == 1 {
        Ok(())
    } else {
        Err(ServiceError::Conflict("order changed concurrently".into()))
    }
}

async fn lock_order(txn: &DatabaseTransaction, order_id: Uuid) -> Result<order::Model, ServiceError> {
    let mut query = order::Entity::find_by_id(order_id);
    if db::supports_row_locks(txn) {
        query = query.lock_exclusive();
    }
    query
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
}

async fn reload(txn: &DatabaseTransaction, order_id: Uuid) -> Result<OrderView, ServiceError> {
    let order = order::Entity::find_by_id(order_id)
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
    load_view(txn, order).await
}

async fn items_of(
    txn: &DatabaseTransaction,
    order_id: Uuid,
) -> Result<Vec<order_item::Model>, ServiceError> {
    Ok(order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .all(txn)
        .await?)
}
