use chrono::{DateTime, NaiveDate, Utc};
use metrics::{counter, histogram};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::audit::{AuditEntry, AuditSink};
use super::catalog::{BranchDirectory, BranchProfile, CatalogProvider};
use super::clock::Clock;
use super::pricing::{price_order, PriceBreakdown, PricedLine, PricedModifier};
use super::sequence::SequenceAllocator;
use crate::db::{transaction, RetryPolicy};
use crate::entities::{order, order_item, order_item_modifier};
use crate::errors::ServiceError;
use crate::events::{EventKind, EventPublisher, LifecycleEvent};
use crate::models::{OrderReceipt, OrderStatus, OrderView, PaymentMethod, PaymentStatus};

pub const EMPTY_ORDER: &str = "at least one item required";
pub const MENU_ITEM_UNAVAILABLE: &str = "menu item not found or unavailable";
pub const CREATION_FAILED: &str = "order creation failed";

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    pub branch_id: Uuid,
    pub table_id: Uuid,
    #[validate(length(max = 120, message = "customer name is too long"))]
    pub customer_name: Option<String>,
    pub items: Vec<OrderLineRequest>,
    pub payment_method: PaymentMethod,
    /// Client-chosen key; a repeat with the same key returns the first order
    #[serde(default)]
    #[validate(length(min = 1, max = 128, message = "idempotency key must be 1-128 characters"))]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderLineRequest {
    pub menu_item_id: Uuid,
    pub quantity: i32,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub modifier_ids: Vec<Uuid>,
}

/// Filters for [`OrderService::list_orders`]. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct OrderFilter {
    pub branch_id: Option<Uuid>,
    pub table_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub business_date: Option<NaiveDate>,
    /// Only orders changed at or after this instant; used by reconnecting clients
    pub updated_since: Option<DateTime<Utc>>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderPage {
    pub items: Vec<OrderView>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

/// Rows written by one successful creation.
struct CreatedOrder {
    order: order::Model,
    items: Vec<order_item::Model>,
    modifiers: Vec<order_item_modifier::Model>,
}

/// Creates orders and serves the read side of the order ledger.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    catalog: Arc<dyn CatalogProvider>,
    branches: Arc<dyn BranchDirectory>,
    audit: Arc<dyn AuditSink>,
    publisher: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    default_page_size: u64,
    max_page_size: u64,
}

impl OrderService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Arc<DatabaseConnection>,
        catalog: Arc<dyn CatalogProvider>,
        branches: Arc<dyn BranchDirectory>,
        audit: Arc<dyn AuditSink>,
        publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            db,
            catalog,
            branches,
            audit,
            publisher,
            clock,
            retry,
            default_page_size: 20,
            max_page_size: 100,
        }
    }

    pub fn with_page_sizes(mut self, default_page_size: u64, max_page_size: u64) -> Self {
        self.max_page_size = max_page_size.max(1);
        self.default_page_size = default_page_size.clamp(1, self.max_page_size);
        self
    }

    /// Prices and persists a new order in one transaction together with its
    /// order code, then announces it.
    ///
    /// Nothing is written unless every menu item and modifier resolves.
    /// Conflicts with concurrent writers are retried; what is left over
    /// surfaces as a generic creation failure that is safe to retry.
    #[instrument(skip(self, request), fields(branch_id = %request.branch_id, table_id = %request.table_id))]
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<OrderReceipt, ServiceError> {
        let started = Instant::now();
        validate_request(&request)?;

        let branch = self
            .branches
            .branch_profile(request.branch_id)
            .await?
            .ok_or_else(|| ServiceError::reference("branch not found"))?;
        if !self.branches.table_exists(branch.id, request.table_id).await? {
            return Err(ServiceError::reference("table not found"));
        }

        let lines = self.resolve_lines(&branch, &request).await?;
        let priced = price_order(&lines, branch.rates());

        let outcome = self
            .retry
            .run("order.create", |attempt| {
                self.try_create(&branch, &request, &lines, priced, attempt)
            })
            .await;

        let created = match outcome {
            Ok(Some(created)) => created,
            Ok(None) => {
                // lost the race to a request carrying the same idempotency key
                let existing = self.find_by_idempotency_key(&branch, &request).await?.ok_or_else(|| {
                    ServiceError::PersistenceError(CREATION_FAILED.to_string())
                })?;
                return Ok(OrderReceipt::from_model(&existing)?);
            }
            Err(err @ (ServiceError::ValidationError(_) | ServiceError::ReferenceError(_))) => {
                return Err(err)
            }
            Err(err) => {
                error!(error = %err, "Order creation failed");
                counter!("tableside_orders.create_failed", 1);
                return Err(ServiceError::PersistenceError(CREATION_FAILED.to_string()));
            }
        };

        let receipt = OrderReceipt::from_model(&created.order)?;
        let view = OrderView::assemble(created.order, created.items, &created.modifiers)?;
        self.publisher
            .publish(LifecycleEvent::new(EventKind::OrderCreated, view));

        counter!("tableside_orders.created", 1, "payment_method" => request.payment_method.to_string());
        histogram!("tableside_orders.create_seconds", started.elapsed().as_secs_f64());
        info!(order_id = %receipt.order_id, order_code = %receipt.order_code, total = %receipt.total, "Order created");
        Ok(receipt)
    }

    /// One attempt. `Ok(None)` means an order with the same idempotency key
    /// already exists.
    async fn try_create(
        &self,
        branch: &BranchProfile,
        request: &CreateOrderRequest,
        lines: &[PricedLine],
        priced: PriceBreakdown,
        attempt: u32,
    ) -> Result<Option<CreatedOrder>, ServiceError> {
        if self.find_by_idempotency_key(branch, request).await?.is_some() {
            if attempt > 1 {
                info!("Idempotency key claimed by a concurrent request");
            }
            return Ok(None);
        }

        let now = self.clock.now();
        let txn = transaction::begin(&self.db).await?;
        let result = self.write_order(&txn, branch, request, lines, priced, now).await;
        transaction::finish(txn, result).await.map(Some)
    }

    async fn write_order(
        &self,
        txn: &DatabaseTransaction,
        branch: &BranchProfile,
        request: &CreateOrderRequest,
        lines: &[PricedLine],
        priced: PriceBreakdown,
        now: DateTime<Utc>,
    ) -> Result<CreatedOrder, ServiceError> {
        // first statement is a write so SQLite takes the write lock up front
        let code = SequenceAllocator::allocate(txn, branch, now).await?;
        let (status, payment_status) = request.payment_method.initial_state();

        let order = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            branch_id: Set(branch.id),
            table_id: Set(request.table_id),
            order_code: Set(code.code),
            customer_name: Set(request.customer_name.clone()),
            status: Set(status.to_string()),
            payment_status: Set(payment_status.to_string()),
            payment_method: Set(request.payment_method.to_string()),
            payment_reference: Set(format!("pay_{}", Uuid::new_v4().simple())),
            transaction_ref: Set(None),
            subtotal: Set(priced.subtotal),
            tax: Set(priced.tax_cents()),
            service_charge: Set(priced.service_charge_cents()),
            total: Set(priced.total),
            idempotency_key: Set(request.idempotency_key.clone()),
            business_date: Set(code.business_date),
            inventory_committed: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            paid_at: Set(None),
            version: Set(1),
        }
        .insert(txn)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        let mut modifiers = Vec::new();
        for (position, line) in lines.iter().enumerate() {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                menu_item_id: Set(line.menu_item_id),
                name: Set(line.name.clone()),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                line_total: Set(line.line_total()),
                note: Set(line.note.clone()),
                position: Set(position as i32),
            }
            .insert(txn)
            .await?;

            for modifier in &line.modifiers {
                let row = order_item_modifier::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    order_item_id: Set(item.id),
                    modifier_id: Set(modifier.modifier_id),
                    name: Set(modifier.name.clone()),
                    extra_price: Set(modifier.extra_price),
                }
                .insert(txn)
                .await?;
                modifiers.push(row);
            }
            items.push(item);
        }

        self.audit
            .record(
                txn,
                AuditEntry::for_order(
                    None,
                    "order.created",
                    order.id,
                    json!({
                        "order_code": order.order_code,
                        "status": order.status,
                        "payment_method": order.payment_method,
                        "total": order.total.to_string(),
                        "items": items.len(),
                    }),
                    now,
                ),
            )
            .await?;

        Ok(CreatedOrder {
            order,
            items,
            modifiers,
        })
    }

    /// Snapshots name and price of every requested item and modifier.
    async fn resolve_lines(
        &self,
        branch: &BranchProfile,
        request: &CreateOrderRequest,
    ) -> Result<Vec<PricedLine>, ServiceError> {
        let mut lines = Vec::with_capacity(request.items.len());
        for line in &request.items {
            let item = self
                .catalog
                .resolve_menu_item(line.menu_item_id)
                .await?
                .filter(|item| item.available && item.branch_id == branch.id)
                .ok_or_else(|| {
                    warn!(menu_item_id = %line.menu_item_id, "Unresolvable menu item");
                    ServiceError::reference(MENU_ITEM_UNAVAILABLE)
                })?;

            let mut modifiers = Vec::with_capacity(line.modifier_ids.len());
            for modifier_id in &line.modifier_ids {
                let modifier = self
                    .catalog
                    .resolve_modifier(*modifier_id)
                    .await?
                    .filter(|m| m.available)
                    .ok_or_else(|| ServiceError::reference("modifier not found or unavailable"))?;
                if modifier.menu_item_id.is_some_and(|scope| scope != item.id) {
                    return Err(ServiceError::reference(format!(
                        "modifier {} does not apply to {}",
                        modifier.name, item.name
                    )));
                }
                modifiers.push(PricedModifier {
                    modifier_id: modifier.id,
                    name: modifier.name,
                    extra_price: modifier.extra_price,
                });
            }

            lines.push(PricedLine {
                menu_item_id: item.id,
                name: item.name,
                quantity: line.quantity,
                unit_price: item.price,
                note: line.note.clone(),
                modifiers,
            });
        }
        Ok(lines)
    }

    async fn find_by_idempotency_key(
        &self,
        branch: &BranchProfile,
        request: &CreateOrderRequest,
    ) -> Result<Option<order::Model>, ServiceError> {
        let Some(key) = request.idempotency_key.as_deref() else {
            return Ok(None);
        };
        Ok(order::Entity::find()
            .filter(order::Column::BranchId.eq(branch.id))
            .filter(order::Column::IdempotencyKey.eq(key))
            .one(&*self.db)
            .await?)
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderView, ServiceError> {
        let order = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        load_view(&*self.db, order).await
    }

    #[instrument(skip(self))]
    pub async fn get_by_code(&self, branch_id: Uuid, order_code: &str) -> Result<OrderView, ServiceError> {
        let order = order::Entity::find()
            .filter(order::Column::BranchId.eq(branch_id))
            .filter(order::Column::OrderCode.eq(order_code))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_code)))?;
        load_view(&*self.db, order).await
    }

    #[instrument(skip(self))]
    pub async fn list_orders(&self, filter: OrderFilter) -> Result<OrderPage, ServiceError> {
        let limit = filter
            .limit
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size);
        let page = filter.page.unwrap_or(1).max(1);

        let mut query = order::Entity::find();
        if let Some(branch_id) = filter.branch_id {
            query = query.filter(order::Column::BranchId.eq(branch_id));
        }
        if let Some(table_id) = filter.table_id {
            query = query.filter(order::Column::TableId.eq(table_id));
        }
        if let Some(status) = filter.status {
            query = query.filter(order::Column::Status.eq(status.to_string()));
        }
        if let Some(payment_status) = filter.payment_status {
            query = query.filter(order::Column::PaymentStatus.eq(payment_status.to_string()));
        }
        if let Some(date) = filter.business_date {
            query = query.filter(order::Column::BusinessDate.eq(date));
        }
        if let Some(since) = filter.updated_since {
            query = query.filter(order::Column::UpdatedAt.gte(since));
        }

        let paginator = query
            .order_by_asc(order::Column::CreatedAt)
            .order_by_asc(order::Column::OrderCode)
            .paginate(&*self.db, limit);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page - 1).await?;
        let items = load_views(&*self.db, orders).await?;

        Ok(OrderPage {
            items,
            total,
            page,
            limit,
            total_pages: total.div_ceil(limit),
        })
    }
}

fn validate_request(request: &CreateOrderRequest) -> Result<(), ServiceError> {
    if request.items.is_empty() {
        return Err(ServiceError::ValidationError(EMPTY_ORDER.to_string()));
    }
    if request.items.iter().any(|line| line.quantity < 1) {
        return Err(ServiceError::ValidationError(
            "quantity must be at least 1".to_string(),
        ));
    }
    request.validate()?;
    Ok(())
}

/// Loads the items and modifiers of one order and builds its projection.
pub(crate) async fn load_view<C: ConnectionTrait>(
    conn: &C,
    order: order::Model,
) -> Result<OrderView, ServiceError> {
    let mut views = load_views(conn, vec![order]).await?;
    views
        .pop()
        .ok_or_else(|| ServiceError::InternalError("order projection missing".into()))
}

/// Batch version of [`load_view`]: two queries regardless of page size.
pub(crate) async fn load_views<C: ConnectionTrait>(
    conn: &C,
    orders: Vec<order::Model>,
) -> Result<Vec<OrderView>, ServiceError> {
    if orders.is_empty() {
        return Ok(Vec::new());
    }
    let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let mut items = order_item::Entity::find()
        .filter(order_item::Column::OrderId.is_in(order_ids))
        .all(conn)
        .await?;
    let item_ids: Vec<Uuid> = items.iter().map(|i| i.id).collect();
    let modifiers = if item_ids.is_empty() {
        Vec::new()
    } else {
        order_item_modifier::Entity::find()
            .filter(order_item_modifier::Column::OrderItemId.is_in(item_ids))
            .all(conn)
            .await?
    };

    let mut views = Vec::with_capacity(orders.len());
    for order in orders {
        let (own, rest): (Vec<_>, Vec<_>) = items.into_iter().partition(|i| i.order_id == order.id);
        items = rest;
        views.push(OrderView::assemble(order, own, &modifiers)?);
    }
    Ok(views)
}
