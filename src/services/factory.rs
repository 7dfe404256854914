use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::{DbPool, RetryPolicy},
    events::EventPublisher,
    services::{
        audit::{AuditSink, DbAuditSink},
        catalog::{BranchDirectory, CatalogProvider, SqlCatalog},
        clock::{Clock, SystemClock},
        inventory::{DbRecipeBook, InventoryLedger, RecipeBook},
        order_status::OrderStatusService,
        orders::OrderService,
    },
};

/// Wires the services to their shared collaborators.
///
/// Defaults to the SQL-backed catalog, recipes and audit sink and the system
/// clock; each can be swapped before the services are built.
#[derive(Clone)]
pub struct ServiceFactory {
    db_pool: Arc<DbPool>,
    publisher: Arc<dyn EventPublisher>,
    catalog: Arc<dyn CatalogProvider>,
    branches: Arc<dyn BranchDirectory>,
    recipes: Arc<dyn RecipeBook>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    page_sizes: (u64, u64),
}

impl ServiceFactory {
    pub fn new(db_pool: Arc<DbPool>, publisher: Arc<dyn EventPublisher>) -> Self {
        let sql = Arc::new(SqlCatalog::new(db_pool.clone()));
        Self {
            db_pool,
            publisher,
            catalog: sql.clone(),
            branches: sql,
            recipes: Arc::new(DbRecipeBook),
            audit: Arc::new(DbAuditSink),
            clock: Arc::new(SystemClock),
            retry: RetryPolicy::default(),
            page_sizes: (20, 100),
        }
    }

    /// Applies retry and paging settings from the application config.
    pub fn configured(mut self, cfg: &AppConfig) -> Self {
        self.retry = RetryPolicy::from(cfg);
        self.page_sizes = (cfg.api_default_page_size, cfg.api_max_page_size);
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn CatalogProvider>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_branches(mut self, branches: Arc<dyn BranchDirectory>) -> Self {
        self.branches = branches;
        self
    }

    pub fn with_recipes(mut self, recipes: Arc<dyn RecipeBook>) -> Self {
        self.recipes = recipes;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn inventory_ledger(&self) -> InventoryLedger {
        InventoryLedger::new(self.db_pool.clone(), self.recipes.clone(), self.clock.clone())
    }

    pub fn order_service(&self) -> OrderService {
        OrderService::new(
            self.db_pool.clone(),
            self.catalog.clone(),
            self.branches.clone(),
            self.audit.clone(),
            self.publisher.clone(),
            self.clock.clone(),
            self.retry,
        )
        .with_page_sizes(self.page_sizes.0, self.page_sizes.1)
    }

    pub fn order_status_service(&self) -> OrderStatusService {
        OrderStatusService::new(
            self.db_pool.clone(),
            self.inventory_ledger(),
            self.audit.clone(),
            self.publisher.clone(),
            self.clock.clone(),
            self.retry,
        )
    }

    pub fn db_pool(&self) -> &Arc<DbPool> {
        &self.db_pool
    }
}

/// All services, built once and shared by the handlers.
#[derive(Clone)]
pub struct ServiceContainer {
    pub inventory: Arc<InventoryLedger>,
    pub orders: Arc<OrderService>,
    pub order_status: Arc<OrderStatusService>,
}

impl ServiceContainer {
    pub fn new(factory: &ServiceFactory) -> Self {
        Self {
            inventory: Arc::new(factory.inventory_ledger()),
            orders: Arc::new(factory.order_service()),
            order_status: Arc::new(factory.order_status_service()),
        }
    }
}
