//! Read-only collaborators consulted before an order is written: the menu
//! (prices and availability) and the branch directory (rates, code, tables).

use async_trait::async_trait;
use chrono::{FixedOffset, Offset, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{branch, dining_table, menu_item, modifier};
use crate::errors::ServiceError;

/// Price and availability of a menu item at the moment it is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItemSnapshot {
    pub id: Uuid,
    pub branch_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifierSnapshot {
    pub id: Uuid,
    /// Item the modifier is restricted to, if any
    pub menu_item_id: Option<Uuid>,
    pub name: String,
    pub extra_price: Decimal,
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchProfile {
    pub id: Uuid,
    pub code: String,
    pub tax_rate: Decimal,
    pub service_rate: Decimal,
    pub utc_offset_minutes: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchRates {
    pub tax_rate: Decimal,
    pub service_rate: Decimal,
}

impl BranchProfile {
    pub fn rates(&self) -> BranchRates {
        BranchRates {
            tax_rate: self.tax_rate,
            service_rate: self.service_rate,
        }
    }

    /// Wall-clock offset of the branch. Out-of-range offsets fall back to UTC.
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)).unwrap_or_else(|| Utc.fix())
    }
}

#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn resolve_menu_item(&self, id: Uuid) -> Result<Option<MenuItemSnapshot>, ServiceError>;
    async fn resolve_modifier(&self, id: Uuid) -> Result<Option<ModifierSnapshot>, ServiceError>;
}

#[async_trait]
pub trait BranchDirectory: Send + Sync {
    async fn branch_profile(&self, branch_id: Uuid) -> Result<Option<BranchProfile>, ServiceError>;
    async fn table_exists(&self, branch_id: Uuid, table_id: Uuid) -> Result<bool, ServiceError>;
}

/// Catalog and branch directory backed by the local tables.
#[derive(Clone)]
pub struct SqlCatalog {
    db: Arc<DatabaseConnection>,
}

impl SqlCatalog {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CatalogProvider for SqlCatalog {
    async fn resolve_menu_item(&self, id: Uuid) -> Result<Option<MenuItemSnapshot>, ServiceError> {
        let item = menu_item::Entity::find_by_id(id).one(&*self.db).await?;
        Ok(item.map(|m| MenuItemSnapshot {
            id: m.id,
            branch_id: m.branch_id,
            name: m.name,
            price: m.price,
            available: m.available,
        }))
    }

    async fn resolve_modifier(&self, id: Uuid) -> Result<Option<ModifierSnapshot>, ServiceError> {
        let found = modifier::Entity::find_by_id(id).one(&*self.db).await?;
        Ok(found.map(|m| ModifierSnapshot {
            id: m.id,
            menu_item_id: m.menu_item_id,
            name: m.name,
            extra_price: m.extra_price,
            available: m.available,
        }))
    }
}

#[async_trait]
impl BranchDirectory for SqlCatalog {
    async fn branch_profile(&self, branch_id: Uuid) -> Result<Option<BranchProfile>, ServiceError> {
        let found = branch::Entity::find_by_id(branch_id).one(&*self.db).await?;
        Ok(found.map(|b| BranchProfile {
            id: b.id,
            code: b.code,
            tax_rate: b.tax_rate,
            service_rate: b.service_rate,
            utc_offset_minutes: b.utc_offset_minutes,
        }))
    }

    async fn table_exists(&self, branch_id: Uuid, table_id: Uuid) -> Result<bool, ServiceError> {
        let count = dining_table::Entity::find()
            .filter(dining_table::Column::Id.eq(table_id))
            .filter(dining_table::Column::BranchId.eq(branch_id))
            .count(&*self.db)
            .await?;
        Ok(count > 0)
    }
}

/// Catalog held in memory. Useful when the menu lives in another service
/// and is pushed in, and in tests.
#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    menu_items: Arc<DashMap<Uuid, MenuItemSnapshot>>,
    modifiers: Arc<DashMap<Uuid, ModifierSnapshot>>,
    branches: Arc<DashMap<Uuid, BranchProfile>>,
    tables: Arc<DashMap<Uuid, Uuid>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_branch(&self, profile: BranchProfile) {
        self.branches.insert(profile.id, profile);
    }

    pub fn put_table(&self, branch_id: Uuid, table_id: Uuid) {
        self.tables.insert(table_id, branch_id);
    }

    pub fn put_menu_item(&self, item: MenuItemSnapshot) {
        self.menu_items.insert(item.id, item);
    }

    pub fn put_modifier(&self, modifier: ModifierSnapshot) {
        self.modifiers.insert(modifier.id, modifier);
    }

    pub fn set_price(&self, menu_item_id: Uuid, price: Decimal) {
        if let Some(mut item) = self.menu_items.get_mut(&menu_item_id) {
            item.price = price;
        }
    }

    pub fn set_available(&self, menu_item_id: Uuid, available: bool) {
        if let Some(mut item) = self.menu_items.get_mut(&menu_item_id) {
            item.available = available;
        }
    }
}

#[async_trait]
impl CatalogProvider for InMemoryCatalog {
    async fn resolve_menu_item(&self, id: Uuid) -> Result<Option<MenuItemSnapshot>, ServiceError> {
        Ok(self.menu_items.get(&id).map(|item| item.clone()))
    }

    async fn resolve_modifier(&self, id: Uuid) -> Result<Option<ModifierSnapshot>, ServiceError> {
        Ok(self.modifiers.get(&id).map(|m| m.clone()))
    }
}

#[async_trait]
impl BranchDirectory for InMemoryCatalog {
    async fn branch_profile(&self, branch_id: Uuid) -> Result<Option<BranchProfile>, ServiceError> {
        Ok(self.branches.get(&branch_id).map(|b| b.clone()))
    }

    async fn table_exists(&self, branch_id: Uuid, table_id: Uuid) -> Result<bool, ServiceError> {
        Ok(self
            .tables
            .get(&table_id)
            .map(|owner| *owner == branch_id)
            .unwrap_or(false))
    }
}
