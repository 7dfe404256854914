use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20251001_000001_create_catalog_tables::Migration),
            Box::new(m20251001_000002_create_order_tables::Migration),
            Box::new(m20251001_000003_create_inventory_tables::Migration),
            Box::new(m20251001_000004_create_audit_log::Migration),
        ]
    }
}

// Migration implementations

/// Branches, tables and the menu. These back the SQL collaborators; a
/// deployment with an external catalog can leave them empty.
mod m20251001_000001_create_catalog_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20251001_000001_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Branches::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Branches::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Branches::Code).string_len(16).not_null())
                        .col(ColumnDef::new(Branches::Name).string().not_null())
                        .col(
                            ColumnDef::new(Branches::TaxRate)
                                .decimal_len(6, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Branches::ServiceRate)
                                .decimal_len(6, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Branches::UtcOffsetMinutes)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_branches_code")
                        .table(Branches::Table)
                        .col(Branches::Code)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(DiningTables::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DiningTables::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DiningTables::BranchId).uuid().not_null())
                        .col(ColumnDef::new(DiningTables::Label).string().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_dining_tables_branch_id")
                                .from(DiningTables::Table, DiningTables::BranchId)
                                .to(Branches::Table, Branches::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(MenuItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(MenuItems::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(MenuItems::BranchId).uuid().not_null())
                        .col(ColumnDef::new(MenuItems::Name).string().not_null())
                        .col(ColumnDef::new(MenuItems::Price).decimal_len(12, 2).not_null())
                        .col(
                            ColumnDef::new(MenuItems::Available)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Modifiers::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Modifiers::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Modifiers::MenuItemId).uuid().null())
                        .col(ColumnDef::new(Modifiers::Name).string().not_null())
                        .col(
                            ColumnDef::new(Modifiers::ExtraPrice)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Modifiers::Available)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Modifiers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(MenuItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(DiningTables::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Branches::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Branches {
        Table,
        Id,
        Code,
        Name,
        TaxRate,
        ServiceRate,
        UtcOffsetMinutes,
    }

    #[derive(DeriveIden)]
    enum DiningTables {
        Table,
        Id,
        BranchId,
        Label,
    }

    #[derive(DeriveIden)]
    enum MenuItems {
        Table,
        Id,
        BranchId,
        Name,
        Price,
        Available,
    }

    #[derive(DeriveIden)]
    enum Modifiers {
        Table,
        Id,
        MenuItemId,
        Name,
        ExtraPrice,
        Available,
    }
}

mod m20251001_000002_create_order_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20251001_000002_create_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::BranchId).uuid().not_null())
                        .col(ColumnDef::new(Orders::TableId).uuid().not_null())
                        .col(ColumnDef::new(Orders::OrderCode).string_len(40).not_null())
                        .col(ColumnDef::new(Orders::CustomerName).string().null())
                        .col(ColumnDef::new(Orders::Status).string_len(32).not_null())
                        .col(ColumnDef::new(Orders::PaymentStatus).string_len(32).not_null())
                        .col(ColumnDef::new(Orders::PaymentMethod).string_len(16).not_null())
                        .col(ColumnDef::new(Orders::PaymentReference).string().not_null())
                        .col(ColumnDef::new(Orders::TransactionRef).string().null())
                        .col(ColumnDef::new(Orders::Subtotal).decimal_len(14, 2).not_null())
                        .col(ColumnDef::new(Orders::Tax).decimal_len(14, 2).not_null())
                        .col(ColumnDef::new(Orders::ServiceCharge).decimal_len(14, 2).not_null())
                        .col(ColumnDef::new(Orders::Total).decimal_len(14, 2).not_null())
                        .col(ColumnDef::new(Orders::IdempotencyKey).string().null())
                        .col(ColumnDef::new(Orders::BusinessDate).date().not_null())
                        .col(
                            ColumnDef::new(Orders::InventoryCommitted)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Orders::PaidAt).timestamp_with_time_zone().null())
                        .col(
                            ColumnDef::new(Orders::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .to_owned(),
                )
                .await?;

            // Last line of defence against duplicate codes.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_orders_branch_order_code")
                        .table(Orders::Table)
                        .col(Orders::BranchId)
                        .col(Orders::OrderCode)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_orders_branch_idempotency_key")
                        .table(Orders::Table)
                        .col(Orders::BranchId)
                        .col(Orders::IdempotencyKey)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_branch_business_date")
                        .table(Orders::Table)
                        .col(Orders::BranchId)
                        .col(Orders::BusinessDate)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_status")
                        .table(Orders::Table)
                        .col(Orders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_updated_at")
                        .table(Orders::Table)
                        .col(Orders::UpdatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::MenuItemId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::Name).string().not_null())
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(ColumnDef::new(OrderItems::UnitPrice).decimal_len(12, 2).not_null())
                        .col(ColumnDef::new(OrderItems::LineTotal).decimal_len(14, 2).not_null())
                        .col(ColumnDef::new(OrderItems::Note).string().null())
                        .col(ColumnDef::new(OrderItems::Position).integer().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_order_id")
                                .from(OrderItems::Table, OrderItems::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_items_order_id")
                        .table(OrderItems::Table)
                        .col(OrderItems::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItemModifiers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderItemModifiers::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItemModifiers::OrderItemId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItemModifiers::ModifierId).uuid().not_null())
                        .col(ColumnDef::new(OrderItemModifiers::Name).string().not_null())
                        .col(
                            ColumnDef::new(OrderItemModifiers::ExtraPrice)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_item_modifiers_order_item_id")
                                .from(OrderItemModifiers::Table, OrderItemModifiers::OrderItemId)
                                .to(OrderItems::Table, OrderItems::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_item_modifiers_order_item_id")
                        .table(OrderItemModifiers::Table)
                        .col(OrderItemModifiers::OrderItemId)
                        .to_owned(),
                )
                .await?;

            // One counter row per branch and business date.
            manager
                .create_table(
                    Table::create()
                        .table(OrderSequences::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(OrderSequences::BranchId).uuid().not_null())
                        .col(ColumnDef::new(OrderSequences::BusinessDate).date().not_null())
                        .col(
                            ColumnDef::new(OrderSequences::LastSeq)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .primary_key(
                            Index::create()
                                .col(OrderSequences::BranchId)
                                .col(OrderSequences::BusinessDate),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderSequences::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(OrderItemModifiers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        BranchId,
        TableId,
        OrderCode,
        CustomerName,
        Status,
        PaymentStatus,
        PaymentMethod,
        PaymentReference,
        TransactionRef,
        Subtotal,
        Tax,
        ServiceCharge,
        Total,
        IdempotencyKey,
        BusinessDate,
        InventoryCommitted,
        CreatedAt,
        UpdatedAt,
        PaidAt,
        Version,
    }

    #[derive(DeriveIden)]
    enum OrderItems {
        Table,
        Id,
        OrderId,
        MenuItemId,
        Name,
        Quantity,
        UnitPrice,
        LineTotal,
        Note,
        Position,
    }

    #[derive(DeriveIden)]
    enum OrderItemModifiers {
        Table,
        Id,
        OrderItemId,
        ModifierId,
        Name,
        ExtraPrice,
    }

    #[derive(DeriveIden)]
    enum OrderSequences {
        Table,
        BranchId,
        BusinessDate,
        LastSeq,
    }
}

mod m20251001_000003_create_inventory_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20251001_000003_create_inventory_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(StockItems::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(StockItems::BranchId).uuid().not_null())
                        .col(ColumnDef::new(StockItems::Name).string().not_null())
                        .col(ColumnDef::new(StockItems::Unit).string_len(16).not_null())
                        // signed; the ledger never blocks on negative stock
                        .col(
                            ColumnDef::new(StockItems::Quantity)
                                .decimal_len(14, 3)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockItems::MinThreshold)
                                .decimal_len(14, 3)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_items_branch_id")
                        .table(StockItems::Table)
                        .col(StockItems::BranchId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockMovements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockMovements::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::StockItemId).uuid().not_null())
                        .col(ColumnDef::new(StockMovements::Change).decimal_len(14, 3).not_null())
                        .col(ColumnDef::new(StockMovements::Reason).string_len(32).not_null())
                        .col(ColumnDef::new(StockMovements::OrderId).uuid().null())
                        .col(ColumnDef::new(StockMovements::OrderReference).string().null())
                        .col(
                            ColumnDef::new(StockMovements::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_movements_stock_item_id")
                                .from(StockMovements::Table, StockMovements::StockItemId)
                                .to(StockItems::Table, StockItems::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_movements_stock_item_id")
                        .table(StockMovements::Table)
                        .col(StockMovements::StockItemId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_movements_order_id")
                        .table(StockMovements::Table)
                        .col(StockMovements::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Recipes::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Recipes::MenuItemId).uuid().not_null())
                        .col(ColumnDef::new(Recipes::StockItemId).uuid().not_null())
                        .col(
                            ColumnDef::new(Recipes::QtyPerServing)
                                .decimal_len(14, 3)
                                .not_null(),
                        )
                        .primary_key(
                            Index::create()
                                .col(Recipes::MenuItemId)
                                .col(Recipes::StockItemId),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_recipes_stock_item_id")
                                .from(Recipes::Table, Recipes::StockItemId)
                                .to(StockItems::Table, StockItems::Id),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Recipes::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(StockMovements::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(StockItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum StockItems {
        Table,
        Id,
        BranchId,
        Name,
        Unit,
        Quantity,
        MinThreshold,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum StockMovements {
        Table,
        Id,
        StockItemId,
        Change,
        Reason,
        OrderId,
        OrderReference,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Recipes {
        Table,
        MenuItemId,
        StockItemId,
        QtyPerServing,
    }
}

mod m20251001_000004_create_audit_log {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20251001_000004_create_audit_log"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(AuditLog::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(AuditLog::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(AuditLog::ActorId).uuid().null())
                        .col(ColumnDef::new(AuditLog::Action).string_len(64).not_null())
                        .col(ColumnDef::new(AuditLog::EntityRef).string().not_null())
                        .col(ColumnDef::new(AuditLog::Meta).json().null())
                        .col(
                            ColumnDef::new(AuditLog::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_audit_log_entity_ref")
                        .table(AuditLog::Table)
                        .col(AuditLog::EntityRef)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(AuditLog::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum AuditLog {
        Table,
        Id,
        ActorId,
        Action,
        EntityRef,
        Meta,
        CreatedAt,
    }
}
