use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_catalogue_items_table::Migration),
            Box::new(m20240101_000002_create_batches_table::Migration),
            Box::new(m20240101_000003_create_orders_table::Migration),
            Box::new(m20240101_000004_create_order_items_table::Migration),
            Box::new(m20240101_000005_create_sales_table::Migration),
            Box::new(m20240101_000006_create_item_sales_table::Migration),
            Box::new(m20240101_000007_create_delivery_schedules_table::Migration),
        ]
    }
}

mod m20240101_000001_create_catalogue_items_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_catalogue_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(CatalogueItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CatalogueItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CatalogueItems::SellerId).uuid().not_null())
                        .col(ColumnDef::new(CatalogueItems::Sku).string().not_null())
                        .col(ColumnDef::new(CatalogueItems::Name).string().not_null())
                        .col(ColumnDef::new(CatalogueItems::Unit).string().not_null())
                        .col(
                            ColumnDef::new(CatalogueItems::ReorderLevel)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(CatalogueItems::QuantityInStock)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(CatalogueItems::TotalStockedQuantity)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(CatalogueItems::CostPrice)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CatalogueItems::SellingPrice)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(CatalogueItems::Status).string().not_null())
                        .col(
                            ColumnDef::new(CatalogueItems::IsDeleted)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(CatalogueItems::DeletedAt).timestamp_with_time_zone())
                        .col(ColumnDef::new(CatalogueItems::DeletionReason).string())
                        .col(
                            ColumnDef::new(CatalogueItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CatalogueItems::UpdatedAt).timestamp_with_time_zone())
                        .col(
                            ColumnDef::new(CatalogueItems::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .to_owned(),
                )
                .await?;

            // SKU is unique within a seller's catalogue, not globally.
            manager
                .create_index(
                    Index::create()
                        .name("idx-catalogue-items-seller-sku")
                        .table(CatalogueItems::Table)
                        .col(CatalogueItems::SellerId)
                        .col(CatalogueItems::Sku)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CatalogueItems::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum CatalogueItems {
        Table,
        Id,
        SellerId,
        Sku,
        Name,
        Unit,
        ReorderLevel,
        QuantityInStock,
        TotalStockedQuantity,
        CostPrice,
        SellingPrice,
        Status,
        IsDeleted,
        DeletedAt,
        DeletionReason,
        CreatedAt,
        UpdatedAt,
        Version,
    }
}

mod m20240101_000002_create_batches_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_batches_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Batches::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Batches::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Batches::ItemId).uuid().not_null())
                        .col(ColumnDef::new(Batches::SellerId).uuid().not_null())
                        .col(ColumnDef::new(Batches::BatchCode).string().not_null())
                        .col(ColumnDef::new(Batches::QuantityIn).big_integer().not_null())
                        .col(
                            ColumnDef::new(Batches::QuantityRemaining)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Batches::QuantitySold)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Batches::CostPrice)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Batches::SellingPrice)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Batches::DateReceived)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Batches::Status).string().not_null())
                        .col(ColumnDef::new(Batches::Supplier).string())
                        .col(ColumnDef::new(Batches::ExpiryDate).date())
                        .col(
                            ColumnDef::new(Batches::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Batches::UpdatedAt).timestamp_with_time_zone())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk-batches-item")
                                .from(Batches::Table, Batches::ItemId)
                                .to(
                                    super::m20240101_000001_create_catalogue_items_table::CatalogueItems::Table,
                                    super::m20240101_000001_create_catalogue_items_table::CatalogueItems::Id,
                                ),
                        )
                        .to_owned(),
                )
                .await?;

            // The allocator's collision retry depends on this store-level
            // uniqueness guard; in-process checks are not sufficient under
            // concurrent writers.
            manager
                .create_index(
                    Index::create()
                        .name("idx-batches-item-code")
                        .table(Batches::Table)
                        .col(Batches::ItemId)
                        .col(Batches::BatchCode)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx-batches-seller-item")
                        .table(Batches::Table)
                        .col(Batches::SellerId)
                        .col(Batches::ItemId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Batches::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Batches {
        Table,
        Id,
        ItemId,
        SellerId,
        BatchCode,
        QuantityIn,
        QuantityRemaining,
        QuantitySold,
        CostPrice,
        SellingPrice,
        DateReceived,
        Status,
        Supplier,
        ExpiryDate,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_orders_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_orders_table"
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
                        .col(ColumnDef::new(Orders::OrderNumber).string().not_null())
                        .col(ColumnDef::new(Orders::BuyerId).uuid().not_null())
                        .col(ColumnDef::new(Orders::Status).string().not_null())
                        .col(ColumnDef::new(Orders::Subtotal).decimal_len(19, 4).not_null())
                        .col(ColumnDef::new(Orders::Tax).decimal_len(19, 4).not_null())
                        .col(ColumnDef::new(Orders::Discount).decimal_len(19, 4).not_null())
                        .col(
                            ColumnDef::new(Orders::ShippingFee)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Orders::Total).decimal_len(19, 4).not_null())
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Orders::UpdatedAt).timestamp_with_time_zone())
                        .col(ColumnDef::new(Orders::Version).integer().not_null().default(1))
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx-orders-number")
                        .table(Orders::Table)
                        .col(Orders::OrderNumber)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Orders {
        Table,
        Id,
        OrderNumber,
        BuyerId,
        Status,
        Subtotal,
        Tax,
        Discount,
        ShippingFee,
        Total,
        CreatedAt,
        UpdatedAt,
        Version,
    }
}

mod m20240101_000004_create_order_items_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_order_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(OrderItems::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::SellerId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ItemId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ItemName).string().not_null())
                        .col(ColumnDef::new(OrderItems::Quantity).big_integer().not_null())
                        .col(
                            ColumnDef::new(OrderItems::UnitPrice)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::Subtotal)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk-order-items-order")
                                .from(OrderItems::Table, OrderItems::OrderId)
                                .to(
                                    super::m20240101_000003_create_orders_table::Orders::Table,
                                    super::m20240101_000003_create_orders_table::Orders::Id,
                                ),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx-order-items-order")
                        .table(OrderItems::Table)
                        .col(OrderItems::OrderId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum OrderItems {
        Table,
        Id,
        OrderId,
        SellerId,
        ItemId,
        ItemName,
        Quantity,
        UnitPrice,
        Subtotal,
    }
}

mod m20240101_000005_create_sales_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_sales_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Sales::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Sales::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Sales::SellerId).uuid().not_null())
                        .col(ColumnDef::new(Sales::OrderId).uuid())
                        .col(ColumnDef::new(Sales::SaleNumber).string().not_null())
                        .col(ColumnDef::new(Sales::Subtotal).decimal_len(19, 4).not_null())
                        .col(ColumnDef::new(Sales::Tax).decimal_len(19, 4).not_null())
                        .col(ColumnDef::new(Sales::Discount).decimal_len(19, 4).not_null())
                        .col(
                            ColumnDef::new(Sales::ShippingFee)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Sales::Total).decimal_len(19, 4).not_null())
                        .col(
                            ColumnDef::new(Sales::AmountReceived)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Sales::Balance).decimal_len(19, 4).not_null())
                        .col(ColumnDef::new(Sales::IsFromOrder).boolean().not_null())
                        .col(
                            ColumnDef::new(Sales::RefundedAmount)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Sales::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // One sale per (order, seller) pair keeps reconciliation retries
            // from re-crediting a seller group.
            manager
                .create_index(
                    Index::create()
                        .name("idx-sales-order-seller")
                        .table(Sales::Table)
                        .col(Sales::OrderId)
                        .col(Sales::SellerId)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Sales::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Sales {
        Table,
        Id,
        SellerId,
        OrderId,
        SaleNumber,
        Subtotal,
        Tax,
        Discount,
        ShippingFee,
        Total,
        AmountReceived,
        Balance,
        IsFromOrder,
        RefundedAmount,
        CreatedAt,
    }
}

mod m20240101_000006_create_item_sales_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000006_create_item_sales_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ItemSales::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(ItemSales::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(ItemSales::SaleId).uuid().not_null())
                        .col(ColumnDef::new(ItemSales::SellerId).uuid().not_null())
                        .col(ColumnDef::new(ItemSales::ItemId).uuid().not_null())
                        .col(
                            ColumnDef::new(ItemSales::QuantitySold)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ItemSales::UnitSellingPrice)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ItemSales::Subtotal)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ItemSales::UnitCostPrice)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ItemSales::TotalCostAmount)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(ItemSales::BatchesSoldFrom).json().not_null())
                        .col(
                            ColumnDef::new(ItemSales::CostEstimated)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(ItemSales::RefundedQuantity)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ItemSales::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk-item-sales-sale")
                                .from(ItemSales::Table, ItemSales::SaleId)
                                .to(
                                    super::m20240101_000005_create_sales_table::Sales::Table,
                                    super::m20240101_000005_create_sales_table::Sales::Id,
                                ),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx-item-sales-sale")
                        .table(ItemSales::Table)
                        .col(ItemSales::SaleId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx-item-sales-item")
                        .table(ItemSales::Table)
                        .col(ItemSales::ItemId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ItemSales::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum ItemSales {
        Table,
        Id,
        SaleId,
        SellerId,
        ItemId,
        QuantitySold,
        UnitSellingPrice,
        Subtotal,
        UnitCostPrice,
        TotalCostAmount,
        BatchesSoldFrom,
        CostEstimated,
        RefundedQuantity,
        CreatedAt,
    }
}

mod m20240101_000007_create_delivery_schedules_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000007_create_delivery_schedules_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(DeliverySchedules::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DeliverySchedules::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DeliverySchedules::SellerId).uuid().not_null())
                        .col(ColumnDef::new(DeliverySchedules::OrderId).uuid())
                        .col(ColumnDef::new(DeliverySchedules::SaleId).uuid())
                        .col(ColumnDef::new(DeliverySchedules::Address).string().not_null())
                        .col(ColumnDef::new(DeliverySchedules::Items).json().not_null())
                        .col(ColumnDef::new(DeliverySchedules::Status).string().not_null())
                        .col(
                            ColumnDef::new(DeliverySchedules::StatusHistory)
                                .json()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliverySchedules::ScheduledFor)
                                .timestamp_with_time_zone(),
                        )
                        .col(
                            ColumnDef::new(DeliverySchedules::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliverySchedules::UpdatedAt)
                                .timestamp_with_time_zone(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DeliverySchedules::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum DeliverySchedules {
        Table,
        Id,
        SellerId,
        OrderId,
        SaleId,
        Address,
        Items,
        Status,
        StatusHistory,
        ScheduledFor,
        CreatedAt,
        UpdatedAt,
    }
}
