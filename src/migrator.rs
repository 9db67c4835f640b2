use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_catalog_tables::Migration),
            Box::new(m20240101_000002_create_stock_lots_table::Migration),
            Box::new(m20240101_000003_create_container_tables::Migration),
            Box::new(m20240101_000004_create_sales_tables::Migration),
            Box::new(m20240101_000005_create_account_tables::Migration),
            Box::new(m20240101_000006_create_sales_forecasts_table::Migration),
        ]
    }
}

mod m20240101_000001_create_catalog_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_catalog_tables"
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
                        .col(ColumnDef::new(Branches::Name).string().not_null())
                        .col(ColumnDef::new(Branches::Address).string().null())
                        .col(
                            ColumnDef::new(Branches::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Categories::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Categories::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Categories::Name)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Categories::MarginPct)
                                .decimal_len(5, 2)
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Suppliers::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Suppliers::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Suppliers::Name).string().not_null())
                        .col(ColumnDef::new(Suppliers::Contact).string().null())
                        .col(
                            ColumnDef::new(Suppliers::Balance)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Suppliers::DeliveryWeekday).integer().null())
                        .col(ColumnDef::new(Suppliers::DeliveryFrequency).string().null())
                        .col(
                            ColumnDef::new(Suppliers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::Barcode).string().null().unique_key())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(
                            ColumnDef::new(Products::Cost)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::SalePrice)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::StockMinimo)
                                .integer()
                                .not_null()
                                .default(5),
                        )
                        .col(
                            ColumnDef::new(Products::Perishable)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Products::Favorite)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Products::SupplierId).uuid().null())
                        .col(ColumnDef::new(Products::CategoryId).uuid().null())
                        .col(
                            ColumnDef::new(Products::CreatedAt)
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
                        .name("idx_products_supplier_id")
                        .table(Products::Table)
                        .col(Products::SupplierId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Suppliers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Categories::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Branches::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Branches {
        Table,
        Id,
        Name,
        Address,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Categories {
        Table,
        Id,
        Name,
        MarginPct,
    }

    #[derive(DeriveIden)]
    enum Suppliers {
        Table,
        Id,
        Name,
        Contact,
        Balance,
        DeliveryWeekday,
        DeliveryFrequency,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum Products {
        Table,
        Id,
        Barcode,
        Name,
        Cost,
        SalePrice,
        StockMinimo,
        Perishable,
        Favorite,
        SupplierId,
        CategoryId,
        CreatedAt,
    }
}

mod m20240101_000002_create_stock_lots_table {

    use super::m20240101_000001_create_catalog_tables::{Branches, Products};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_stock_lots_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockLots::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(StockLots::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(StockLots::ProductId).uuid().not_null())
                        .col(ColumnDef::new(StockLots::BranchId).uuid().not_null())
                        .col(
                            ColumnDef::new(StockLots::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(StockLots::Location).string_len(16).not_null())
                        .col(ColumnDef::new(StockLots::ExpirationDate).date().null())
                        .col(
                            ColumnDef::new(StockLots::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockLots::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_lots_product")
                                .from(StockLots::Table, StockLots::ProductId)
                                .to(Products::Table, Products::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_lots_branch")
                                .from(StockLots::Table, StockLots::BranchId)
                                .to(Branches::Table, Branches::Id),
                        )
                        .to_owned(),
                )
                .await?;

            // FEFO scans filter on (product, branch, location)
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_lots_product_branch_location")
                        .table(StockLots::Table)
                        .col(StockLots::ProductId)
                        .col(StockLots::BranchId)
                        .col(StockLots::Location)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_lots_expiration_date")
                        .table(StockLots::Table)
                        .col(StockLots::ExpirationDate)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockLots::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum StockLots {
        Table,
        Id,
        ProductId,
        BranchId,
        Quantity,
        Location,
        ExpirationDate,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_container_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_container_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ReturnableContainers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ReturnableContainers::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ReturnableContainers::Name).string().not_null())
                        .col(
                            ColumnDef::new(ReturnableContainers::DepositValue)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ContainerStock::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ContainerStock::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ContainerStock::ContainerId).uuid().not_null())
                        .col(ColumnDef::new(ContainerStock::BranchId).uuid().not_null())
                        .col(
                            ColumnDef::new(ContainerStock::EmptyCount)
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
                        .name("uq_container_stock_container_branch")
                        .table(ContainerStock::Table)
                        .col(ContainerStock::ContainerId)
                        .col(ContainerStock::BranchId)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ContainerStock::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ReturnableContainers::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ReturnableContainers {
        Table,
        Id,
        Name,
        DepositValue,
    }

    #[derive(DeriveIden)]
    enum ContainerStock {
        Table,
        Id,
        ContainerId,
        BranchId,
        EmptyCount,
    }
}

mod m20240101_000004_create_sales_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_sales_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Customers::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Customers::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Customers::FullName).string().not_null())
                        .col(ColumnDef::new(Customers::Document).string().null())
                        .col(ColumnDef::new(Customers::Phone).string().null())
                        .col(
                            ColumnDef::new(Customers::CreditLimit)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Customers::Balance)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Customers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Sales::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Sales::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Sales::BranchId).uuid().not_null())
                        .col(ColumnDef::new(Sales::CustomerId).uuid().null())
                        .col(ColumnDef::new(Sales::PaymentMethod).string_len(20).not_null())
                        .col(
                            ColumnDef::new(Sales::Installments)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(ColumnDef::new(Sales::Subtotal).decimal_len(12, 2).not_null())
                        .col(ColumnDef::new(Sales::Adjustment).decimal_len(12, 2).not_null())
                        .col(ColumnDef::new(Sales::Total).decimal_len(12, 2).not_null())
                        .col(
                            ColumnDef::new(Sales::SoldAt)
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
                        .name("idx_sales_branch_sold_at")
                        .table(Sales::Table)
                        .col(Sales::BranchId)
                        .col(Sales::SoldAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SaleLines::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(SaleLines::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(SaleLines::SaleId).uuid().not_null())
                        .col(ColumnDef::new(SaleLines::LineKind).string_len(20).not_null())
                        .col(ColumnDef::new(SaleLines::ProductId).uuid().null())
                        .col(ColumnDef::new(SaleLines::ContainerId).uuid().null())
                        .col(ColumnDef::new(SaleLines::Quantity).integer().not_null())
                        .col(ColumnDef::new(SaleLines::UnitPrice).decimal_len(12, 2).not_null())
                        .col(ColumnDef::new(SaleLines::LineTotal).decimal_len(12, 2).not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_sale_lines_sale")
                                .from(SaleLines::Table, SaleLines::SaleId)
                                .to(Sales::Table, Sales::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_sale_lines_product_id")
                        .table(SaleLines::Table)
                        .col(SaleLines::ProductId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CustomerPayments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CustomerPayments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CustomerPayments::CustomerId).uuid().not_null())
                        .col(ColumnDef::new(CustomerPayments::BranchId).uuid().not_null())
                        .col(
                            ColumnDef::new(CustomerPayments::Amount)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CustomerPayments::PaidAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CustomerPayments::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(SaleLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Sales::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Customers::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Customers {
        Table,
        Id,
        FullName,
        Document,
        Phone,
        CreditLimit,
        Balance,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Sales {
        Table,
        Id,
        BranchId,
        CustomerId,
        PaymentMethod,
        Installments,
        Subtotal,
        Adjustment,
        Total,
        SoldAt,
    }

    #[derive(DeriveIden)]
    enum SaleLines {
        Table,
        Id,
        SaleId,
        LineKind,
        ProductId,
        ContainerId,
        Quantity,
        UnitPrice,
        LineTotal,
    }

    #[derive(DeriveIden)]
    enum CustomerPayments {
        Table,
        Id,
        CustomerId,
        BranchId,
        Amount,
        PaidAt,
    }
}

mod m20240101_000005_create_account_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_account_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(SupplierInvoices::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SupplierInvoices::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SupplierInvoices::SupplierId).uuid().not_null())
                        .col(ColumnDef::new(SupplierInvoices::BranchId).uuid().not_null())
                        .col(ColumnDef::new(SupplierInvoices::InvoiceNumber).string().null())
                        .col(
                            ColumnDef::new(SupplierInvoices::Amount)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(SupplierInvoices::InvoiceDate).date().not_null())
                        .col(ColumnDef::new(SupplierInvoices::DueDate).date().null())
                        .col(
                            ColumnDef::new(SupplierInvoices::Paid)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(SupplierInvoices::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SupplierPayments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SupplierPayments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SupplierPayments::SupplierId).uuid().not_null())
                        .col(ColumnDef::new(SupplierPayments::BranchId).uuid().not_null())
                        .col(
                            ColumnDef::new(SupplierPayments::Amount)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SupplierPayments::PaidAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ShiftCloses::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(ShiftCloses::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(ShiftCloses::BranchId).uuid().not_null())
                        .col(ColumnDef::new(ShiftCloses::ClosedBy).string().not_null())
                        .col(
                            ColumnDef::new(ShiftCloses::StartedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ShiftCloses::ClosedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ShiftCloses::CashSales).decimal_len(12, 2).not_null())
                        .col(ColumnDef::new(ShiftCloses::CardSales).decimal_len(12, 2).not_null())
                        .col(ColumnDef::new(ShiftCloses::QrSales).decimal_len(12, 2).not_null())
                        .col(
                            ColumnDef::new(ShiftCloses::CustomerCollections)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShiftCloses::SupplierPayments)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShiftCloses::DeclaredCash)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShiftCloses::ExpectedCash)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShiftCloses::CashDifference)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_shift_closes_branch_closed_at")
                        .table(ShiftCloses::Table)
                        .col(ShiftCloses::BranchId)
                        .col(ShiftCloses::ClosedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ShiftCloses::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(SupplierPayments::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(SupplierInvoices::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum SupplierInvoices {
        Table,
        Id,
        SupplierId,
        BranchId,
        InvoiceNumber,
        Amount,
        InvoiceDate,
        DueDate,
        Paid,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum SupplierPayments {
        Table,
        Id,
        SupplierId,
        BranchId,
        Amount,
        PaidAt,
    }

    #[derive(DeriveIden)]
    enum ShiftCloses {
        Table,
        Id,
        BranchId,
        ClosedBy,
        StartedAt,
        ClosedAt,
        CashSales,
        CardSales,
        QrSales,
        CustomerCollections,
        SupplierPayments,
        DeclaredCash,
        ExpectedCash,
        CashDifference,
    }
}

mod m20240101_000006_create_sales_forecasts_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000006_create_sales_forecasts_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(SalesForecasts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SalesForecasts::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SalesForecasts::ProductId).uuid().not_null())
                        .col(ColumnDef::new(SalesForecasts::BranchId).uuid().not_null())
                        .col(ColumnDef::new(SalesForecasts::ForecastDate).date().not_null())
                        .col(
                            ColumnDef::new(SalesForecasts::PredictedQuantity)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SalesForecasts::GeneratedAt)
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
                        .name("uq_sales_forecasts_product_branch_date")
                        .table(SalesForecasts::Table)
                        .col(SalesForecasts::ProductId)
                        .col(SalesForecasts::BranchId)
                        .col(SalesForecasts::ForecastDate)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SalesForecasts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum SalesForecasts {
        Table,
        Id,
        ProductId,
        BranchId,
        ForecastDate,
        PredictedQuantity,
        GeneratedAt,
    }
}
