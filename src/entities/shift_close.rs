use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Cash register close for one branch. Totals cover the sales and payments
/// recorded between `started_at` (the previous close) and `closed_at`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shift_closes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub branch_id: Uuid,
    pub closed_by: String,
    #[sea_orm(nullable)]
    pub started_at: Option<DateTime<Utc>>,
    pub closed_at: DateTime<Utc>,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub cash_sales: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub card_sales: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub qr_sales: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub customer_collections: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub supplier_payments: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub declared_cash: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub expected_cash: Decimal,
    /// declared minus expected; negative means the drawer is short
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub cash_difference: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
