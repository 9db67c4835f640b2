use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Supplier with a running balance of what we owe them (positive = we owe).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "suppliers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[sea_orm(nullable)]
    pub contact: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub balance: Decimal,
    /// Delivery weekday, 0 = Monday .. 6 = Sunday
    #[sea_orm(nullable)]
    pub delivery_weekday: Option<i32>,
    #[sea_orm(nullable)]
    pub delivery_frequency: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Model {
    /// Next date the supplier delivers, counting today when it is a delivery day.
    pub fn next_delivery(&self, today: NaiveDate) -> Option<NaiveDate> {
        let weekday = self.delivery_weekday.filter(|d| (0..7).contains(d))?;
        let today_idx = today.weekday().num_days_from_monday() as i32;
        let days_until = (weekday - today_idx + 7) % 7;
        Some(today + Duration::days(days_until as i64))
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::product::Entity")]
    Products,
    #[sea_orm(has_many = "super::supplier_invoice::Entity")]
    Invoices,
    #[sea_orm(has_many = "super::supplier_payment::Entity")]
    Payments,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl Related<super::supplier_invoice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoices.def()
    }
}

impl Related<super::supplier_payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
