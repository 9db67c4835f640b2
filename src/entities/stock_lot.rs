use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use strum::{Display, EnumString};

/// One lot of a product at a branch: a quantity sharing an expiration date
/// and a shelf location. Lots that reach zero are kept, not deleted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_lots")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    pub branch_id: Uuid,
    pub quantity: i32,
    pub location: StockLocation,
    /// `None` means the expiration is not tracked for this lot
    #[sea_orm(nullable)]
    pub expiration_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
    #[sea_orm(
        belongs_to = "super::branch::Entity",
        from = "Column::BranchId",
        to = "super::branch::Column::Id"
    )]
    Branch,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::branch::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Branch.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Where a lot physically sits inside the branch
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    Display,
    EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StockLocation {
    /// Sales floor; point-of-sale consumption draws from here
    #[sea_orm(string_value = "shelf")]
    Shelf,
    /// Storage; restocks and unexplained surplus land here
    #[sea_orm(string_value = "backroom")]
    Backroom,
}

impl Default for StockLocation {
    fn default() -> Self {
        StockLocation::Backroom
    }
}

/// FEFO comparison on expiration dates: earliest first, untracked last.
pub fn fefo_cmp(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sorts lots into consumption order. The sort is stable, so lots sharing an
/// expiration keep the order they were given in (oldest row first when the
/// caller loads them by `created_at`).
pub fn sort_fefo(lots: &mut [Model]) {
    lots.sort_by(|a, b| fefo_cmp(a.expiration_date, b.expiration_date));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lot(expiration: Option<NaiveDate>, quantity: i32) -> Model {
        let now = Utc::now();
        Model {
            id: Uuid::new_v4(),
            product_id: Uuid::nil(),
            branch_id: Uuid::nil(),
            quantity,
            location: StockLocation::Shelf,
            expiration_date: expiration,
            created_at: now,
            updated_at: now,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn undated_lots_sort_last() {
        let mut lots = vec![
            lot(date(2024, 1, 10), 1),
            lot(None, 1),
            lot(date(2024, 1, 5), 1),
        ];
        sort_fefo(&mut lots);
        let order: Vec<_> = lots.iter().map(|l| l.expiration_date).collect();
        assert_eq!(order, vec![date(2024, 1, 5), date(2024, 1, 10), None]);
    }

    #[test]
    fn ties_keep_load_order() {
        let first = lot(date(2024, 3, 1), 4);
        let second = lot(date(2024, 3, 1), 9);
        let (first_id, second_id) = (first.id, second.id);
        let mut lots = vec![lot(None, 2), first, second];
        sort_fefo(&mut lots);
        assert_eq!(lots[0].id, first_id);
        assert_eq!(lots[1].id, second_id);
    }

    #[test]
    fn location_parses_from_cli_strings() {
        assert_eq!("shelf".parse::<StockLocation>().unwrap(), StockLocation::Shelf);
        assert_eq!(StockLocation::Backroom.to_string(), "backroom");
    }
}
