use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Empty containers returned at a branch, one row per (container, branch).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "container_stock")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub container_id: Uuid,
    pub branch_id: Uuid,
    pub empty_count: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::returnable_container::Entity",
        from = "Column::ContainerId",
        to = "super::returnable_container::Column::Id"
    )]
    Container,
}

impl Related<super::returnable_container::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Container.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
