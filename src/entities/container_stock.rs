use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// On-hand count of new containers for one container type.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "container_stock")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub container_type_id: i32,
    pub stock: i32,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::container_type::Entity",
        from = "Column::ContainerTypeId",
        to = "super::container_type::Column::Id"
    )]
    ContainerType,
}

impl Related<super::container_type::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ContainerType.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
