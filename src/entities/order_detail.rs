use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::ServiceError;

/// Whether a line refills a customer-owned container or sells a new one.
///
/// Stored as its numeric id (`1` refill, `2` new purchase).
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
pub enum OrderCategory {
    #[sea_orm(num_value = 1)]
    Refill,
    #[sea_orm(num_value = 2)]
    #[strum(serialize = "New Purchase")]
    NewPurchase,
}

impl OrderCategory {
    pub fn id(self) -> i32 {
        match self {
            OrderCategory::Refill => 1,
            OrderCategory::NewPurchase => 2,
        }
    }

    /// New-purchase lines consume container stock; refills do not.
    pub fn consumes_stock(self) -> bool {
        self == OrderCategory::NewPurchase
    }
}

impl TryFrom<i32> for OrderCategory {
    type Error = ServiceError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(OrderCategory::Refill),
            2 => Ok(OrderCategory::NewPurchase),
            other => Err(ServiceError::ValidationError(format!(
                "order_category_id must be 1 (refill) or 2 (new purchase), got {}",
                other
            ))),
        }
    }
}

/// One line item of an order.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "order_details")]
#[schema(as = OrderDetail)]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub order_id: i32,
    pub container_type_id: i32,
    pub order_category: OrderCategory,
    pub quantity: i32,
    /// Price resolved from the container type when the line was last written
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id",
        on_delete = "Cascade"
    )]
    Order,
    #[sea_orm(
        belongs_to = "super::container_type::Entity",
        from = "Column::ContainerTypeId",
        to = "super::container_type::Column::Id"
    )]
    ContainerType,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::container_type::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ContainerType.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
