use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Where the order came from.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[strum(ascii_case_insensitive)]
pub enum OrderType {
    #[sea_orm(string_value = "Walk-in")]
    #[serde(rename = "Walk-in")]
    #[strum(serialize = "Walk-in")]
    WalkIn,
    #[sea_orm(string_value = "Online")]
    Online,
}

/// Order lifecycle. Any status may be set from any other; `Cancelled` is a
/// soft delete that returns new-purchase stock.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[strum(ascii_case_insensitive)]
pub enum OrderStatus {
    #[sea_orm(string_value = "For Approval")]
    #[serde(rename = "For Approval")]
    #[strum(serialize = "For Approval")]
    ForApproval,
    #[sea_orm(string_value = "Pending")]
    Pending,
    #[sea_orm(string_value = "Confirmed")]
    Confirmed,
    #[sea_orm(string_value = "In Progress")]
    #[serde(rename = "In Progress")]
    #[strum(serialize = "In Progress")]
    InProgress,
    #[sea_orm(string_value = "Out for Delivery")]
    #[serde(rename = "Out for Delivery")]
    #[strum(serialize = "Out for Delivery")]
    OutForDelivery,
    #[sea_orm(string_value = "Ready for Pickup")]
    #[serde(rename = "Ready for Pickup")]
    #[strum(serialize = "Ready for Pickup")]
    ReadyForPickup,
    #[sea_orm(string_value = "Completed")]
    Completed,
    #[sea_orm(string_value = "Cancelled")]
    Cancelled,
}

impl OrderStatus {
    pub fn is_cancelled(self) -> bool {
        self == OrderStatus::Cancelled
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[strum(ascii_case_insensitive)]
pub enum PaymentStatus {
    #[sea_orm(string_value = "Unpaid")]
    Unpaid,
    #[sea_orm(string_value = "Partial")]
    Partial,
    #[sea_orm(string_value = "Paid")]
    Paid,
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[strum(ascii_case_insensitive)]
pub enum ReceivingMethod {
    #[sea_orm(string_value = "Delivery")]
    Delivery,
    #[sea_orm(string_value = "Pickup")]
    Pickup,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "orders")]
#[schema(as = Order)]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub customer_id: i32,
    pub order_type: OrderType,
    pub status: OrderStatus,
    /// Cleared when the order is cancelled
    pub payment_status: Option<PaymentStatus>,
    /// Mode of payment, e.g. "Cash" or "GCash"
    pub mop: String,
    pub receiving_method: ReceivingMethod,
    pub delivery_address: Option<String>,
    pub notes: Option<String>,
    pub total_amount: Decimal,
    /// Business date the order is scheduled for
    pub order_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_detail::Entity")]
    OrderDetail,
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id"
    )]
    Customer,
    #[sea_orm(has_one = "super::feedback::Entity")]
    Feedback,
}

impl Related<super::order_detail::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderDetail.def()
    }
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::feedback::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Feedback.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_text_round_trips_through_strum() {
        assert_eq!(OrderStatus::OutForDelivery.to_string(), "Out for Delivery");
        assert_eq!(
            OrderStatus::from_str("for approval").unwrap(),
            OrderStatus::ForApproval
        );
        assert_eq!(OrderStatus::from_str("CANCELLED").unwrap(), OrderStatus::Cancelled);
        assert!(OrderStatus::from_str("Shipped").is_err());
    }

    #[test]
    fn status_json_uses_display_names() {
        let json = serde_json::to_string(&OrderStatus::ReadyForPickup).unwrap();
        assert_eq!(json, "\"Ready for Pickup\"");
        let parsed: OrderType = serde_json::from_str("\"Walk-in\"").unwrap();
        assert_eq!(parsed, OrderType::WalkIn);
    }
}
