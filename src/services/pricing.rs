//! Line-item and order pricing.
//!
//! A line is priced from its container type: refills use the refill price,
//! new purchases the new-container price. An order total is the sum of its
//! line subtotals.

use rust_decimal::Decimal;

use crate::entities::{container_type, order_detail, order_detail::OrderCategory};

/// Price of a single unit of `container` under `category`.
pub fn unit_price(container: &container_type::Model, category: OrderCategory) -> Decimal {
    match category {
        OrderCategory::Refill => container.refill_price,
        OrderCategory::NewPurchase => container.new_container_price,
    }
}

pub fn subtotal(unit_price: Decimal, quantity: i32) -> Decimal {
    unit_price * Decimal::from(quantity)
}

/// Sum of the stored subtotals of `lines`, priced as of when each line was
/// last written.
pub fn order_total<'a, I>(lines: I) -> Decimal
where
    I: IntoIterator<Item = &'a order_detail::Model>,
{
    lines
        .into_iter()
        .fold(Decimal::ZERO, |acc, line| acc + line.subtotal)
}
