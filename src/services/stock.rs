//! Container stock ledger.
//!
//! Every change to `container_stock.stock` goes through this module. Each
//! movement locks the stock row (`SELECT ... FOR UPDATE` where the backend
//! supports it) inside the caller's transaction, then applies a guarded
//! update so the counter can never go negative.

use std::collections::BTreeMap;

use chrono::Utc;
use metrics::counter;
use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect,
};
use tracing::{debug, instrument, warn};

use crate::entities::{container_stock, container_type, order_detail, order_detail::OrderCategory};
use crate::errors::ServiceError;

/// Units of one container type an order line holds out of stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockCommitment {
    pub container_type_id: i32,
    pub quantity: i32,
}

impl StockCommitment {
    /// Commitment of a line, if it consumes stock at all.
    pub fn for_line(
        container_type_id: i32,
        category: OrderCategory,
        quantity: i32,
    ) -> Option<Self> {
        (category.consumes_stock() && quantity > 0).then_some(Self {
            container_type_id,
            quantity,
        })
    }

    pub fn of_detail(detail: &order_detail::Model) -> Option<Self> {
        Self::for_line(detail.container_type_id, detail.order_category, detail.quantity)
    }
}

/// Sums commitments per container type, ordered by id so rows are always
/// locked in the same order.
pub fn aggregate<I>(commitments: I) -> BTreeMap<i32, i32>
where
    I: IntoIterator<Item = StockCommitment>,
{
    let mut totals = BTreeMap::new();
    for c in commitments {
        *totals.entry(c.container_type_id).or_insert(0) += c.quantity;
    }
    totals
}

pub struct StockLedger;

impl StockLedger {
    async fn lock_row<C>(conn: &C, container_type_id: i32) -> Result<container_stock::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        container_stock::Entity::find()
            .filter(container_stock::Column::ContainerTypeId.eq(container_type_id))
            .lock_exclusive()
            .one(conn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "No stock record for container type {}",
                    container_type_id
                ))
            })
    }

    async fn container_name<C>(conn: &C, container_type_id: i32) -> Result<String, ServiceError>
    where
        C: ConnectionTrait,
    {
        Ok(container_type::Entity::find_by_id(container_type_id)
            .one(conn)
            .await?
            .map_or_else(|| format!("container type {}", container_type_id), |ct| ct.name))
    }

    /// Takes `quantity` units out of stock and returns the new level.
    #[instrument(skip(conn))]
    pub async fn debit<C>(conn: &C, container_type_id: i32, quantity: i32) -> Result<i32, ServiceError>
    where
        C: ConnectionTrait,
    {
        if quantity <= 0 {
            return Err(ServiceError::InvalidInput(format!(
                "Stock debit must be positive, got {}",
                quantity
            )));
        }

        let row = Self::lock_row(conn, container_type_id).await?;
        if row.stock < quantity {
            let name = Self::container_name(conn, container_type_id).await?;
            warn!(
                container_type_id,
                available = row.stock,
                requested = quantity,
                "Insufficient container stock"
            );
            counter!("refill_station_stock.insufficient", 1);
            return Err(ServiceError::InsufficientStock(format!(
                "{} has {} in stock, {} requested",
                name, row.stock, quantity
            )));
        }

        let result = container_stock::Entity::update_many()
            .col_expr(
                container_stock::Column::Stock,
                Expr::col(container_stock::Column::Stock).sub(quantity),
            )
            .col_expr(container_stock::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(container_stock::Column::ContainerTypeId.eq(container_type_id))
            .filter(container_stock::Column::Stock.gte(quantity))
            .exec(conn)
            .await?;

        if result.rows_affected != 1 {
            // Another writer got there between the read and the update
            counter!("refill_station_stock.insufficient", 1);
            return Err(ServiceError::InsufficientStock(format!(
                "container type {} no longer has {} in stock",
                container_type_id, quantity
            )));
        }

        counter!("refill_station_stock.debited", quantity as u64);
        let level = row.stock - quantity;
        debug!(container_type_id, quantity, level, "Stock debited");
        Ok(level)
    }

    /// Returns `quantity` units to stock and returns the new level.
    #[instrument(skip(conn))]
    pub async fn credit<C>(conn: &C, container_type_id: i32, quantity: i32) -> Result<i32, ServiceError>
    where
        C: ConnectionTrait,
    {
        if quantity <= 0 {
            return Err(ServiceError::InvalidInput(format!(
                "Stock credit must be positive, got {}",
                quantity
            )));
        }

        let row = Self::lock_row(conn, container_type_id).await?;

        container_stock::Entity::update_many()
            .col_expr(
                container_stock::Column::Stock,
                Expr::col(container_stock::Column::Stock).add(quantity),
            )
            .col_expr(container_stock::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(container_stock::Column::ContainerTypeId.eq(container_type_id))
            .exec(conn)
            .await?;

        counter!("refill_station_stock.credited", quantity as u64);
        let level = row.stock + quantity;
        debug!(container_type_id, quantity, level, "Stock credited");
        Ok(level)
    }

    /// Debits every commitment, grouped per container type.
    pub async fn debit_all<C, I>(conn: &C, commitments: I) -> Result<(), ServiceError>
    where
        C: ConnectionTrait,
        I: IntoIterator<Item = StockCommitment>,
    {
        for (container_type_id, quantity) in aggregate(commitments) {
            if quantity > 0 {
                Self::debit(conn, container_type_id, quantity).await?;
            }
        }
        Ok(())
    }

    /// Credits every commitment, grouped per container type.
    pub async fn credit_all<C, I>(conn: &C, commitments: I) -> Result<(), ServiceError>
    where
        C: ConnectionTrait,
        I: IntoIterator<Item = StockCommitment>,
    {
        for (container_type_id, quantity) in aggregate(commitments) {
            if quantity > 0 {
                Self::credit(conn, container_type_id, quantity).await?;
            }
        }
        Ok(())
    }

    /// Moves stock from what a line held (`old`) to what it now holds (`new`).
    ///
    /// Same container type: only the difference is applied. Otherwise the old
    /// commitment is credited in full and the new one debited in full.
    #[instrument(skip(conn))]
    pub async fn reconcile<C>(
        conn: &C,
        old: Option<StockCommitment>,
        new: Option<StockCommitment>,
    ) -> Result<(), ServiceError>
    where
        C: ConnectionTrait,
    {
        match (old, new) {
            (None, None) => Ok(()),
            (Some(old), None) => Self::credit(conn, old.container_type_id, old.quantity)
                .await
                .map(|_| ()),
            (None, Some(new)) => Self::debit(conn, new.container_type_id, new.quantity)
                .await
                .map(|_| ()),
            (Some(old), Some(new)) if old.container_type_id == new.container_type_id => {
                let delta = new.quantity - old.quantity;
                if delta > 0 {
                    Self::debit(conn, new.container_type_id, delta).await?;
                } else if delta < 0 {
                    Self::credit(conn, new.container_type_id, -delta).await?;
                }
                Ok(())
            }
            (Some(old), Some(new)) => {
                Self::credit(conn, old.container_type_id, old.quantity).await?;
                Self::debit(conn, new.container_type_id, new.quantity).await?;
                Ok(())
            }
        }
    }
}
