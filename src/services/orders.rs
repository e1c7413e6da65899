use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    db::{self, DbPool},
    entities::{
        container_type, customer, feedback,
        order::{self, OrderStatus, OrderType, PaymentStatus, ReceivingMethod},
        order_detail::{self, OrderCategory},
    },
    errors::ServiceError,
    services::{
        pricing,
        schedule::BusinessClock,
        stock::{StockCommitment, StockLedger},
        system_config,
    },
};

/// One requested line item.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct OrderLineInput {
    pub container_type_id: i32,
    /// `1` refill, `2` new purchase
    #[validate(range(min = 1, max = 2))]
    pub order_category_id: i32,
    #[validate(range(min = 1, max = 10000))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    pub customer_id: i32,
    pub order_type: OrderType,
    /// Mode of payment
    #[validate(length(min = 1, max = 50))]
    pub mop: String,
    pub receiving_method: ReceivingMethod,
    /// Defaults to the customer's address for deliveries
    #[validate(length(max = 255))]
    pub delivery_address: Option<String>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    #[validate(length(min = 1))]
    pub details: Vec<OrderLineInput>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderDetailRequest {
    pub container_type_id: Option<i32>,
    #[validate(range(min = 1, max = 2))]
    pub order_category_id: Option<i32>,
    #[validate(range(min = 1, max = 10000))]
    pub quantity: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderRequest {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    #[validate(length(min = 1, max = 50))]
    pub mop: Option<String>,
    pub receiving_method: Option<ReceivingMethod>,
    #[validate(length(max = 255))]
    pub delivery_address: Option<String>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

impl UpdateOrderRequest {
    fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.payment_status.is_none()
            && self.mop.is_none()
            && self.receiving_method.is_none()
            && self.delivery_address.is_none()
            && self.notes.is_none()
    }
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderListFilter {
    pub status: Option<OrderStatus>,
    pub customer_id: Option<i32>,
    /// Scheduled business date, `YYYY-MM-DD`
    pub order_date: Option<NaiveDate>,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_page() -> u64 {
    1
}

fn default_limit() -> u64 {
    20
}

impl Default for OrderListFilter {
    fn default() -> Self {
        Self {
            status: None,
            customer_id: None,
            order_date: None,
            page: default_page(),
            limit: default_limit(),
        }
    }
}

/// An order together with its line items.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderWithDetails {
    #[serde(flatten)]
    pub order: order::Model,
    pub details: Vec<order_detail::Model>,
}

#[derive(Debug, Clone)]
pub struct OrderPage {
    pub orders: Vec<order::Model>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

fn ensure_open(order: &order::Model) -> Result<(), ServiceError> {
    if order.status.is_cancelled() {
        Err(ServiceError::InvalidOperation(format!(
            "Order {} is cancelled; its details can no longer change",
            order.id
        )))
    } else {
        Ok(())
    }
}

/// Order row locked for the rest of the transaction.
async fn lock_order<C>(conn: &C, order_id: i32) -> Result<order::Model, ServiceError>
where
    C: ConnectionTrait,
{
    order::Entity::find_by_id(order_id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Order", order_id))
}

/// Locks the order owning `detail_id`, then re-reads the line under that lock
/// so the caller sees what the previous writer committed.
async fn lock_detail<C>(
    conn: &C,
    detail_id: i32,
) -> Result<(order::Model, order_detail::Model), ServiceError>
where
    C: ConnectionTrait,
{
    let order_id: i32 = order_detail::Entity::find_by_id(detail_id)
        .select_only()
        .column(order_detail::Column::OrderId)
        .into_tuple()
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Order detail", detail_id))?;
    let order = lock_order(conn, order_id).await?;

    let detail = order_detail::Entity::find_by_id(detail_id)
        .filter(order_detail::Column::OrderId.eq(order_id))
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Order detail", detail_id))?;
    Ok((order, detail))
}

async fn find_container<C>(conn: &C, container_type_id: i32) -> Result<container_type::Model, ServiceError>
where
    C: ConnectionTrait,
{
    container_type::Entity::find_by_id(container_type_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Container type", container_type_id))
}

async fn details_of<C>(conn: &C, order_id: i32) -> Result<Vec<order_detail::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    Ok(order_detail::Entity::find()
        .filter(order_detail::Column::OrderId.eq(order_id))
        .order_by_asc(order_detail::Column::Id)
        .all(conn)
        .await?)
}

/// Rewrites the stored total from the current line items.
async fn refresh_total<C>(conn: &C, order: order::Model) -> Result<OrderWithDetails, ServiceError>
where
    C: ConnectionTrait,
{
    let details = details_of(conn, order.id).await?;
    let total = pricing::order_total(&details);

    let mut active: order::ActiveModel = order.into();
    active.total_amount = Set(total);
    active.updated_at = Set(Utc::now());
    let order = active.update(conn).await?;

    debug!(order_id = order.id, total = %order.total_amount, "Order total recomputed");
    Ok(OrderWithDetails { order, details })
}

async fn insert_line<C>(
    conn: &C,
    order_id: i32,
    container: &container_type::Model,
    category: OrderCategory,
    quantity: i32,
) -> Result<order_detail::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    let unit_price = pricing::unit_price(container, category);
    let line = order_detail::ActiveModel {
        order_id: Set(order_id),
        container_type_id: Set(container.id),
        order_category: Set(category),
        quantity: Set(quantity),
        unit_price: Set(unit_price),
        subtotal: Set(pricing::subtotal(unit_price, quantity)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    Ok(line.insert(conn).await?)
}

/// Orders and their line items, with stock and totals kept in step.
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    clock: BusinessClock,
}

impl OrderService {
    pub fn new(db_pool: Arc<DbPool>, clock: BusinessClock) -> Self {
        Self { db_pool, clock }
    }

    pub fn clock(&self) -> &BusinessClock {
        &self.clock
    }

    async fn ensure_capacity<C>(&self, conn: &C, order_date: NaiveDate) -> Result<(), ServiceError>
    where
        C: ConnectionTrait,
    {
        let Some(cap) = system_config::max_orders_per_day(conn).await? else {
            return Ok(());
        };
        let booked = order::Entity::find()
            .filter(order::Column::OrderDate.eq(order_date))
            .filter(order::Column::Status.ne(OrderStatus::Cancelled))
            .count(conn)
            .await?;
        if booked >= cap {
            counter!("refill_station_orders.capacity_rejections", 1);
            return Err(ServiceError::DailyCapacityReached(format!(
                "{} already has {} of {} orders",
                order_date, booked, cap
            )));
        }
        Ok(())
    }

    /// Creates an order with its line items in one transaction.
    #[instrument(skip(self, request), fields(customer_id = request.customer_id, lines = request.details.len()))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<OrderWithDetails, ServiceError> {
        request.validate()?;
        let mut lines = Vec::with_capacity(request.details.len());
        for line in &request.details {
            line.validate()?;
            lines.push((line, OrderCategory::try_from(line.order_category_id)?));
        }

        let txn = db::begin(&self.db_pool, "create_order").await?;

        let customer = customer::Entity::find_by_id(request.customer_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Customer", request.customer_id))?;

        let now = Utc::now();
        let order_date = self.clock.order_date_at(now);
        self.ensure_capacity(&txn, order_date).await?;

        let status = match request.order_type {
            OrderType::Online => OrderStatus::ForApproval,
            OrderType::WalkIn => OrderStatus::Confirmed,
        };
        let delivery_address = match request.receiving_method {
            ReceivingMethod::Delivery => request
                .delivery_address
                .filter(|a| !a.trim().is_empty())
                .or_else(|| Some(customer.address.clone())),
            ReceivingMethod::Pickup => None,
        };

        let order = order::ActiveModel {
            customer_id: Set(customer.id),
            order_type: Set(request.order_type),
            status: Set(status),
            payment_status: Set(Some(PaymentStatus::Unpaid)),
            mop: Set(request.mop),
            receiving_method: Set(request.receiving_method),
            delivery_address: Set(delivery_address),
            notes: Set(request.notes),
            total_amount: Set(rust_decimal::Decimal::ZERO),
            order_date: Set(order_date),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut commitments = Vec::new();
        for (line, category) in lines {
            let container = find_container(&txn, line.container_type_id).await?;
            let detail = insert_line(&txn, order.id, &container, category, line.quantity).await?;
            commitments.extend(StockCommitment::of_detail(&detail));
        }
        StockLedger::debit_all(&txn, commitments).await?;

        let created = refresh_total(&txn, order).await?;
        db::commit(txn, "create_order").await?;

        counter!("refill_station_orders.created", 1);
        info!(
            order_id = created.order.id,
            order_date = %created.order.order_date,
            total = %created.order.total_amount,
            "Order created"
        );
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: i32) -> Result<OrderWithDetails, ServiceError> {
        let db = &*self.db_pool;
        let order = order::Entity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", order_id))?;
        let details = details_of(db, order_id).await?;
        Ok(OrderWithDetails { order, details })
    }

    /// Newest scheduled date first.
    #[instrument(skip(self))]
    pub async fn list_orders(&self, filter: OrderListFilter) -> Result<OrderPage, ServiceError> {
        let (page, limit) = super::page_window(filter.page, filter.limit);

        let mut query = order::Entity::find();
        if let Some(status) = filter.status {
            query = query.filter(order::Column::Status.eq(status));
        }
        if let Some(customer_id) = filter.customer_id {
            query = query.filter(order::Column::CustomerId.eq(customer_id));
        }
        if let Some(order_date) = filter.order_date {
            query = query.filter(order::Column::OrderDate.eq(order_date));
        }

        let paginator = query
            .order_by_desc(order::Column::OrderDate)
            .order_by_desc(order::Column::Id)
            .paginate(&*self.db_pool, limit);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page - 1).await?;

        Ok(OrderPage {
            orders,
            total,
            page,
            limit,
        })
    }

    #[instrument(skip(self, line))]
    pub async fn add_order_detail(
        &self,
        order_id: i32,
        line: OrderLineInput,
    ) -> Result<OrderWithDetails, ServiceError> {
        line.validate()?;
        let category = OrderCategory::try_from(line.order_category_id)?;

        let txn = db::begin(&self.db_pool, "add_order_detail").await?;
        let order = lock_order(&txn, order_id).await?;
        ensure_open(&order)?;

        let container = find_container(&txn, line.container_type_id).await?;
        let detail = insert_line(&txn, order.id, &container, category, line.quantity).await?;
        StockLedger::reconcile(&txn, None, StockCommitment::of_detail(&detail)).await?;

        let updated = refresh_total(&txn, order).await?;
        db::commit(txn, "add_order_detail").await?;

        info!(order_id, detail_id = detail.id, "Order detail added");
        Ok(updated)
    }

    /// Changes a line's container type, category or quantity, re-pricing it
    /// at current prices.
    #[instrument(skip(self, request))]
    pub async fn update_order_detail(
        &self,
        detail_id: i32,
        request: UpdateOrderDetailRequest,
    ) -> Result<OrderWithDetails, ServiceError> {
        request.validate()?;
        if request.container_type_id.is_none()
            && request.order_category_id.is_none()
            && request.quantity.is_none()
        {
            return Err(ServiceError::ValidationError(
                "provide container_type_id, order_category_id or quantity".into(),
            ));
        }

        let txn = db::begin(&self.db_pool, "update_order_detail").await?;
        let (order, detail) = lock_detail(&txn, detail_id).await?;
        ensure_open(&order)?;

        let container_type_id = request.container_type_id.unwrap_or(detail.container_type_id);
        let category = match request.order_category_id {
            Some(id) => OrderCategory::try_from(id)?,
            None => detail.order_category,
        };
        let quantity = request.quantity.unwrap_or(detail.quantity);
        let container = find_container(&txn, container_type_id).await?;

        StockLedger::reconcile(
            &txn,
            StockCommitment::of_detail(&detail),
            StockCommitment::for_line(container_type_id, category, quantity),
        )
        .await?;

        let unit_price = pricing::unit_price(&container, category);
        let mut active: order_detail::ActiveModel = detail.into();
        active.container_type_id = Set(container_type_id);
        active.order_category = Set(category);
        active.quantity = Set(quantity);
        active.unit_price = Set(unit_price);
        active.subtotal = Set(pricing::subtotal(unit_price, quantity));
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;

        let updated = refresh_total(&txn, order).await?;
        db::commit(txn, "update_order_detail").await?;

        info!(detail_id, order_id = updated.order.id, "Order detail updated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete_order_detail(&self, detail_id: i32) -> Result<OrderWithDetails, ServiceError> {
        let txn = db::begin(&self.db_pool, "delete_order_detail").await?;
        let (order, detail) = lock_detail(&txn, detail_id).await?;
        ensure_open(&order)?;

        let removed = order_detail::Entity::delete_by_id(detail.id).exec(&txn).await?;
        if removed.rows_affected == 0 {
            return Err(ServiceError::not_found("Order detail", detail_id));
        }
        StockLedger::reconcile(&txn, StockCommitment::of_detail(&detail), None).await?;

        let updated = refresh_total(&txn, order).await?;
        db::commit(txn, "delete_order_detail").await?;

        info!(detail_id, order_id = updated.order.id, "Order detail deleted");
        Ok(updated)
    }

    /// Updates status and header fields. Any status may follow any other.
    ///
    /// Entering `Cancelled` returns new-purchase stock and clears the payment
    /// status; leaving it takes the stock out again.
    #[instrument(skip(self, request))]
    pub async fn update_order(
        &self,
        order_id: i32,
        request: UpdateOrderRequest,
    ) -> Result<OrderWithDetails, ServiceError> {
        request.validate()?;
        if request.is_empty() {
            return Err(ServiceError::ValidationError(
                "no order fields to update".into(),
            ));
        }

        let txn = db::begin(&self.db_pool, "update_order").await?;
        let order = lock_order(&txn, order_id).await?;
        let details = details_of(&txn, order_id).await?;

        let was_cancelled = order.status.is_cancelled();
        let new_status = request.status.unwrap_or(order.status);
        let commitments = || details.iter().filter_map(StockCommitment::of_detail);

        let mut payment_status = request.payment_status.or(order.payment_status);
        match (was_cancelled, new_status.is_cancelled()) {
            (false, true) => {
                StockLedger::credit_all(&txn, commitments()).await?;
                payment_status = None;
                counter!("refill_station_orders.cancelled", 1);
                info!(order_id, "Order cancelled; stock returned");
            }
            (true, false) => {
                StockLedger::debit_all(&txn, commitments()).await?;
                payment_status = payment_status.or(Some(PaymentStatus::Unpaid));
                info!(order_id, status = %new_status, "Cancelled order reopened");
            }
            (true, true) => {
                if request.payment_status.is_some() {
                    return Err(ServiceError::InvalidOperation(format!(
                        "Order {} is cancelled; payment status cannot be set",
                        order_id
                    )));
                }
                payment_status = None;
            }
            (false, false) => {}
        }

        let mut active: order::ActiveModel = order.into();
        active.status = Set(new_status);
        active.payment_status = Set(payment_status);
        if let Some(mop) = request.mop {
            active.mop = Set(mop);
        }
        if let Some(method) = request.receiving_method {
            active.receiving_method = Set(method);
        }
        if let Some(address) = request.delivery_address {
            active.delivery_address = Set(Some(address).filter(|a| !a.trim().is_empty()));
        }
        if let Some(notes) = request.notes {
            active.notes = Set(Some(notes));
        }
        active.updated_at = Set(Utc::now());
        let order = active.update(&txn).await?;

        db::commit(txn, "update_order").await?;
        Ok(OrderWithDetails { order, details })
    }

    /// Removes an order and its details, returning any stock it still holds.
    #[instrument(skip(self))]
    pub async fn delete_order(&self, order_id: i32) -> Result<(), ServiceError> {
        let txn = db::begin(&self.db_pool, "delete_order").await?;
        let order = lock_order(&txn, order_id).await?;
        let details = details_of(&txn, order_id).await?;

        // A cancelled order already gave its stock back
        if !order.status.is_cancelled() {
            StockLedger::credit_all(&txn, details.iter().filter_map(StockCommitment::of_detail))
                .await?;
        }

        feedback::Entity::delete_many()
            .filter(feedback::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await?;
        order_detail::Entity::delete_many()
            .filter(order_detail::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await?;
        order::Entity::delete_by_id(order_id).exec(&txn).await?;

        db::commit(txn, "delete_order").await?;

        counter!("refill_station_orders.deleted", 1);
        info!(order_id, lines = details.len(), "Order deleted");
        Ok(())
    }
}
