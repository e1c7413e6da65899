use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::{
    db::{self, DbPool},
    entities::{container_stock, container_type},
    errors::ServiceError,
    services::stock::StockLedger,
};

fn validate_decimal_min_zero(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(ValidationError::new("decimal_min_zero"));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateContainerTypeRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(custom = "validate_decimal_min_zero")]
    pub refill_price: Decimal,
    #[validate(custom = "validate_decimal_min_zero")]
    pub new_container_price: Decimal,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub initial_stock: i32,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateContainerPricesRequest {
    #[validate(custom = "validate_decimal_min_zero")]
    pub refill_price: Option<Decimal>,
    #[validate(custom = "validate_decimal_min_zero")]
    pub new_container_price: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct AddStockRequest {
    pub container_type_id: i32,
    #[validate(range(min = 1, max = 100000))]
    pub quantity: i32,
}

/// Stock level of one container type, with its name and prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ContainerStockView {
    pub container_type_id: i32,
    pub container_type_name: String,
    pub stock: i32,
    pub refill_price: Decimal,
    pub new_container_price: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl ContainerStockView {
    fn from_parts(stock: container_stock::Model, container: container_type::Model) -> Self {
        Self {
            container_type_id: container.id,
            container_type_name: container.name,
            stock: stock.stock,
            refill_price: container.refill_price,
            new_container_price: container.new_container_price,
            updated_at: stock.updated_at,
        }
    }
}

async fn stock_view<C>(conn: &C, container_type_id: i32) -> Result<ContainerStockView, ServiceError>
where
    C: ConnectionTrait,
{
    let (stock, container) = container_stock::Entity::find()
        .filter(container_stock::Column::ContainerTypeId.eq(container_type_id))
        .find_also_related(container_type::Entity)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Container stock for type", container_type_id))?;
    let container =
        container.ok_or_else(|| ServiceError::not_found("Container type", container_type_id))?;
    Ok(ContainerStockView::from_parts(stock, container))
}

/// Container types, their prices and the on-hand stock of new containers.
#[derive(Clone)]
pub struct InventoryService {
    db_pool: Arc<DbPool>,
}

impl InventoryService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn list_container_types(&self) -> Result<Vec<container_type::Model>, ServiceError> {
        Ok(container_type::Entity::find()
            .order_by_asc(container_type::Column::Id)
            .all(&*self.db_pool)
            .await?)
    }

    /// Creates a container type along with its stock counter.
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_container_type(
        &self,
        request: CreateContainerTypeRequest,
    ) -> Result<ContainerStockView, ServiceError> {
        request.validate()?;
        let name = request.name.trim().to_string();

        let txn = db::begin(&self.db_pool, "create_container_type").await?;
        let existing = container_type::Entity::find()
            .filter(container_type::Column::Name.eq(name.as_str()))
            .one(&txn)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Container type {} already exists",
                name
            )));
        }

        let now = Utc::now();
        let container = container_type::ActiveModel {
            name: Set(name),
            refill_price: Set(request.refill_price),
            new_container_price: Set(request.new_container_price),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let stock = container_stock::ActiveModel {
            container_type_id: Set(container.id),
            stock: Set(request.initial_stock),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        db::commit(txn, "create_container_type").await?;
        info!(container_type_id = container.id, stock = stock.stock, "Container type created");
        Ok(ContainerStockView::from_parts(stock, container))
    }

    /// New prices apply to lines written from now on; existing lines keep
    /// the price they were written with.
    #[instrument(skip(self))]
    pub async fn update_container_prices(
        &self,
        container_type_id: i32,
        request: UpdateContainerPricesRequest,
    ) -> Result<container_type::Model, ServiceError> {
        request.validate()?;
        if request.refill_price.is_none() && request.new_container_price.is_none() {
            return Err(ServiceError::ValidationError(
                "provide refill_price or new_container_price".into(),
            ));
        }

        let db = &*self.db_pool;
        let container = container_type::Entity::find_by_id(container_type_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Container type", container_type_id))?;

        let mut active: container_type::ActiveModel = container.into();
        if let Some(price) = request.refill_price {
            active.refill_price = Set(price);
        }
        if let Some(price) = request.new_container_price {
            active.new_container_price = Set(price);
        }
        let updated = active.update(db).await?;

        info!(
            container_type_id,
            refill_price = %updated.refill_price,
            new_container_price = %updated.new_container_price,
            "Container prices updated"
        );
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn get_container_stock(&self) -> Result<Vec<ContainerStockView>, ServiceError> {
        let rows = container_stock::Entity::find()
            .find_also_related(container_type::Entity)
            .order_by_asc(container_stock::Column::ContainerTypeId)
            .all(&*self.db_pool)
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|(stock, container)| {
                container.map(|c| ContainerStockView::from_parts(stock, c))
            })
            .collect())
    }

    pub async fn stock_of(&self, container_type_id: i32) -> Result<ContainerStockView, ServiceError> {
        stock_view(&*self.db_pool, container_type_id).await
    }

    /// Restocks new containers.
    #[instrument(skip(self))]
    pub async fn add_container_stock(
        &self,
        request: AddStockRequest,
    ) -> Result<ContainerStockView, ServiceError> {
        request.validate()?;

        let txn = db::begin(&self.db_pool, "add_container_stock").await?;
        let level =
            StockLedger::credit(&txn, request.container_type_id, request.quantity).await?;
        let view = stock_view(&txn, request.container_type_id).await?;
        db::commit(txn, "add_container_stock").await?;

        info!(
            container_type_id = request.container_type_id,
            added = request.quantity,
            level,
            "Container stock added"
        );
        Ok(view)
    }
}
