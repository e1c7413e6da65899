#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use refill_station_api::{
    config::AppConfig,
    db,
    entities::{container_stock, customer, order, order_detail},
    services::{
        customers::CreateCustomerRequest,
        inventory::{ContainerStockView, CreateContainerTypeRequest},
        orders::{CreateOrderRequest, OrderLineInput},
    },
    AppState,
};

use refill_station_api::entities::order::{OrderType, ReceivingMethod};

/// Application state and router over a private SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _dir: Option<TempDir>,
}

fn test_config(database_url: String, connections: u32) -> AppConfig {
    let mut cfg = AppConfig::new(
        database_url,
        "127.0.0.1".to_string(),
        18_080,
        "development".to_string(),
    );
    cfg.db_max_connections = connections;
    cfg.db_min_connections = 1;
    cfg
}

impl TestApp {
    /// In-memory database behind a single connection, so transactions run
    /// one at a time.
    pub async fn new() -> Self {
        Self::start(test_config("sqlite::memory:".to_string(), 1), None).await
    }

    /// File-backed database behind a pool of `connections`, for tests where
    /// transactions really overlap.
    pub async fn on_disk(connections: u32) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let url = format!(
            "sqlite://{}?mode=rwc",
            dir.path().join("refill-station.db").display()
        );
        Self::start(test_config(url, connections), Some(dir)).await
    }

    async fn start(cfg: AppConfig, dir: Option<TempDir>) -> Self {
        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg);
        let router = refill_station_api::build_router(state.clone()).expect("router");

        Self {
            router,
            state,
            _dir: dir,
        }
    }

    pub fn db(&self) -> &db::DbPool {
        &self.state.db
    }

    pub async fn seed_customer(&self, first_name: &str) -> customer::Model {
        self.state
            .services
            .customers
            .create_customer(CreateCustomerRequest {
                account_id: None,
                first_name: first_name.to_string(),
                last_name: "Santos".to_string(),
                phone: "0917-555-0101".to_string(),
                email: None,
                address: format!("{} St., Barangay Uno", first_name),
                customer_type: None,
            })
            .await
            .expect("seed customer")
    }

    pub async fn seed_container(
        &self,
        name: &str,
        refill_price: Decimal,
        new_container_price: Decimal,
        initial_stock: i32,
    ) -> ContainerStockView {
        self.state
            .services
            .inventory
            .create_container_type(CreateContainerTypeRequest {
                name: name.to_string(),
                refill_price,
                new_container_price,
                initial_stock,
            })
            .await
            .expect("seed container type")
    }

    pub async fn stock(&self, container_type_id: i32) -> i32 {
        container_stock::Entity::find()
            .filter(container_stock::Column::ContainerTypeId.eq(container_type_id))
            .one(self.db())
            .await
            .expect("stock query")
            .expect("stock row")
            .stock
    }

    /// New containers currently held by live (not cancelled) orders.
    pub async fn committed_new_containers(&self, container_type_id: i32) -> i32 {
        order_detail::Entity::find()
            .find_also_related(order::Entity)
            .filter(order_detail::Column::ContainerTypeId.eq(container_type_id))
            .all(self.db())
            .await
            .expect("details query")
            .into_iter()
            .filter(|(detail, order)| {
                detail.order_category.consumes_stock()
                    && order.as_ref().map_or(false, |o| !o.status.is_cancelled())
            })
            .map(|(detail, _)| detail.quantity)
            .sum()
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn request_raw(&self, method: Method, uri: &str, body: &'static str) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

pub fn line(container_type_id: i32, order_category_id: i32, quantity: i32) -> OrderLineInput {
    OrderLineInput {
        container_type_id,
        order_category_id,
        quantity,
    }
}

pub fn walk_in(customer_id: i32, details: Vec<OrderLineInput>) -> CreateOrderRequest {
    CreateOrderRequest {
        customer_id,
        order_type: OrderType::WalkIn,
        mop: "Cash".to_string(),
        receiving_method: ReceivingMethod::Pickup,
        delivery_address: None,
        notes: None,
        details,
    }
}
