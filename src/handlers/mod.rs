pub mod common;
pub mod customers;
pub mod feedback;
pub mod inventory;
pub mod orders;
pub mod system_config;

use std::sync::Arc;

use crate::{
    db::DbPool,
    services::{
        customers::CustomerService, feedback::FeedbackService, inventory::InventoryService,
        orders::OrderService, schedule::BusinessClock, system_config::SystemConfigService,
    },
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub inventory: Arc<InventoryService>,
    pub customers: Arc<CustomerService>,
    pub system_config: Arc<SystemConfigService>,
    pub feedback: Arc<FeedbackService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, clock: BusinessClock) -> Self {
        Self {
            orders: Arc::new(OrderService::new(db_pool.clone(), clock)),
            inventory: Arc::new(InventoryService::new(db_pool.clone())),
            customers: Arc::new(CustomerService::new(db_pool.clone())),
            system_config: Arc::new(SystemConfigService::new(db_pool.clone())),
            feedback: Arc::new(FeedbackService::new(db_pool)),
        }
    }
}
