//! Database entities for the refill station schema.

pub mod container_stock;
pub mod container_type;
pub mod customer;
pub mod feedback;
pub mod order;
pub mod order_detail;
pub mod system_config;
