use axum::{routing::get, Json, Router};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Refill Station API",
        version = "0.1.0",
        description = r#"
# Water Refilling Station Admin API

Back office for a water refilling station: customers, orders and their line
items, container prices and stock, operational settings and customer feedback.

## Orders and stock

- A line item is priced from its container type: the refill price for
  category `1` (refill) and the new-container price for category `2`
  (new purchase).
- An order's `total_amount` always equals the sum of its line subtotals.
- New-purchase lines take containers out of stock; deleting them, reducing
  them, cancelling or deleting the order puts them back.
- Orders placed at or after the daily cutoff (17:00 local by default) are
  scheduled for the next day.

## Errors

Failures share one body:

```json
{
  "success": false,
  "error": "Unprocessable Entity",
  "message": "Insufficient stock: Slim 5 gal has 2 in stock, 3 requested",
  "request_id": "4f6c...",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "orders", description = "Orders and order details"),
        (name = "inventory", description = "Container types, prices and stock"),
        (name = "customers", description = "Customer records"),
        (name = "system-config", description = "Operational settings"),
        (name = "feedback", description = "Ratings of completed orders")
    ),
    paths(
        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::create_order,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_order,
        crate::handlers::orders::delete_order,
        crate::handlers::orders::add_order_detail,
        crate::handlers::orders::update_order_detail,
        crate::handlers::orders::delete_order_detail,

        // Inventory
        crate::handlers::inventory::list_container_types,
        crate::handlers::inventory::create_container_type,
        crate::handlers::inventory::update_container_prices,
        crate::handlers::inventory::get_container_stock,
        crate::handlers::inventory::add_container_stock,

        // Customers
        crate::handlers::customers::list_customers,
        crate::handlers::customers::search_customers,
        crate::handlers::customers::get_customer,
        crate::handlers::customers::create_customer,
        crate::handlers::customers::update_customer,
        crate::handlers::customers::delete_customer,

        // System config
        crate::handlers::system_config::get_config,
        crate::handlers::system_config::update_config,
        crate::handlers::system_config::get_capacity,
        crate::handlers::system_config::update_capacity,
        crate::handlers::system_config::get_operating_hours,
        crate::handlers::system_config::update_operating_hours,
        crate::handlers::system_config::get_maintenance,
        crate::handlers::system_config::update_maintenance,
        crate::handlers::system_config::get_contact,
        crate::handlers::system_config::update_contact,

        // Feedback
        crate::handlers::feedback::list_feedback,
        crate::handlers::feedback::feedback_summary,
        crate::handlers::feedback::create_feedback,
    ),
    components(
        schemas(
            crate::entities::order::OrderStatus,
            crate::entities::order::OrderType,
            crate::entities::order::PaymentStatus,
            crate::entities::order::ReceivingMethod,
            crate::entities::order_detail::OrderCategory,
            crate::entities::customer::CustomerType,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub const OPENAPI_JSON_PATH: &str = "/api-docs/openapi.json";

/// Serves the generated document as JSON.
pub fn openapi_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(
        OPENAPI_JSON_PATH,
        get(|| async { Json(ApiDocV1::openapi()) }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_resource() {
        let json = serde_json::to_string(&ApiDocV1::openapi()).unwrap();
        assert!(json.contains("Refill Station API"));
        for path in [
            "/api/v1/orders/{id}",
            "/api/v1/order-details/{id}",
            "/api/v1/container-stock",
            "/api/v1/customers/search",
            "/api/v1/system-config/operating-hours",
            "/api/v1/feedback/summary",
        ] {
            assert!(json.contains(path), "missing {}", path);
        }
    }
}
