use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};

use super::common::{paginated, AppJson, AppPath, AppQuery, Deleted};
use crate::{
    entities::order,
    errors::ServiceError,
    services::orders::{
        CreateOrderRequest, OrderLineInput, OrderListFilter, OrderWithDetails,
        UpdateOrderDetailRequest, UpdateOrderRequest,
    },
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

/// List orders
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    tag = "orders",
    summary = "List orders",
    description = "Paginated orders, newest scheduled date first, optionally filtered by status, customer or date",
    params(OrderListFilter),
    responses(
        (status = 200, description = "Orders retrieved", body = ApiResponse<PaginatedResponse<order::Model>>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid query parameters", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn list_orders(
    State(state): State<AppState>,
    AppQuery(filter): AppQuery<OrderListFilter>,
) -> ApiResult<PaginatedResponse<order::Model>> {
    let page = state.services.orders.list_orders(filter).await?;
    Ok(Json(ApiResponse::success(paginated(
        page.orders,
        page.total,
        page.page,
        page.limit,
    ))))
}

/// Create an order with its line items
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    tag = "orders",
    summary = "Create order",
    description = "Online orders start as For Approval and walk-ins as Confirmed. New-purchase lines take containers out of stock.",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<OrderWithDetails>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown customer or container type", body = crate::errors::ErrorResponse),
        (status = 409, description = "Daily order capacity reached", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn create_order(
    State(state): State<AppState>,
    AppJson(request): AppJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderWithDetails>>), ServiceError> {
    let created = state.services.orders.create_order(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

/// Get an order with its line items
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    tag = "orders",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order retrieved", body = ApiResponse<OrderWithDetails>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_order(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
) -> ApiResult<OrderWithDetails> {
    let order = state.services.orders.get_order(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Update status, payment and delivery fields of an order
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}",
    tag = "orders",
    description = "Any status may be set. Cancelling returns new-purchase stock and clears the payment status; cancelling twice changes nothing.",
    params(("id" = i32, Path, description = "Order id")),
    request_body = UpdateOrderRequest,
    responses(
        (status = 200, description = "Order updated", body = ApiResponse<OrderWithDetails>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Operation not allowed for this order", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock to reopen", body = crate::errors::ErrorResponse),
    )
)]
pub async fn update_order(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
    AppJson(request): AppJson<UpdateOrderRequest>,
) -> ApiResult<OrderWithDetails> {
    let order = state.services.orders.update_order(id, request).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Delete an order and its line items
#[utoipa::path(
    delete,
    path = "/api/v1/orders/{id}",
    tag = "orders",
    params(("id" = i32, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order deleted", body = ApiResponse<Deleted>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn delete_order(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
) -> ApiResult<Deleted> {
    state.services.orders.delete_order(id).await?;
    Ok(Json(
        ApiResponse::success(Deleted { id }).with_message(format!("Order {} deleted", id)),
    ))
}

/// Add a line item to an order
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/details",
    tag = "orders",
    params(("id" = i32, Path, description = "Order id")),
    request_body = OrderLineInput,
    responses(
        (status = 201, description = "Detail added; returns the updated order", body = ApiResponse<OrderWithDetails>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order or container type not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order is cancelled", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
    )
)]
pub async fn add_order_detail(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
    AppJson(line): AppJson<OrderLineInput>,
) -> Result<(StatusCode, Json<ApiResponse<OrderWithDetails>>), ServiceError> {
    let order = state.services.orders.add_order_detail(id, line).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(order))))
}

/// Change a line item's container type, category or quantity
#[utoipa::path(
    put,
    path = "/api/v1/order-details/{id}",
    tag = "orders",
    params(("id" = i32, Path, description = "Order detail id")),
    request_body = UpdateOrderDetailRequest,
    responses(
        (status = 200, description = "Detail updated; returns the updated order", body = ApiResponse<OrderWithDetails>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Detail or container type not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order is cancelled", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
    )
)]
pub async fn update_order_detail(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
    AppJson(request): AppJson<UpdateOrderDetailRequest>,
) -> ApiResult<OrderWithDetails> {
    let order = state.services.orders.update_order_detail(id, request).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Remove a line item from its order
#[utoipa::path(
    delete,
    path = "/api/v1/order-details/{id}",
    tag = "orders",
    params(("id" = i32, Path, description = "Order detail id")),
    responses(
        (status = 200, description = "Detail removed; returns the updated order", body = ApiResponse<OrderWithDetails>),
        (status = 404, description = "Detail not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order is cancelled", body = crate::errors::ErrorResponse),
    )
)]
pub async fn delete_order_detail(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
) -> ApiResult<OrderWithDetails> {
    let order = state.services.orders.delete_order_detail(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders).post(create_order))
        .route(
            "/orders/:id",
            get(get_order).put(update_order).delete(delete_order),
        )
        .route("/orders/:id/details", post(add_order_detail))
        .route(
            "/order-details/:id",
            put(update_order_detail).delete(delete_order_detail),
        )
}
