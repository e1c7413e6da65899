use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};

use super::common::{AppJson, AppPath};
use crate::{
    entities::container_type,
    errors::ServiceError,
    services::inventory::{
        AddStockRequest, ContainerStockView, CreateContainerTypeRequest,
        UpdateContainerPricesRequest,
    },
    ApiResponse, ApiResult, AppState,
};

/// List container types and their prices
#[utoipa::path(
    get,
    path = "/api/v1/container-types",
    tag = "inventory",
    responses(
        (status = 200, description = "Container types retrieved", body = ApiResponse<Vec<container_type::Model>>),
    )
)]
pub async fn list_container_types(
    State(state): State<AppState>,
) -> ApiResult<Vec<container_type::Model>> {
    let types = state.services.inventory.list_container_types().await?;
    Ok(Json(ApiResponse::success(types)))
}

/// Register a new container type with its opening stock
#[utoipa::path(
    post,
    path = "/api/v1/container-types",
    tag = "inventory",
    request_body = CreateContainerTypeRequest,
    responses(
        (status = 201, description = "Container type created", body = ApiResponse<ContainerStockView>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 409, description = "Name already in use", body = crate::errors::ErrorResponse),
    )
)]
pub async fn create_container_type(
    State(state): State<AppState>,
    AppJson(request): AppJson<CreateContainerTypeRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ContainerStockView>>), ServiceError> {
    let created = state.services.inventory.create_container_type(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

/// Change refill and/or new-container prices
#[utoipa::path(
    put,
    path = "/api/v1/container-types/{id}/prices",
    tag = "inventory",
    params(("id" = i32, Path, description = "Container type id")),
    request_body = UpdateContainerPricesRequest,
    responses(
        (status = 200, description = "Prices updated", body = ApiResponse<container_type::Model>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Container type not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn update_container_prices(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
    AppJson(request): AppJson<UpdateContainerPricesRequest>,
) -> ApiResult<container_type::Model> {
    let updated = state
        .services
        .inventory
        .update_container_prices(id, request)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}

/// Current stock of every container type
#[utoipa::path(
    get,
    path = "/api/v1/container-stock",
    tag = "inventory",
    responses(
        (status = 200, description = "Stock levels retrieved", body = ApiResponse<Vec<ContainerStockView>>),
    )
)]
pub async fn get_container_stock(
    State(state): State<AppState>,
) -> ApiResult<Vec<ContainerStockView>> {
    let stock = state.services.inventory.get_container_stock().await?;
    Ok(Json(ApiResponse::success(stock)))
}

/// Restock new containers
#[utoipa::path(
    post,
    path = "/api/v1/container-stock",
    tag = "inventory",
    request_body = AddStockRequest,
    responses(
        (status = 200, description = "Stock added; returns the new level", body = ApiResponse<ContainerStockView>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Container type not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn add_container_stock(
    State(state): State<AppState>,
    AppJson(request): AppJson<AddStockRequest>,
) -> ApiResult<ContainerStockView> {
    let view = state.services.inventory.add_container_stock(request).await?;
    let message = format!(
        "{} now has {} in stock",
        view.container_type_name, view.stock
    );
    Ok(Json(ApiResponse::success(view).with_message(message)))
}

pub fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/container-types",
            get(list_container_types).post(create_container_type),
        )
        .route("/container-types/:id/prices", put(update_container_prices))
        .route(
            "/container-stock",
            get(get_container_stock).post(add_container_stock),
        )
}
