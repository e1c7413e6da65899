use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Deserialize;
use utoipa::IntoParams;

use super::common::{paginated, AppJson, AppPath, AppQuery, Deleted};
use crate::{
    entities::customer,
    errors::ServiceError,
    services::customers::{CreateCustomerRequest, UpdateCustomerRequest},
    ApiResponse, ApiResult, AppState, ListQuery, PaginatedResponse,
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CustomerSearchParams {
    /// Matched against first name, last name and phone
    pub q: String,
}

/// List customers
#[utoipa::path(
    get,
    path = "/api/v1/customers",
    tag = "customers",
    params(ListQuery),
    responses(
        (status = 200, description = "Customers retrieved", body = ApiResponse<PaginatedResponse<customer::Model>>),
    )
)]
pub async fn list_customers(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListQuery>,
) -> ApiResult<PaginatedResponse<customer::Model>> {
    let page = state
        .services
        .customers
        .list_customers(query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(paginated(
        page.customers,
        page.total,
        page.page,
        page.limit,
    ))))
}

/// Search customers by name or phone
#[utoipa::path(
    get,
    path = "/api/v1/customers/search",
    tag = "customers",
    params(CustomerSearchParams),
    responses(
        (status = 200, description = "Matching customers", body = ApiResponse<Vec<customer::Model>>),
        (status = 400, description = "Missing search term", body = crate::errors::ErrorResponse),
    )
)]
pub async fn search_customers(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<CustomerSearchParams>,
) -> ApiResult<Vec<customer::Model>> {
    let customers = state.services.customers.search_customers(&params.q).await?;
    Ok(Json(ApiResponse::success(customers)))
}

#[utoipa::path(
    get,
    path = "/api/v1/customers/{id}",
    tag = "customers",
    params(("id" = i32, Path, description = "Customer id")),
    responses(
        (status = 200, description = "Customer retrieved", body = ApiResponse<customer::Model>),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_customer(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
) -> ApiResult<customer::Model> {
    let customer = state.services.customers.get_customer(id).await?;
    Ok(Json(ApiResponse::success(customer)))
}

#[utoipa::path(
    post,
    path = "/api/v1/customers",
    tag = "customers",
    request_body = CreateCustomerRequest,
    responses(
        (status = 201, description = "Customer created", body = ApiResponse<customer::Model>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
    )
)]
pub async fn create_customer(
    State(state): State<AppState>,
    AppJson(request): AppJson<CreateCustomerRequest>,
) -> Result<(StatusCode, Json<ApiResponse<customer::Model>>), ServiceError> {
    let created = state.services.customers.create_customer(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

#[utoipa::path(
    put,
    path = "/api/v1/customers/{id}",
    tag = "customers",
    params(("id" = i32, Path, description = "Customer id")),
    request_body = UpdateCustomerRequest,
    responses(
        (status = 200, description = "Customer updated", body = ApiResponse<customer::Model>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn update_customer(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
    AppJson(request): AppJson<UpdateCustomerRequest>,
) -> ApiResult<customer::Model> {
    let updated = state.services.customers.update_customer(id, request).await?;
    Ok(Json(ApiResponse::success(updated)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/customers/{id}",
    tag = "customers",
    params(("id" = i32, Path, description = "Customer id")),
    responses(
        (status = 200, description = "Customer deleted", body = ApiResponse<Deleted>),
        (status = 404, description = "Customer not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Customer still has orders", body = crate::errors::ErrorResponse),
    )
)]
pub async fn delete_customer(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
) -> ApiResult<Deleted> {
    state.services.customers.delete_customer(id).await?;
    Ok(Json(
        ApiResponse::success(Deleted { id }).with_message(format!("Customer {} deleted", id)),
    ))
}

pub fn customer_routes() -> Router<AppState> {
    Router::new()
        .route("/customers", get(list_customers).post(create_customer))
        .route("/customers/search", get(search_customers))
        .route(
            "/customers/:id",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
}
