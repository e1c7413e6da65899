use std::collections::BTreeMap;

use axum::{extract::State, routing::get, Json, Router};

use super::common::AppJson;
use crate::{
    services::system_config::{CapacityConfig, ContactConfig, MaintenanceConfig, OperatingHours},
    ApiResponse, ApiResult, AppState,
};

/// All configuration keys and values
#[utoipa::path(
    get,
    path = "/api/v1/system-config",
    tag = "system-config",
    responses(
        (status = 200, description = "Configuration retrieved", body = ApiResponse<BTreeMap<String, String>>),
    )
)]
pub async fn get_config(State(state): State<AppState>) -> ApiResult<BTreeMap<String, String>> {
    let config = state.services.system_config.get_config().await?;
    Ok(Json(ApiResponse::success(config)))
}

/// Upsert configuration keys
#[utoipa::path(
    put,
    path = "/api/v1/system-config",
    tag = "system-config",
    request_body = BTreeMap<String, String>,
    responses(
        (status = 200, description = "Configuration updated; returns every key", body = ApiResponse<BTreeMap<String, String>>),
        (status = 400, description = "Invalid key or value", body = crate::errors::ErrorResponse),
    )
)]
pub async fn update_config(
    State(state): State<AppState>,
    AppJson(entries): AppJson<BTreeMap<String, String>>,
) -> ApiResult<BTreeMap<String, String>> {
    let config = state.services.system_config.update_config(entries).await?;
    Ok(Json(ApiResponse::success(config)))
}

#[utoipa::path(
    get,
    path = "/api/v1/system-config/capacity",
    tag = "system-config",
    responses((status = 200, description = "Daily order capacity", body = ApiResponse<CapacityConfig>))
)]
pub async fn get_capacity(State(state): State<AppState>) -> ApiResult<CapacityConfig> {
    let capacity = state.services.system_config.capacity().await?;
    Ok(Json(ApiResponse::success(capacity)))
}

#[utoipa::path(
    put,
    path = "/api/v1/system-config/capacity",
    tag = "system-config",
    request_body = CapacityConfig,
    responses(
        (status = 200, description = "Daily order capacity updated", body = ApiResponse<CapacityConfig>),
        (status = 400, description = "Invalid capacity", body = crate::errors::ErrorResponse),
    )
)]
pub async fn update_capacity(
    State(state): State<AppState>,
    AppJson(request): AppJson<CapacityConfig>,
) -> ApiResult<CapacityConfig> {
    let capacity = state.services.system_config.update_capacity(request).await?;
    Ok(Json(ApiResponse::success(capacity)))
}

#[utoipa::path(
    get,
    path = "/api/v1/system-config/operating-hours",
    tag = "system-config",
    responses(
        (status = 200, description = "Operating hours", body = ApiResponse<OperatingHours>),
        (status = 404, description = "Hours not configured", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_operating_hours(State(state): State<AppState>) -> ApiResult<OperatingHours> {
    let hours = state.services.system_config.operating_hours().await?;
    Ok(Json(ApiResponse::success(hours)))
}

#[utoipa::path(
    put,
    path = "/api/v1/system-config/operating-hours",
    tag = "system-config",
    request_body = OperatingHours,
    responses(
        (status = 200, description = "Operating hours updated", body = ApiResponse<OperatingHours>),
        (status = 400, description = "Opening time not before closing time", body = crate::errors::ErrorResponse),
    )
)]
pub async fn update_operating_hours(
    State(state): State<AppState>,
    AppJson(request): AppJson<OperatingHours>,
) -> ApiResult<OperatingHours> {
    let hours = state
        .services
        .system_config
        .update_operating_hours(request)
        .await?;
    Ok(Json(ApiResponse::success(hours)))
}

#[utoipa::path(
    get,
    path = "/api/v1/system-config/maintenance",
    tag = "system-config",
    responses((status = 200, description = "Maintenance notice", body = ApiResponse<MaintenanceConfig>))
)]
pub async fn get_maintenance(State(state): State<AppState>) -> ApiResult<MaintenanceConfig> {
    let maintenance = state.services.system_config.maintenance().await?;
    Ok(Json(ApiResponse::success(maintenance)))
}

#[utoipa::path(
    put,
    path = "/api/v1/system-config/maintenance",
    tag = "system-config",
    request_body = MaintenanceConfig,
    responses(
        (status = 200, description = "Maintenance notice updated", body = ApiResponse<MaintenanceConfig>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
    )
)]
pub async fn update_maintenance(
    State(state): State<AppState>,
    AppJson(request): AppJson<MaintenanceConfig>,
) -> ApiResult<MaintenanceConfig> {
    let maintenance = state
        .services
        .system_config
        .update_maintenance(request)
        .await?;
    Ok(Json(ApiResponse::success(maintenance)))
}

#[utoipa::path(
    get,
    path = "/api/v1/system-config/contact",
    tag = "system-config",
    responses((status = 200, description = "Business contact details", body = ApiResponse<ContactConfig>))
)]
pub async fn get_contact(State(state): State<AppState>) -> ApiResult<ContactConfig> {
    let contact = state.services.system_config.contact().await?;
    Ok(Json(ApiResponse::success(contact)))
}

#[utoipa::path(
    put,
    path = "/api/v1/system-config/contact",
    tag = "system-config",
    request_body = ContactConfig,
    responses(
        (status = 200, description = "Contact details updated", body = ApiResponse<ContactConfig>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
    )
)]
pub async fn update_contact(
    State(state): State<AppState>,
    AppJson(request): AppJson<ContactConfig>,
) -> ApiResult<ContactConfig> {
    let contact = state.services.system_config.update_contact(request).await?;
    Ok(Json(ApiResponse::success(contact)))
}

pub fn system_config_routes() -> Router<AppState> {
    Router::new()
        .route("/system-config", get(get_config).put(update_config))
        .route(
            "/system-config/capacity",
            get(get_capacity).put(update_capacity),
        )
        .route(
            "/system-config/operating-hours",
            get(get_operating_hours).put(update_operating_hours),
        )
        .route(
            "/system-config/maintenance",
            get(get_maintenance).put(update_maintenance),
        )
        .route(
            "/system-config/contact",
            get(get_contact).put(update_contact),
        )
}
