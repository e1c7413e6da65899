use axum::{extract::State, http::StatusCode, routing::get, Json, Router};

use super::common::{paginated, AppJson, AppQuery};
use crate::{
    entities::feedback,
    errors::ServiceError,
    services::feedback::{CreateFeedbackRequest, FeedbackSummary},
    ApiResponse, ApiResult, AppState, ListQuery, PaginatedResponse,
};

/// Feedback entries, newest first
#[utoipa::path(
    get,
    path = "/api/v1/feedback",
    tag = "feedback",
    params(ListQuery),
    responses(
        (status = 200, description = "Feedback retrieved", body = ApiResponse<PaginatedResponse<feedback::Model>>),
    )
)]
pub async fn list_feedback(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListQuery>,
) -> ApiResult<PaginatedResponse<feedback::Model>> {
    let page = state
        .services
        .feedback
        .list_feedback(query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(paginated(
        page.feedback,
        page.total,
        page.page,
        page.limit,
    ))))
}

/// Rating count, average and per-star distribution
#[utoipa::path(
    get,
    path = "/api/v1/feedback/summary",
    tag = "feedback",
    responses(
        (status = 200, description = "Feedback summary", body = ApiResponse<FeedbackSummary>),
    )
)]
pub async fn feedback_summary(State(state): State<AppState>) -> ApiResult<FeedbackSummary> {
    let summary = state.services.feedback.feedback_summary().await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// Rate a completed order
#[utoipa::path(
    post,
    path = "/api/v1/feedback",
    tag = "feedback",
    request_body = CreateFeedbackRequest,
    responses(
        (status = 201, description = "Feedback recorded", body = ApiResponse<feedback::Model>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order not completed or already rated", body = crate::errors::ErrorResponse),
    )
)]
pub async fn create_feedback(
    State(state): State<AppState>,
    AppJson(request): AppJson<CreateFeedbackRequest>,
) -> Result<(StatusCode, Json<ApiResponse<feedback::Model>>), ServiceError> {
    let created = state.services.feedback.create_feedback(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

pub fn feedback_routes() -> Router<AppState> {
    Router::new()
        .route("/feedback", get(list_feedback).post(create_feedback))
        .route("/feedback/summary", get(feedback_summary))
}
