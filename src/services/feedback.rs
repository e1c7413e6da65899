use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    db::{self, DbPool},
    entities::{
        feedback,
        order::{self, OrderStatus},
    },
    errors::ServiceError,
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateFeedbackRequest {
    pub order_id: i32,
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,
    #[validate(length(max = 1000))]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FeedbackSummary {
    pub count: u64,
    /// Mean rating to two decimal places, absent when there is no feedback
    pub average_rating: Option<Decimal>,
    /// Number of ratings per star, index 0 holding one-star ratings
    pub distribution: Vec<u64>,
}

impl FeedbackSummary {
    /// Builds the summary from `(rating, count)` pairs.
    fn from_counts(counts: &[(i32, i64)]) -> Self {
        let mut distribution = vec![0u64; 5];
        let mut total: u64 = 0;
        let mut sum: i64 = 0;
        for &(rating, n) in counts {
            let n = u64::try_from(n).unwrap_or(0);
            if let Some(slot) = usize::try_from(rating - 1)
                .ok()
                .and_then(|idx| distribution.get_mut(idx))
            {
                *slot += n;
            }
            total += n;
            sum += i64::from(rating) * n as i64;
        }
        let average_rating = (total > 0)
            .then(|| (Decimal::from(sum) / Decimal::from(total)).round_dp(2));
        Self {
            count: total,
            average_rating,
            distribution,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeedbackPage {
    pub feedback: Vec<feedback::Model>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

/// Customer ratings of completed orders.
#[derive(Clone)]
pub struct FeedbackService {
    db_pool: Arc<DbPool>,
}

impl FeedbackService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Newest first.
    #[instrument(skip(self))]
    pub async fn list_feedback(&self, page: u64, limit: u64) -> Result<FeedbackPage, ServiceError> {
        let (page, limit) = super::page_window(page, limit);
        let paginator = feedback::Entity::find()
            .order_by_desc(feedback::Column::CreatedAt)
            .order_by_desc(feedback::Column::Id)
            .paginate(&*self.db_pool, limit);
        let total = paginator.num_items().await?;
        let feedback = paginator.fetch_page(page - 1).await?;
        Ok(FeedbackPage {
            feedback,
            total,
            page,
            limit,
        })
    }

    #[instrument(skip(self))]
    pub async fn feedback_summary(&self) -> Result<FeedbackSummary, ServiceError> {
        let counts: Vec<(i32, i64)> = feedback::Entity::find()
            .select_only()
            .column(feedback::Column::Rating)
            .column_as(
                Expr::col((feedback::Entity, feedback::Column::Id)).count(),
                "ratings",
            )
            .group_by(feedback::Column::Rating)
            .into_tuple()
            .all(&*self.db_pool)
            .await?;
        Ok(FeedbackSummary::from_counts(&counts))
    }

    /// Only completed orders can be rated, once each.
    #[instrument(skip(self, request), fields(order_id = request.order_id))]
    pub async fn create_feedback(
        &self,
        request: CreateFeedbackRequest,
    ) -> Result<feedback::Model, ServiceError> {
        request.validate()?;

        let txn = db::begin(&self.db_pool, "create_feedback").await?;
        let order = order::Entity::find_by_id(request.order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", request.order_id))?;
        if order.status != OrderStatus::Completed {
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} is {}; only completed orders can receive feedback",
                order.id, order.status
            )));
        }

        let existing = feedback::Entity::find()
            .filter(feedback::Column::OrderId.eq(order.id))
            .count(&txn)
            .await?;
        if existing > 0 {
            return Err(ServiceError::Conflict(format!(
                "Order {} already has feedback",
                order.id
            )));
        }

        let created = feedback::ActiveModel {
            order_id: Set(order.id),
            customer_id: Set(order.customer_id),
            rating: Set(request.rating),
            comment: Set(request.comment.filter(|c| !c.trim().is_empty())),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        db::commit(txn, "create_feedback").await?;

        info!(feedback_id = created.id, rating = created.rating, "Feedback recorded");
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn summary_of_nothing_has_no_average() {
        let summary = FeedbackSummary::from_counts(&[]);
        assert_eq!(summary.count, 0);
        assert_eq!(summary.average_rating, None);
        assert_eq!(summary.distribution, vec![0; 5]);
    }

    #[test]
    fn summary_rounds_average_to_cents() {
        let summary = FeedbackSummary::from_counts(&[(4, 2), (5, 1)]);
        assert_eq!(summary.count, 3);
        assert_eq!(summary.average_rating, Some(dec!(4.33)));
        assert_eq!(summary.distribution, vec![0, 0, 0, 2, 1]);
    }
}
