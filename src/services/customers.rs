use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use crate::{
    db::DbPool,
    entities::{
        customer::{self, CustomerType},
        order,
    },
    errors::ServiceError,
};

const SEARCH_LIMIT: u64 = 50;

fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    let allowed = phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'));
    if allowed && (7..=15).contains(&digits) {
        Ok(())
    } else {
        let mut err = ValidationError::new("phone");
        err.message = Some("phone must contain 7 to 15 digits".into());
        Err(err)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateCustomerRequest {
    pub account_id: Option<i32>,
    #[validate(length(min = 1, max = 50))]
    pub first_name: String,
    #[validate(length(min = 1, max = 50))]
    pub last_name: String,
    #[validate(custom = "validate_phone")]
    pub phone: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub address: String,
    /// Defaults to `Regular`
    pub customer_type: Option<CustomerType>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateCustomerRequest {
    pub account_id: Option<i32>,
    #[validate(length(min = 1, max = 50))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub last_name: Option<String>,
    #[validate(custom = "validate_phone")]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub address: Option<String>,
    pub customer_type: Option<CustomerType>,
}

#[derive(Debug, Clone)]
pub struct CustomerPage {
    pub customers: Vec<customer::Model>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

/// Escapes LIKE wildcards so a search term matches literally.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped.to_lowercase())
}

#[derive(Clone)]
pub struct CustomerService {
    db_pool: Arc<DbPool>,
}

impl CustomerService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn list_customers(&self, page: u64, limit: u64) -> Result<CustomerPage, ServiceError> {
        let (page, limit) = super::page_window(page, limit);
        let paginator = customer::Entity::find()
            .order_by_asc(customer::Column::LastName)
            .order_by_asc(customer::Column::FirstName)
            .order_by_asc(customer::Column::Id)
            .paginate(&*self.db_pool, limit);
        let total = paginator.num_items().await?;
        let customers = paginator.fetch_page(page - 1).await?;
        Ok(CustomerPage {
            customers,
            total,
            page,
            limit,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_customer(&self, customer_id: i32) -> Result<customer::Model, ServiceError> {
        customer::Entity::find_by_id(customer_id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Customer", customer_id))
    }

    /// Case-insensitive substring match on first name, last name or phone.
    #[instrument(skip(self))]
    pub async fn search_customers(&self, term: &str) -> Result<Vec<customer::Model>, ServiceError> {
        let term = term.trim();
        if term.is_empty() {
            return Err(ServiceError::ValidationError(
                "search term must not be empty".into(),
            ));
        }
        let pattern = like_pattern(term);
        let lower_like = |col: customer::Column| {
            Expr::expr(Func::lower(Expr::col(col))).like(
                sea_orm::sea_query::LikeExpr::new(pattern.clone()).escape('\\'),
            )
        };

        let customers = customer::Entity::find()
            .filter(
                Condition::any()
                    .add(lower_like(customer::Column::FirstName))
                    .add(lower_like(customer::Column::LastName))
                    .add(lower_like(customer::Column::Phone)),
            )
            .order_by_asc(customer::Column::LastName)
            .order_by_asc(customer::Column::FirstName)
            .limit(SEARCH_LIMIT)
            .all(&*self.db_pool)
            .await?;
        Ok(customers)
    }

    #[instrument(skip(self, request), fields(last_name = %request.last_name))]
    pub async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<customer::Model, ServiceError> {
        request.validate()?;
        let now = Utc::now();
        let created = customer::ActiveModel {
            account_id: Set(request.account_id),
            first_name: Set(request.first_name.trim().to_string()),
            last_name: Set(request.last_name.trim().to_string()),
            phone: Set(request.phone.trim().to_string()),
            email: Set(request.email),
            address: Set(request.address.trim().to_string()),
            customer_type: Set(request.customer_type.unwrap_or(CustomerType::Regular)),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&*self.db_pool)
        .await?;

        info!(customer_id = created.id, "Customer created");
        Ok(created)
    }

    #[instrument(skip(self, request))]
    pub async fn update_customer(
        &self,
        customer_id: i32,
        request: UpdateCustomerRequest,
    ) -> Result<customer::Model, ServiceError> {
        request.validate()?;
        let existing = self.get_customer(customer_id).await?;

        let mut active: customer::ActiveModel = existing.into();
        if let Some(account_id) = request.account_id {
            active.account_id = Set(Some(account_id));
        }
        if let Some(first_name) = request.first_name {
            active.first_name = Set(first_name.trim().to_string());
        }
        if let Some(last_name) = request.last_name {
            active.last_name = Set(last_name.trim().to_string());
        }
        if let Some(phone) = request.phone {
            active.phone = Set(phone.trim().to_string());
        }
        if let Some(email) = request.email {
            active.email = Set(Some(email));
        }
        if let Some(address) = request.address {
            active.address = Set(address.trim().to_string());
        }
        if let Some(customer_type) = request.customer_type {
            active.customer_type = Set(customer_type);
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(&*self.db_pool).await?;
        info!(customer_id, "Customer updated");
        Ok(updated)
    }

    /// Refused while the customer still has orders on record.
    #[instrument(skip(self))]
    pub async fn delete_customer(&self, customer_id: i32) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        self.get_customer(customer_id).await?;

        let orders = order::Entity::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .count(db)
            .await?;
        if orders > 0 {
            return Err(ServiceError::Conflict(format!(
                "Customer {} has {} order(s) and cannot be deleted",
                customer_id, orders
            )));
        }

        customer::Entity::delete_by_id(customer_id).exec(db).await?;
        info!(customer_id, "Customer deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("0917 123 4567", true)]
    #[case("+63-917-123-4567", true)]
    #[case("(02) 8123 4567", true)]
    #[case("12345", false)]
    #[case("0917-CALL-ME", false)]
    fn phone_format(#[case] phone: &str, #[case] ok: bool) {
        assert_eq!(validate_phone(phone).is_ok(), ok);
    }

    #[test]
    fn like_pattern_escapes_wildcards_and_lowercases() {
        assert_eq!(like_pattern("Dela Cruz"), "%dela cruz%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
