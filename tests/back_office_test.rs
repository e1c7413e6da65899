mod common;

use std::collections::BTreeMap;

use assert_matches::assert_matches;
use chrono::NaiveTime;
use common::{line, walk_in, TestApp};
use refill_station_api::{
    entities::{customer::CustomerType, order::OrderStatus},
    errors::ServiceError,
    services::{
        customers::{CreateCustomerRequest, UpdateCustomerRequest},
        feedback::CreateFeedbackRequest,
        orders::UpdateOrderRequest,
        system_config::{ContactConfig, MaintenanceConfig, OperatingHours},
    },
};
use rust_decimal_macros::dec;

async fn completed_order(app: &TestApp, customer_id: i32, container_type_id: i32) -> i32 {
    let orders = &app.state.services.orders;
    let created = orders
        .create_order(walk_in(customer_id, vec![line(container_type_id, 1, 1)]))
        .await
        .unwrap();
    orders
        .update_order(
            created.order.id,
            UpdateOrderRequest {
                status: Some(OrderStatus::Completed),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    created.order.id
}

#[tokio::test]
async fn customers_can_be_searched_updated_and_removed() {
    let app = TestApp::new().await;
    let customers = &app.state.services.customers;

    let rosa = customers
        .create_customer(CreateCustomerRequest {
            account_id: Some(12),
            first_name: " Rosa ".into(),
            last_name: "Dela Cruz".into(),
            phone: "+63 917 555 0199".into(),
            email: Some("rosa@example.com".into()),
            address: "Purok 3, Poblacion".into(),
            customer_type: Some(CustomerType::Dealer),
        })
        .await
        .unwrap();
    assert_eq!(rosa.first_name, "Rosa");
    assert_eq!(rosa.customer_type, CustomerType::Dealer);
    app.seed_customer("Tomas").await;

    let found = customers.search_customers("ROSA").await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, rosa.id);

    let by_phone = customers.search_customers("0199").await.unwrap();
    assert_eq!(by_phone.len(), 1);

    // Wildcards are matched literally
    assert!(customers.search_customers("%").await.unwrap().is_empty());
    assert_matches!(
        customers.search_customers("  ").await.unwrap_err(),
        ServiceError::ValidationError(_)
    );

    let updated = customers
        .update_customer(
            rosa.id,
            UpdateCustomerRequest {
                address: Some("Purok 5, Poblacion".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.address, "Purok 5, Poblacion");
    assert_eq!(updated.last_name, "Dela Cruz");

    let page = customers.list_customers(1, 1).await.unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.customers.len(), 1);

    customers.delete_customer(rosa.id).await.unwrap();
    assert_matches!(
        customers.get_customer(rosa.id).await.unwrap_err(),
        ServiceError::NotFound(_)
    );
}

#[tokio::test]
async fn invalid_customers_are_rejected() {
    let app = TestApp::new().await;
    let err = app
        .state
        .services
        .customers
        .create_customer(CreateCustomerRequest {
            account_id: None,
            first_name: "Uno".into(),
            last_name: "Reyes".into(),
            phone: "12".into(),
            email: Some("not-an-email".into()),
            address: "Somewhere".into(),
            customer_type: None,
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn customers_with_orders_cannot_be_deleted() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Vic").await;
    let slim = app.seed_container("Slim 5 gal", dec!(25), dec!(150), 5).await;
    app.state
        .services
        .orders
        .create_order(walk_in(customer.id, vec![line(slim.container_type_id, 1, 1)]))
        .await
        .unwrap();

    let err = app
        .state
        .services
        .customers
        .delete_customer(customer.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));
}

#[tokio::test]
async fn feedback_is_once_per_completed_order() {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Wen").await;
    let slim = app.seed_container("Slim 5 gal", dec!(25), dec!(150), 5).await;
    let feedback = &app.state.services.feedback;

    let first = completed_order(&app, customer.id, slim.container_type_id).await;
    let second = completed_order(&app, customer.id, slim.container_type_id).await;

    let created = feedback
        .create_feedback(CreateFeedbackRequest {
            order_id: first,
            rating: 5,
            comment: Some("  ".into()),
        })
        .await
        .unwrap();
    assert_eq!(created.customer_id, customer.id);
    assert_eq!(created.comment, None);

    let err = feedback
        .create_feedback(CreateFeedbackRequest {
            order_id: first,
            rating: 3,
            comment: None,
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));

    let err = feedback
        .create_feedback(CreateFeedbackRequest {
            order_id: second,
            rating: 6,
            comment: None,
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let err = feedback
        .create_feedback(CreateFeedbackRequest {
            order_id: 777,
            rating: 4,
            comment: None,
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));

    feedback
        .create_feedback(CreateFeedbackRequest {
            order_id: second,
            rating: 2,
            comment: Some("Late".into()),
        })
        .await
        .unwrap();

    let summary = feedback.feedback_summary().await.unwrap();
    assert_eq!(summary.count, 2);
    assert_eq!(summary.average_rating, Some(dec!(3.5)));
    assert_eq!(summary.distribution, vec![0, 1, 0, 0, 1]);

    let page = feedback.list_feedback(1, 20).await.unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.feedback[0].order_id, second, "newest first");
}

#[tokio::test]
async fn settings_have_defaults_and_validate_updates() {
    let app = TestApp::new().await;
    let settings = &app.state.services.system_config;

    let all = settings.get_config().await.unwrap();
    assert_eq!(all.get("max_orders_per_day").map(String::as_str), Some("0"));
    assert_eq!(all.get("maintenance_mode").map(String::as_str), Some("false"));

    let hours = settings.operating_hours().await.unwrap();
    assert_eq!(hours.opening_time, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
    assert_eq!(hours.closing_time, NaiveTime::from_hms_opt(17, 0, 0).unwrap());

    // Moving opening past the stored closing time is rejected as a whole
    let err = settings
        .update_config(BTreeMap::from([(
            "opening_time".to_string(),
            "18:00:00".to_string(),
        )]))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let err = settings
        .update_config(BTreeMap::from([(
            "max_orders_per_day".to_string(),
            "lots".to_string(),
        )]))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let merged = settings
        .update_config(BTreeMap::from([
            ("delivery_fee".to_string(), "15".to_string()),
            ("closing_time".to_string(), "19:30:00".to_string()),
        ]))
        .await
        .unwrap();
    assert_eq!(merged.get("delivery_fee").map(String::as_str), Some("15"));
    assert_eq!(merged.get("opening_time").map(String::as_str), Some("08:00:00"));

    let hours = settings
        .update_operating_hours(OperatingHours {
            opening_time: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            closing_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
        })
        .await
        .unwrap();
    assert_eq!(
        settings.operating_hours().await.unwrap().closing_time,
        hours.closing_time
    );

    settings
        .update_maintenance(MaintenanceConfig {
            maintenance_mode: true,
            maintenance_message: "Pump repair until noon".into(),
        })
        .await
        .unwrap();
    let maintenance = settings.maintenance().await.unwrap();
    assert!(maintenance.maintenance_mode);
    assert_eq!(maintenance.maintenance_message, "Pump repair until noon");

    let err = settings
        .update_contact(ContactConfig {
            business_name: String::new(),
            contact_number: String::new(),
            email: None,
            address: String::new(),
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    settings
        .update_contact(ContactConfig {
            business_name: "Agua Pura Refilling".into(),
            contact_number: "0917 555 0000".into(),
            email: Some("hello@aguapura.example".into()),
            address: "Rizal Ave.".into(),
        })
        .await
        .unwrap();
    let contact = settings.contact().await.unwrap();
    assert_eq!(contact.business_name, "Agua Pura Refilling");
    assert_eq!(contact.email.as_deref(), Some("hello@aguapura.example"));
}
