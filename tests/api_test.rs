mod common;

use std::str::FromStr;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("not a decimal: {other}"),
    }
}

async fn seeded() -> (TestApp, i32, i32) {
    let app = TestApp::new().await;
    let customer = app.seed_customer("Nina").await;
    let slim = app.seed_container("Slim 5 gal", dec!(25), dec!(150), 3).await;
    (app, customer.id, slim.container_type_id)
}

fn order_body(customer_id: i32, container_type_id: i32, category: i32, quantity: i32) -> Value {
    json!({
        "customer_id": customer_id,
        "order_type": "Walk-in",
        "mop": "Cash",
        "receiving_method": "Pickup",
        "details": [
            { "container_type_id": container_type_id, "order_category_id": category, "quantity": quantity }
        ]
    })
}

#[tokio::test]
async fn create_and_fetch_order_over_http() {
    let (app, customer_id, container_type_id) = seeded().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(order_body(customer_id, container_type_id, 2, 2)),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "Confirmed");
    assert_eq!(body["data"]["payment_status"], "Unpaid");
    assert_eq!(decimal(&body["data"]["total_amount"]), dec!(300));
    assert_eq!(body["data"]["details"].as_array().unwrap().len(), 1);
    let order_id = body["data"]["id"].as_i64().unwrap();

    let response = app
        .request(Method::GET, &format!("/api/v1/orders/{order_id}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["id"].as_i64(), Some(order_id));

    let response = app.request(Method::GET, "/api/v1/orders?status=Confirmed", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["id"].as_i64(), Some(order_id));

    let response = app.request(Method::GET, "/api/v1/container-stock", None).await;
    let body = response_json(response).await;
    assert_eq!(body["data"][0]["stock"], 1);
}

#[tokio::test]
async fn errors_share_one_json_shape() {
    let (app, _, _) = seeded().await;

    let response = app.request(Method::GET, "/api/v1/orders/999", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let header_id = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .expect("request id header");
    let body = response_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Not Found");
    assert_eq!(body["message"], "Not found: Order 999 not found");
    assert_eq!(body["request_id"].as_str(), Some(header_id.as_str()));
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn malformed_requests_are_bad_requests() {
    let (app, customer_id, container_type_id) = seeded().await;

    let response = app
        .request_raw(Method::POST, "/api/v1/orders", "{\"customer_id\": ")
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response_json(response).await["success"], false);

    let response = app.request(Method::GET, "/api/v1/orders/abc", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut body = order_body(customer_id, container_type_id, 1, 1);
    body["order_type"] = json!("Phone");
    let response = app.request(Method::POST, "/api/v1/orders", Some(body)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(order_body(customer_id, container_type_id, 3, 1)),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.request(Method::GET, "/api/v1/customers/search?q=", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn huge_page_numbers_are_capped() {
    let (app, _, _) = seeded().await;

    for uri in [
        "/api/v1/orders?page=18446744073709551615&limit=100",
        "/api/v1/customers?page=18446744073709551615&limit=100",
        "/api/v1/feedback?page=18446744073709551615",
    ] {
        let response = app.request(Method::GET, uri, None).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        let body = response_json(response).await;
        assert!(body["data"]["items"].as_array().unwrap().is_empty(), "{uri}");
        let page = body["data"]["page"].as_u64().unwrap();
        assert!(page <= i64::MAX as u64, "{uri}");
    }

    let response = app
        .request(Method::GET, "/api/v1/orders?page=18446744073709551615&limit=100", None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["page"].as_u64(), Some(i64::MAX as u64 / 100));
}

#[tokio::test]
async fn business_rule_failures_map_to_conflict_or_unprocessable() {
    let (app, customer_id, container_type_id) = seeded().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(order_body(customer_id, container_type_id, 2, 5)),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = response_json(response).await;
    assert_eq!(
        body["message"],
        "Insufficient stock: Slim 5 gal has 3 in stock, 5 requested"
    );

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(order_body(customer_id, container_type_id, 1, 1)),
        )
        .await;
    let order_id = response_json(response).await["data"]["id"].as_i64().unwrap();

    // Feedback needs a completed order
    let response = app
        .request(
            Method::POST,
            "/api/v1/feedback",
            Some(json!({ "order_id": order_id, "rating": 5 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Customers with orders stay
    let response = app
        .request(Method::DELETE, &format!("/api/v1/customers/{customer_id}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .request(
            Method::POST,
            "/api/v1/container-types",
            Some(json!({ "name": "Slim 5 gal", "refill_price": "20", "new_container_price": "100" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn order_can_be_completed_rated_and_deleted() {
    let (app, customer_id, container_type_id) = seeded().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(order_body(customer_id, container_type_id, 2, 1)),
        )
        .await;
    let order_id = response_json(response).await["data"]["id"].as_i64().unwrap();

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/details"),
            Some(json!({ "container_type_id": container_type_id, "order_category_id": 1, "quantity": 2 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(decimal(&body["data"]["total_amount"]), dec!(200));

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/orders/{order_id}"),
            Some(json!({ "status": "Completed", "payment_status": "Paid" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["data"]["status"], "Completed");

    let response = app
        .request(
            Method::POST,
            "/api/v1/feedback",
            Some(json!({ "order_id": order_id, "rating": 4, "comment": "Fast delivery" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["data"]["customer_id"].as_i64(), Some(customer_id as i64));

    let response = app.request(Method::GET, "/api/v1/feedback/summary", None).await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["distribution"], json!([0, 0, 0, 1, 0]));

    let response = app
        .request(Method::DELETE, &format!("/api/v1/orders/{order_id}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["id"].as_i64(), Some(order_id));
    assert_eq!(app.stock(container_type_id).await, 3);

    let response = app.request(Method::GET, "/api/v1/feedback", None).await;
    assert_eq!(response_json(response).await["data"]["total"], 0);
}

#[tokio::test]
async fn stock_and_settings_endpoints() {
    let (app, _, container_type_id) = seeded().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/container-stock",
            Some(json!({ "container_type_id": container_type_id, "quantity": 7 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["stock"], 10);
    assert!(body["message"].is_string());

    let response = app
        .request(
            Method::PUT,
            "/api/v1/system-config/capacity",
            Some(json!({ "max_orders_per_day": 40 })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.request(Method::GET, "/api/v1/system-config", None).await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["max_orders_per_day"], "40");
    assert_eq!(body["data"]["opening_time"], "08:00:00");

    let response = app
        .request(
            Method::PUT,
            "/api/v1/system-config/operating-hours",
            Some(json!({ "opening_time": "18:00:00", "closing_time": "07:00:00" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn service_endpoints_respond() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response_json(response).await["data"]["status"], "healthy");

    let response = app.request(Method::GET, "/api/v1/status", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.request(Method::GET, "/api-docs/openapi.json", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let doc = response_json(response).await;
    assert!(doc["paths"]["/api/v1/orders"].is_object());
    assert!(doc["paths"]["/api/v1/container-stock"].is_object());
}
