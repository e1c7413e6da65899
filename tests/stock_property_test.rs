//! Property tests: whatever sequence of order and line edits the back office
//! performs, stock on hand plus containers held by live orders stays equal to
//! what was ever put on the shelf, and every order total matches its lines.

mod common;

use common::{line, walk_in, TestApp};
use proptest::prelude::*;
use refill_station_api::{
    entities::{order, order::OrderStatus, order_detail},
    errors::ServiceError,
    services::{
        inventory::AddStockRequest,
        orders::{UpdateOrderDetailRequest, UpdateOrderRequest},
        pricing,
    },
};
use rust_decimal_macros::dec;
use sea_orm::{EntityTrait, QueryOrder};

const INITIAL_STOCK: i32 = 12;

#[derive(Debug, Clone)]
enum Op {
    Create { category: i32, quantity: i32 },
    Add { order: usize, category: i32, quantity: i32 },
    Update { detail: usize, category: i32, quantity: i32 },
    Delete { detail: usize },
    Cancel { order: usize },
    Reopen { order: usize },
    DeleteOrder { order: usize },
    Restock { quantity: i32 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let category = 1i32..=2;
    let quantity = 1i32..=6;
    prop_oneof![
        3 => (category.clone(), quantity.clone())
            .prop_map(|(category, quantity)| Op::Create { category, quantity }),
        3 => (any::<usize>(), category.clone(), quantity.clone())
            .prop_map(|(order, category, quantity)| Op::Add { order, category, quantity }),
        3 => (any::<usize>(), category, quantity)
            .prop_map(|(detail, category, quantity)| Op::Update { detail, category, quantity }),
        2 => any::<usize>().prop_map(|detail| Op::Delete { detail }),
        2 => any::<usize>().prop_map(|order| Op::Cancel { order }),
        2 => any::<usize>().prop_map(|order| Op::Reopen { order }),
        1 => any::<usize>().prop_map(|order| Op::DeleteOrder { order }),
        1 => (1i32..=4).prop_map(|quantity| Op::Restock { quantity }),
    ]
}

fn pick<T: Copy>(items: &[T], index: usize) -> Option<T> {
    if items.is_empty() {
        None
    } else {
        Some(items[index % items.len()])
    }
}

fn tolerated(result: Result<(), ServiceError>) {
    match result {
        Ok(())
        | Err(ServiceError::InsufficientStock(_))
        | Err(ServiceError::InvalidOperation(_)) => {}
        Err(other) => panic!("unexpected error: {other}"),
    }
}

async fn order_ids(app: &TestApp) -> Vec<i32> {
    order::Entity::find()
        .order_by_asc(order::Column::Id)
        .all(app.db())
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.id)
        .collect()
}

async fn detail_ids(app: &TestApp) -> Vec<i32> {
    order_detail::Entity::find()
        .order_by_asc(order_detail::Column::Id)
        .all(app.db())
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.id)
        .collect()
}

async fn apply(app: &TestApp, customer_id: i32, container_type_id: i32, op: &Op) -> i32 {
    let orders = &app.state.services.orders;
    let mut restocked = 0;
    match *op {
        Op::Create { category, quantity } => tolerated(
            orders
                .create_order(walk_in(customer_id, vec![line(container_type_id, category, quantity)]))
                .await
                .map(|_| ()),
        ),
        Op::Add { order, category, quantity } => {
            if let Some(id) = pick(&order_ids(app).await, order) {
                tolerated(
                    orders
                        .add_order_detail(id, line(container_type_id, category, quantity))
                        .await
                        .map(|_| ()),
                );
            }
        }
        Op::Update { detail, category, quantity } => {
            if let Some(id) = pick(&detail_ids(app).await, detail) {
                tolerated(
                    orders
                        .update_order_detail(
                            id,
                            UpdateOrderDetailRequest {
                                container_type_id: None,
                                order_category_id: Some(category),
                                quantity: Some(quantity),
                            },
                        )
                        .await
                        .map(|_| ()),
                );
            }
        }
        Op::Delete { detail } => {
            if let Some(id) = pick(&detail_ids(app).await, detail) {
                tolerated(orders.delete_order_detail(id).await.map(|_| ()));
            }
        }
        Op::Cancel { order } | Op::Reopen { order } => {
            let status = if matches!(op, Op::Cancel { .. }) {
                OrderStatus::Cancelled
            } else {
                OrderStatus::InProgress
            };
            if let Some(id) = pick(&order_ids(app).await, order) {
                tolerated(
                    orders
                        .update_order(
                            id,
                            UpdateOrderRequest {
                                status: Some(status),
                                ..Default::default()
                            },
                        )
                        .await
                        .map(|_| ()),
                );
            }
        }
        Op::DeleteOrder { order } => {
            if let Some(id) = pick(&order_ids(app).await, order) {
                tolerated(orders.delete_order(id).await);
            }
        }
        Op::Restock { quantity } => {
            app.state
                .services
                .inventory
                .add_container_stock(AddStockRequest {
                    container_type_id,
                    quantity,
                })
                .await
                .unwrap();
            restocked = quantity;
        }
    }
    restocked
}

async fn check_invariants(app: &TestApp, container_type_id: i32, shelved: i32) {
    let on_hand = app.stock(container_type_id).await;
    let held = app.committed_new_containers(container_type_id).await;
    assert!(on_hand >= 0, "stock went negative: {on_hand}");
    assert_eq!(
        on_hand + held,
        shelved,
        "stock {on_hand} + held {held} should equal {shelved}"
    );

    for id in order_ids(app).await {
        let order = app.state.services.orders.get_order(id).await.unwrap();
        assert_eq!(
            order.order.total_amount,
            pricing::order_total(&order.details),
            "order {id} total drifted from its lines"
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn stock_and_totals_survive_any_edit_sequence(ops in prop::collection::vec(op_strategy(), 1..25)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let app = TestApp::new().await;
            let customer = app.seed_customer("Prop").await;
            let slim = app
                .seed_container("Slim 5 gal", dec!(25), dec!(150), INITIAL_STOCK)
                .await;

            let mut shelved = INITIAL_STOCK;
            for op in &ops {
                shelved += apply(&app, customer.id, slim.container_type_id, op).await;
                check_invariants(&app, slim.container_type_id, shelved).await;
            }
        });
    }
}
