mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use common::TestApp;
use stockledger_api::entities::item_sale::BatchFunding;
use stockledger_api::entities::sale::{self, Entity as SaleEntity};
use stockledger_api::errors::ServiceError;
use stockledger_api::services::batches::AddBatchRequest;
use stockledger_api::services::reconciliation::{
    CreateOrderLine, CreateOrderRequest, UpdateOrderStatusRequest,
};

fn status(value: &str) -> UpdateOrderStatusRequest {
    UpdateOrderStatusRequest {
        status: value.to_string(),
    }
}

async fn drive_to_delivered(
    app: &TestApp,
    order_id: Uuid,
) -> stockledger_api::services::reconciliation::OrderStatusResponse {
    for s in ["confirmed", "processing", "shipped"] {
        app.state
            .services
            .orders
            .update_order_status(order_id, status(s))
            .await
            .unwrap();
    }
    app.state
        .services
        .orders
        .update_order_status(order_id, status("delivered"))
        .await
        .unwrap()
}

#[tokio::test]
async fn delivered_order_yields_weighted_average_cost() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let item = app.seed_item(seller, "cof-001", 0, dec!(110), dec!(300)).await;

    // Older batch of 3 at cost 100, newer batch of 10 at cost 150.
    app.state
        .services
        .batches
        .add_batch(
            seller,
            item.id,
            AddBatchRequest {
                quantity_in: 3,
                cost_price: dec!(100),
                selling_price: dec!(300),
                date_received: Some(Utc::now() - Duration::days(3)),
                supplier: None,
                batch_code: Some("OLD".to_string()),
                expiry_date: None,
            },
        )
        .await
        .unwrap();
    app.state
        .services
        .batches
        .add_batch(
            seller,
            item.id,
            AddBatchRequest {
                quantity_in: 10,
                cost_price: dec!(150),
                selling_price: dec!(300),
                date_received: Some(Utc::now() - Duration::days(1)),
                supplier: None,
                batch_code: Some("NEW".to_string()),
                expiry_date: None,
            },
        )
        .await
        .unwrap();

    let order = app
        .state
        .services
        .orders
        .create_order(CreateOrderRequest {
            buyer_id: Uuid::new_v4(),
            order_number: None,
            lines: vec![CreateOrderLine {
                seller_id: seller,
                item_id: item.id,
                quantity: 5,
                unit_price: Some(dec!(300)),
            }],
            tax: Decimal::ZERO,
            discount: Decimal::ZERO,
            shipping_fee: Decimal::ZERO,
        })
        .await
        .unwrap();

    let response = drive_to_delivered(&app, order.order.id).await;
    let report = response.reconciliation.expect("reconciliation ran");
    assert!(report.failures.is_empty());
    assert_eq!(report.sales.len(), 1);

    let line = &report.sales[0].item_sales[0];
    assert_eq!(line.quantity_sold, 5);
    // (3*100 + 2*150) / 5 = 120
    assert_eq!(line.unit_cost_price, dec!(120));
    assert_eq!(line.total_cost_amount, dec!(600));
    assert!(!line.cost_estimated);

    let funding: Vec<BatchFunding> =
        serde_json::from_value(line.batches_sold_from.clone()).unwrap();
    assert_eq!(funding.len(), 2);
    assert_eq!(funding[0].batch_code, "OLD");
    assert_eq!(funding[0].quantity_from_batch, 3);
    assert_eq!(funding[1].batch_code, "NEW");
    assert_eq!(funding[1].quantity_from_batch, 2);
    let funded: i64 = funding.iter().map(|f| f.quantity_from_batch).sum();
    assert_eq!(funded, line.quantity_sold);

    // Sales are treated as pre-paid.
    let sale = &report.sales[0].sale;
    assert_eq!(sale.amount_received, sale.total);
    assert_eq!(sale.balance, Decimal::ZERO);
    assert!(sale.is_from_order);

    let after = app.state.services.items.get_item(seller, item.id).await.unwrap();
    assert_eq!(after.quantity_in_stock, 8);
}

#[tokio::test]
async fn reconciliation_fires_only_on_the_delivered_edge() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let item = app.seed_item(seller, "cof-002", 20, dec!(10), dec!(30)).await;

    let order = app
        .state
        .services
        .orders
        .create_order(CreateOrderRequest {
            buyer_id: Uuid::new_v4(),
            order_number: None,
            lines: vec![CreateOrderLine {
                seller_id: seller,
                item_id: item.id,
                quantity: 5,
                unit_price: None,
            }],
            tax: Decimal::ZERO,
            discount: Decimal::ZERO,
            shipping_fee: Decimal::ZERO,
        })
        .await
        .unwrap();

    // No sale exists before delivery.
    for s in ["confirmed", "processing", "shipped"] {
        let response = app
            .state
            .services
            .orders
            .update_order_status(order.order.id, status(s))
            .await
            .unwrap();
        assert!(response.reconciliation.is_none());
    }

    let delivered = app
        .state
        .services
        .orders
        .update_order_status(order.order.id, status("delivered"))
        .await
        .unwrap();
    assert_eq!(delivered.reconciliation.unwrap().sales.len(), 1);

    // A re-entrant delivered update is an invalid transition, not a replay.
    let err = app
        .state
        .services
        .orders
        .update_order_status(order.order.id, status("delivered"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStatus(_));

    // An explicit retry skips the already-credited seller group.
    let report = app
        .state
        .services
        .orders
        .reconcile_delivered_order(order.order.id)
        .await
        .unwrap();
    assert!(report.sales.is_empty());
    assert!(report.failures.is_empty());

    let sales = SaleEntity::find()
        .filter(sale::Column::OrderId.eq(order.order.id))
        .all(app.state.db.as_ref())
        .await
        .unwrap();
    assert_eq!(sales.len(), 1, "retries must not re-credit the seller");

    // Stock was depleted exactly once.
    let after = app.state.services.items.get_item(seller, item.id).await.unwrap();
    assert_eq!(after.quantity_in_stock, 15);
}

#[tokio::test]
async fn exhausted_batches_degrade_cost_instead_of_blocking_delivery() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    // Current cost price 50; only 2 units actually batched at cost 40.
    let item = app.seed_item(seller, "cof-003", 0, dec!(50), dec!(90)).await;
    app.state
        .services
        .batches
        .add_batch(
            seller,
            item.id,
            AddBatchRequest {
                quantity_in: 2,
                cost_price: dec!(40),
                selling_price: dec!(90),
                date_received: None,
                supplier: None,
                batch_code: None,
                expiry_date: None,
            },
        )
        .await
        .unwrap();

    let order = app
        .state
        .services
        .orders
        .create_order(CreateOrderRequest {
            buyer_id: Uuid::new_v4(),
            order_number: None,
            lines: vec![CreateOrderLine {
                seller_id: seller,
                item_id: item.id,
                quantity: 5,
                unit_price: Some(dec!(90)),
            }],
            tax: Decimal::ZERO,
            discount: Decimal::ZERO,
            shipping_fee: Decimal::ZERO,
        })
        .await
        .unwrap();

    let response = drive_to_delivered(&app, order.order.id).await;
    let report = response.reconciliation.unwrap();
    assert!(report.failures.is_empty(), "shortfall must not fail the order");

    let line = &report.sales[0].item_sales[0];
    assert!(line.cost_estimated);
    assert_eq!(line.quantity_sold, 5);
    // 2*40 from the batch + 3*50 estimated = 230 → 46/unit
    assert_eq!(line.total_cost_amount, dec!(230));
    assert_eq!(line.unit_cost_price, dec!(46));

    let funding: Vec<BatchFunding> =
        serde_json::from_value(line.batches_sold_from.clone()).unwrap();
    assert_eq!(funding.len(), 2);
    let synthetic = funding.iter().find(|f| f.batch_id.is_none()).unwrap();
    assert_eq!(synthetic.batch_code, BatchFunding::ESTIMATED_CODE);
    assert_eq!(synthetic.quantity_from_batch, 3);
    assert_eq!(synthetic.cost_price_from_batch, dec!(50));

    // Physical stock only drops by what the batches actually held.
    let after = app.state.services.items.get_item(seller, item.id).await.unwrap();
    assert_eq!(after.quantity_in_stock, 0);
}

#[tokio::test]
async fn multi_seller_order_splits_charges_proportionally() {
    let app = TestApp::new().await;
    let seller_a = Uuid::new_v4();
    let seller_b = Uuid::new_v4();
    let item_a = app.seed_item(seller_a, "split-a", 10, dec!(5), dec!(30)).await;
    let item_b = app.seed_item(seller_b, "split-b", 10, dec!(5), dec!(10)).await;

    // Subtotals: A = 2*30 = 60, B = 4*10 = 40.
    let order = app
        .state
        .services
        .orders
        .create_order(CreateOrderRequest {
            buyer_id: Uuid::new_v4(),
            order_number: None,
            lines: vec![
                CreateOrderLine {
                    seller_id: seller_a,
                    item_id: item_a.id,
                    quantity: 2,
                    unit_price: Some(dec!(30)),
                },
                CreateOrderLine {
                    seller_id: seller_b,
                    item_id: item_b.id,
                    quantity: 4,
                    unit_price: Some(dec!(10)),
                },
            ],
            tax: dec!(10.00),
            discount: dec!(5.00),
            shipping_fee: dec!(7.00),
        })
        .await
        .unwrap();
    assert_eq!(order.order.subtotal, dec!(100));
    assert_eq!(order.order.total, dec!(112.00));

    let response = drive_to_delivered(&app, order.order.id).await;
    let report = response.reconciliation.unwrap();
    assert_eq!(report.sales.len(), 2);
    assert!(report.failures.is_empty());

    let tax_sum: Decimal = report.sales.iter().map(|s| s.sale.tax).sum();
    let discount_sum: Decimal = report.sales.iter().map(|s| s.sale.discount).sum();
    let shipping_sum: Decimal = report.sales.iter().map(|s| s.sale.shipping_fee).sum();
    let total_sum: Decimal = report.sales.iter().map(|s| s.sale.total).sum();
    assert_eq!(tax_sum, dec!(10.00));
    assert_eq!(discount_sum, dec!(5.00));
    assert_eq!(shipping_sum, dec!(7.00));
    assert_eq!(total_sum, order.order.total);

    // Each seller only ever sees their own sale.
    let a_sales = app.state.services.sales.list_sales(seller_a, 1, 20).await.unwrap();
    let b_sales = app.state.services.sales.list_sales(seller_b, 1, 20).await.unwrap();
    assert_eq!(a_sales.1, 1);
    assert_eq!(b_sales.1, 1);
    assert_eq!(a_sales.0[0].subtotal, dec!(60));
    assert_eq!(b_sales.0[0].subtotal, dec!(40));
}

#[tokio::test]
async fn invalid_transitions_are_rejected() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let item = app.seed_item(seller, "cof-004", 5, dec!(10), dec!(20)).await;

    let order = app
        .state
        .services
        .orders
        .create_order(CreateOrderRequest {
            buyer_id: Uuid::new_v4(),
            order_number: None,
            lines: vec![CreateOrderLine {
                seller_id: seller,
                item_id: item.id,
                quantity: 1,
                unit_price: None,
            }],
            tax: Decimal::ZERO,
            discount: Decimal::ZERO,
            shipping_fee: Decimal::ZERO,
        })
        .await
        .unwrap();

    // pending → delivered skips the machine.
    let err = app
        .state
        .services
        .orders
        .update_order_status(order.order.id, status("delivered"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStatus(_));

    let err = app
        .state
        .services
        .orders
        .update_order_status(order.order.id, status("not-a-status"))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStatus(_));

    // Cancellation is open from any non-terminal state.
    app.state
        .services
        .orders
        .update_order_status(order.order.id, status("cancelled"))
        .await
        .unwrap();

    // Reconcile of a non-delivered order is refused.
    let err = app
        .state
        .services
        .orders
        .reconcile_delivered_order(order.order.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStatus(_));
}
