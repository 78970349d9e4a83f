mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use common::TestApp;
use stockledger_api::entities::batch::{self, Entity as BatchEntity};
use stockledger_api::errors::ServiceError;
use stockledger_api::services::batches::AddBatchRequest;
use stockledger_api::services::stock::{StockMovementKind, StockMutationRequest};

fn subtract(quantity: i64) -> StockMutationRequest {
    StockMutationRequest {
        movement: StockMovementKind::Subtract,
        quantity,
        reason: "manual removal".to_string(),
        batch_id: None,
        create_new_batch: false,
        cost_price: None,
        selling_price: None,
        supplier: None,
    }
}

fn add(quantity: i64) -> StockMutationRequest {
    StockMutationRequest {
        movement: StockMovementKind::Add,
        quantity,
        reason: "restock".to_string(),
        batch_id: None,
        create_new_batch: true,
        cost_price: None,
        selling_price: None,
        supplier: None,
    }
}

async fn batches_for(app: &TestApp, item_id: Uuid) -> Vec<batch::Model> {
    BatchEntity::find()
        .filter(batch::Column::ItemId.eq(item_id))
        .all(app.state.db.as_ref())
        .await
        .unwrap()
}

async fn assert_conservation(app: &TestApp, seller: Uuid, item_id: Uuid) {
    let item = app.state.services.items.get_item(seller, item_id).await.unwrap();
    let remainders: i64 = batches_for(app, item_id)
        .await
        .iter()
        .filter(|b| b.status != "archived")
        .map(|b| b.quantity_remaining)
        .sum();
    assert_eq!(
        item.quantity_in_stock, remainders,
        "item stock must equal the sum of batch remainders"
    );
    for b in batches_for(app, item_id).await {
        assert_eq!(
            b.quantity_in,
            b.quantity_remaining + b.quantity_sold,
            "batch {} violates its conservation invariant",
            b.batch_code
        );
    }
}

#[tokio::test]
async fn new_item_with_opening_stock_creates_exactly_one_batch() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();

    let item = app.seed_item(seller, "tea-001", 50, dec!(10), dec!(20)).await;
    assert_eq!(item.quantity_in_stock, 50);
    assert_eq!(item.total_stocked_quantity, 50);

    let batches = batches_for(&app, item.id).await;
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].quantity_in, 50);
    assert_eq!(batches[0].quantity_remaining, 50);
    assert_eq!(batches[0].quantity_sold, 0);
    assert!(batches[0].batch_code.contains("TEA001"));

    assert_conservation(&app, seller, item.id).await;
}

#[tokio::test]
async fn add_without_batch_target_creates_a_new_lot() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let item = app.seed_item(seller, "tea-002", 10, dec!(10), dec!(20)).await;

    let response = app
        .state
        .services
        .stock
        .mutate_stock(seller, item.id, add(15))
        .await
        .unwrap();

    assert_eq!(response.inventory.quantity_in_stock, 25);
    assert_eq!(response.inventory.total_stocked_quantity, 25);
    assert_eq!(response.stock_change.previous_stock, 10);
    assert_eq!(response.stock_change.new_stock, 25);
    assert_eq!(batches_for(&app, item.id).await.len(), 2);
    assert_conservation(&app, seller, item.id).await;
}

#[tokio::test]
async fn fifo_subtract_depletes_oldest_batch_first() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let item = app.seed_item(seller, "tea-003", 0, dec!(10), dec!(20)).await;

    // B1 received a day before B2
    let b1 = app
        .state
        .services
        .batches
        .add_batch(
            seller,
            item.id,
            AddBatchRequest {
                quantity_in: 5,
                cost_price: dec!(100),
                selling_price: dec!(150),
                date_received: Some(Utc::now() - Duration::days(2)),
                supplier: None,
                batch_code: Some("B1".to_string()),
                expiry_date: None,
            },
        )
        .await
        .unwrap();
    let b2 = app
        .state
        .services
        .batches
        .add_batch(
            seller,
            item.id,
            AddBatchRequest {
                quantity_in: 5,
                cost_price: dec!(150),
                selling_price: dec!(200),
                date_received: Some(Utc::now() - Duration::days(1)),
                supplier: None,
                batch_code: Some("B2".to_string()),
                expiry_date: None,
            },
        )
        .await
        .unwrap();

    let response = app
        .state
        .services
        .stock
        .mutate_stock(seller, item.id, subtract(7))
        .await
        .unwrap();

    assert_eq!(response.affected_batches.len(), 2);
    assert_eq!(response.affected_batches[0].batch_id, b1.batch.id);
    assert_eq!(response.affected_batches[0].quantity, 5);
    assert_eq!(response.affected_batches[0].remaining_after, 0);
    assert_eq!(response.affected_batches[1].batch_id, b2.batch.id);
    assert_eq!(response.affected_batches[1].quantity, 2);
    assert_eq!(response.affected_batches[1].remaining_after, 3);

    let batches = batches_for(&app, item.id).await;
    let b1_after = batches.iter().find(|b| b.id == b1.batch.id).unwrap();
    let b2_after = batches.iter().find(|b| b.id == b2.batch.id).unwrap();
    assert_eq!(b1_after.quantity_remaining, 0);
    assert_eq!(b1_after.status, "depleted");
    assert_eq!(b2_after.quantity_remaining, 3);
    assert_eq!(b2_after.status, "active");

    assert_conservation(&app, seller, item.id).await;
}

#[tokio::test]
async fn over_ask_mutates_nothing() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let item = app.seed_item(seller, "tea-004", 10, dec!(10), dec!(20)).await;

    let err = app
        .state
        .services
        .stock
        .mutate_stock(seller, item.id, subtract(11))
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::InsufficientStock {
            requested: 11,
            available: 10,
            ..
        }
    );

    let after = app.state.services.items.get_item(seller, item.id).await.unwrap();
    assert_eq!(after.quantity_in_stock, 10);
    let batches = batches_for(&app, item.id).await;
    assert_eq!(batches[0].quantity_remaining, 10);
    assert_eq!(batches[0].quantity_sold, 0);
}

#[tokio::test]
async fn explicit_batch_subtract_checks_the_batch_not_the_item() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let item = app.seed_item(seller, "tea-005", 5, dec!(10), dec!(20)).await;
    let second = app
        .state
        .services
        .stock
        .mutate_stock(seller, item.id, add(20))
        .await
        .unwrap();
    let new_batch_id = second.affected_batches[0].batch_id;

    // Item holds 25, but the first batch only 5.
    let first_batch_id = batches_for(&app, item.id)
        .await
        .into_iter()
        .find(|b| b.id != new_batch_id)
        .unwrap()
        .id;

    let mut request = subtract(8);
    request.batch_id = Some(first_batch_id);
    let err = app
        .state
        .services
        .stock
        .mutate_stock(seller, item.id, request)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        ServiceError::InsufficientStock {
            requested: 8,
            available: 5,
            ..
        }
    );

    // Targeting the larger batch works and leaves the small one alone.
    let mut request = subtract(8);
    request.batch_id = Some(new_batch_id);
    let response = app
        .state
        .services
        .stock
        .mutate_stock(seller, item.id, request)
        .await
        .unwrap();
    assert_eq!(response.inventory.quantity_in_stock, 17);
    assert_conservation(&app, seller, item.id).await;
}

#[tokio::test]
async fn validation_rejects_bad_input_before_any_write() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let item = app.seed_item(seller, "tea-006", 5, dec!(10), dec!(20)).await;

    let mut zero_quantity = subtract(0);
    zero_quantity.reason = "x".to_string();
    let err = app
        .state
        .services
        .stock
        .mutate_stock(seller, item.id, zero_quantity)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Validation(_));

    let mut no_reason = subtract(1);
    no_reason.reason = String::new();
    let err = app
        .state
        .services
        .stock
        .mutate_stock(seller, item.id, no_reason)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Validation(_));

    assert_conservation(&app, seller, item.id).await;
}

#[tokio::test]
async fn foreign_tenant_reads_as_absent() {
    let app = TestApp::new().await;
    let owner = Uuid::new_v4();
    let intruder = Uuid::new_v4();
    let item = app.seed_item(owner, "tea-007", 5, dec!(10), dec!(20)).await;

    let err = app
        .state
        .services
        .stock
        .mutate_stock(intruder, item.id, subtract(1))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn degraded_mode_still_applies_mutations() {
    let app = TestApp::degraded().await;
    let seller = Uuid::new_v4();
    let item = app.seed_item(seller, "tea-008", 10, dec!(10), dec!(20)).await;

    let response = app
        .state
        .services
        .stock
        .mutate_stock(seller, item.id, subtract(4))
        .await
        .unwrap();
    assert_eq!(response.inventory.quantity_in_stock, 6);
    assert_conservation(&app, seller, item.id).await;
}

#[tokio::test]
async fn duplicate_explicit_batch_code_conflicts() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let item = app.seed_item(seller, "tea-010", 0, dec!(10), dec!(20)).await;

    let request = || AddBatchRequest {
        quantity_in: 5,
        cost_price: dec!(10),
        selling_price: dec!(20),
        date_received: None,
        supplier: None,
        batch_code: Some("LOT-A".to_string()),
        expiry_date: None,
    };

    app.state
        .services
        .batches
        .add_batch(seller, item.id, request())
        .await
        .unwrap();
    let err = app
        .state
        .services
        .batches
        .add_batch(seller, item.id, request())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));

    // The failed attempt left the item's counters untouched.
    let after = app.state.services.items.get_item(seller, item.id).await.unwrap();
    assert_eq!(after.quantity_in_stock, 5);
    assert_eq!(after.total_stocked_quantity, 5);
    assert_conservation(&app, seller, item.id).await;
}

#[tokio::test]
async fn generated_batch_codes_stay_unique_per_item() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let item = app.seed_item(seller, "tea-009", 5, dec!(10), dec!(20)).await;

    for _ in 0..4 {
        app.state
            .services
            .stock
            .mutate_stock(seller, item.id, add(1))
            .await
            .unwrap();
    }

    let batches = batches_for(&app, item.id).await;
    let mut codes: Vec<_> = batches.iter().map(|b| b.batch_code.clone()).collect();
    codes.sort();
    codes.dedup();
    assert_eq!(codes.len(), batches.len(), "batch codes must be unique");
}
