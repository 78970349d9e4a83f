mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use common::TestApp;
use stockledger_api::entities::batch::{self, Entity as BatchEntity};
use stockledger_api::entities::catalogue_item::{self, Entity as ItemEntity};
use stockledger_api::entities::item_sale;
use stockledger_api::errors::ServiceError;
use stockledger_api::entities::sale;
use stockledger_api::services::retention::DeleteItemRequest;
use stockledger_api::services::stock::{StockMovementKind, StockMutationRequest};

fn forced(reason: &str) -> DeleteItemRequest {
    DeleteItemRequest {
        force: true,
        reason: Some(reason.to_string()),
    }
}

/// Rewinds an archived item's deletion timestamp by `days`.
async fn backdate_deletion(app: &TestApp, item_id: Uuid, days: i64) {
    let item = ItemEntity::find_by_id(item_id)
        .one(app.state.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    let mut active: catalogue_item::ActiveModel = item.into();
    active.deleted_at = Set(Some(Utc::now() - Duration::days(days)));
    active.update(app.state.db.as_ref()).await.unwrap();
}

/// Attaches a minimal historical sale record to the item.
async fn attach_sale_reference(app: &TestApp, seller_id: Uuid, item_id: Uuid) {
    let now = Utc::now();
    let sale_id = Uuid::new_v4();
    sale::ActiveModel {
        id: Set(sale_id),
        seller_id: Set(seller_id),
        order_id: Set(None),
        sale_number: Set(format!("SALE-{}", &sale_id.simple().to_string()[..8])),
        subtotal: Set(dec!(20)),
        tax: Set(dec!(0)),
        discount: Set(dec!(0)),
        shipping_fee: Set(dec!(0)),
        total: Set(dec!(20)),
        amount_received: Set(dec!(20)),
        balance: Set(dec!(0)),
        is_from_order: Set(false),
        refunded_amount: Set(dec!(0)),
        created_at: Set(now),
    }
    .insert(app.state.db.as_ref())
    .await
    .unwrap();

    item_sale::ActiveModel {
        id: Set(Uuid::new_v4()),
        sale_id: Set(sale_id),
        seller_id: Set(seller_id),
        item_id: Set(item_id),
        quantity_sold: Set(1),
        unit_selling_price: Set(dec!(20)),
        subtotal: Set(dec!(20)),
        unit_cost_price: Set(dec!(10)),
        total_cost_amount: Set(dec!(10)),
        batches_sold_from: Set(serde_json::json!([])),
        cost_estimated: Set(false),
        refunded_quantity: Set(0),
        created_at: Set(now),
    }
    .insert(app.state.db.as_ref())
    .await
    .unwrap();
}

#[tokio::test]
async fn unforced_delete_archives_with_a_thirty_day_window() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let item = app.seed_item(seller, "ret-001", 10, dec!(10), dec!(20)).await;

    let before = Utc::now();
    let outcome = app
        .state
        .services
        .retention
        .delete_item(seller, item.id, DeleteItemRequest::default())
        .await
        .unwrap();

    assert_eq!(outcome.kind, "soft_delete");
    let permanent = outcome.permanent_deletion_date.unwrap();
    assert!(permanent >= before + Duration::days(30));
    assert!(permanent <= Utc::now() + Duration::days(30));

    // Batches are archived, the catalogue listing no longer shows the item.
    let batches = BatchEntity::find()
        .filter(batch::Column::ItemId.eq(item.id))
        .all(app.state.db.as_ref())
        .await
        .unwrap();
    assert!(batches.iter().all(|b| b.status == "archived"));

    let (items, total) = app.state.services.items.list_items(seller, 1, 20).await.unwrap();
    assert_eq!(total, 0);
    assert!(items.is_empty());

    let err = app.state.services.items.get_item(seller, item.id).await.unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn forced_delete_with_stock_history_still_archives() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let item = app.seed_item(seller, "ret-002", 10, dec!(10), dec!(20)).await;

    // Stock on hand is a dependency; force cannot override it.
    let outcome = app
        .state
        .services
        .retention
        .delete_item(seller, item.id, forced("discontinued"))
        .await
        .unwrap();
    assert_eq!(outcome.kind, "soft_delete");
}

#[tokio::test]
async fn forced_delete_of_untouched_item_is_permanent() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let item = app.seed_item(seller, "ret-003", 0, dec!(10), dec!(20)).await;

    let outcome = app
        .state
        .services
        .retention
        .delete_item(seller, item.id, forced("mistake"))
        .await
        .unwrap();
    assert_eq!(outcome.kind, "hard_delete");
    assert!(outcome.permanent_deletion_date.is_none());

    let row = ItemEntity::find_by_id(item.id)
        .one(app.state.db.as_ref())
        .await
        .unwrap();
    assert!(row.is_none());
}

#[tokio::test]
async fn restore_succeeds_at_day_29_and_fails_at_day_31() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();

    let item = app.seed_item(seller, "ret-004", 8, dec!(10), dec!(20)).await;
    app.state
        .services
        .retention
        .delete_item(seller, item.id, DeleteItemRequest::default())
        .await
        .unwrap();
    backdate_deletion(&app, item.id, 29).await;

    app.state
        .services
        .retention
        .restore_item(seller, item.id)
        .await
        .unwrap();
    let restored = app.state.services.items.get_item(seller, item.id).await.unwrap();
    assert!(!restored.is_deleted);
    assert_eq!(restored.status, "active");
    assert_eq!(restored.quantity_in_stock, 8);

    // Lots come back live with their remainders.
    let batches = BatchEntity::find()
        .filter(batch::Column::ItemId.eq(item.id))
        .all(app.state.db.as_ref())
        .await
        .unwrap();
    assert!(batches.iter().all(|b| b.status == "active"));

    // Second round: archived past the window.
    let late = app.seed_item(seller, "ret-005", 3, dec!(10), dec!(20)).await;
    app.state
        .services
        .retention
        .delete_item(seller, late.id, DeleteItemRequest::default())
        .await
        .unwrap();
    backdate_deletion(&app, late.id, 31).await;

    let err = app
        .state
        .services
        .retention
        .restore_item(seller, late.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Validation(_));
}

#[tokio::test]
async fn cleanup_removes_expired_items_but_skips_referenced_ones() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();

    // Expired, no dependencies: eligible.
    let expired = app.seed_item(seller, "ret-006", 0, dec!(10), dec!(20)).await;
    app.state
        .services
        .retention
        .delete_item(seller, expired.id, DeleteItemRequest::default())
        .await
        .unwrap();
    backdate_deletion(&app, expired.id, 31).await;

    // Inside the window: untouched by the sweep.
    let fresh = app.seed_item(seller, "ret-007", 0, dec!(10), dec!(20)).await;
    app.state
        .services
        .retention
        .delete_item(seller, fresh.id, DeleteItemRequest::default())
        .await
        .unwrap();
    backdate_deletion(&app, fresh.id, 29).await;

    // Expired but referenced by a sale: skipped, never force-deleted.
    let referenced = app.seed_item(seller, "ret-008", 0, dec!(10), dec!(20)).await;
    attach_sale_reference(&app, seller, referenced.id).await;
    app.state
        .services
        .retention
        .delete_item(seller, referenced.id, DeleteItemRequest::default())
        .await
        .unwrap();
    backdate_deletion(&app, referenced.id, 40).await;

    let report = app
        .state
        .services
        .retention
        .cleanup_expired(seller)
        .await
        .unwrap();

    assert_eq!(report.success, vec![expired.id]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].item_id, referenced.id);
    assert!(report.failed.is_empty());

    assert!(ItemEntity::find_by_id(expired.id)
        .one(app.state.db.as_ref())
        .await
        .unwrap()
        .is_none());
    assert!(ItemEntity::find_by_id(fresh.id)
        .one(app.state.db.as_ref())
        .await
        .unwrap()
        .is_some());
    assert!(ItemEntity::find_by_id(referenced.id)
        .one(app.state.db.as_ref())
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn cleanup_skips_items_with_batch_sales_history() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();

    let item = app.seed_item(seller, "ret-009", 10, dec!(10), dec!(20)).await;
    // Sell everything through so no remainder blocks the archive path, but
    // the batches keep their sold counters.
    app.state
        .services
        .stock
        .mutate_stock(
            seller,
            item.id,
            StockMutationRequest {
                movement: StockMovementKind::Subtract,
                quantity: 10,
                reason: "clearance".to_string(),
                batch_id: None,
                create_new_batch: false,
                cost_price: None,
                selling_price: None,
                supplier: None,
            },
        )
        .await
        .unwrap();

    app.state
        .services
        .retention
        .delete_item(seller, item.id, DeleteItemRequest::default())
        .await
        .unwrap();
    backdate_deletion(&app, item.id, 35).await;

    let report = app
        .state
        .services
        .retention
        .cleanup_expired(seller)
        .await
        .unwrap();
    assert!(report.success.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert!(report.skipped[0].reason.contains("history"));
}

#[tokio::test]
async fn double_archive_is_rejected() {
    let app = TestApp::new().await;
    let seller = Uuid::new_v4();
    let item = app.seed_item(seller, "ret-010", 1, dec!(10), dec!(20)).await;

    app.state
        .services
        .retention
        .delete_item(seller, item.id, DeleteItemRequest::default())
        .await
        .unwrap();
    let err = app
        .state
        .services
        .retention
        .delete_item(seller, item.id, DeleteItemRequest::default())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Validation(_));
}
