//! Batch store: tenant-scoped lot queries, the add-batch operation, and
//! batch-code generation guarded by the store's uniqueness constraint.

use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::db::{is_unique_violation, LedgerTxn, UnitOfWork};
use crate::entities::{
    batch::{self, BatchStatus, Entity as BatchEntity},
    catalogue_item,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::items;

/// Attempts before abandoning sequence-derived codes for the fallback form.
const MAX_CODE_ATTEMPTS: u32 = 5;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddBatchRequest {
    #[validate(range(min = 1, message = "quantity_in must be positive"))]
    pub quantity_in: i64,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    pub date_received: Option<DateTime<Utc>>,
    pub supplier: Option<String>,
    /// Explicit lot code; generated when absent
    pub batch_code: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AddBatchResponse {
    #[schema(value_type = Object)]
    pub batch: batch::Model,
    pub inventory: InventoryTotals,
}

/// Item-level counters returned alongside every stock-affecting operation.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct InventoryTotals {
    pub quantity_in_stock: i64,
    pub total_stocked_quantity: i64,
}

/// Internal description of a batch to insert inside an open unit of work.
pub(crate) struct NewBatchSpec {
    pub quantity_in: i64,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    pub date_received: DateTime<Utc>,
    pub supplier: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub explicit_code: Option<String>,
}

#[derive(Clone)]
pub struct BatchService {
    uow: UnitOfWork,
    event_sender: EventSender,
}

impl BatchService {
    pub fn new(uow: UnitOfWork, event_sender: EventSender) -> Self {
        Self { uow, event_sender }
    }

    /// Lists an item's batches, newest receipt first.
    #[instrument(skip(self))]
    pub async fn list_for_item(
        &self,
        seller_id: Uuid,
        item_id: Uuid,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<batch::Model>, u64), ServiceError> {
        let conn = self.uow.connection();
        items::find_owned_item(conn, seller_id, item_id).await?;

        let paginator = BatchEntity::find()
            .filter(batch::Column::SellerId.eq(seller_id))
            .filter(batch::Column::ItemId.eq(item_id))
            .order_by_desc(batch::Column::DateReceived)
            .paginate(conn, limit);

        let total = paginator.num_items().await?;
        let batches = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((batches, total))
    }

    /// Explicit batch-add endpoint: creates a lot and credits the item's
    /// stock counters in the same unit of work.
    #[instrument(skip(self, request), fields(%seller_id, %item_id))]
    pub async fn add_batch(
        &self,
        seller_id: Uuid,
        item_id: Uuid,
        request: AddBatchRequest,
    ) -> Result<AddBatchResponse, ServiceError> {
        request.validate()?;

        let txn = self.uow.begin().await?;
        let outcome = self.add_batch_in_txn(&txn, seller_id, item_id, &request).await;

        match outcome {
            Ok(response) => {
                txn.commit().await?;
                self.event_sender
                    .emit(Event::BatchCreated {
                        seller_id,
                        item_id,
                        batch_id: response.batch.id,
                        batch_code: response.batch.batch_code.clone(),
                        quantity_in: response.batch.quantity_in,
                    })
                    .await;
                info!(batch_code = %response.batch.batch_code, "batch added");
                Ok(response)
            }
            Err(e) => {
                txn.abort().await?;
                Err(e)
            }
        }
    }

    async fn add_batch_in_txn(
        &self,
        txn: &LedgerTxn,
        seller_id: Uuid,
        item_id: Uuid,
        request: &AddBatchRequest,
    ) -> Result<AddBatchResponse, ServiceError> {
        let item = items::find_owned_item(txn, seller_id, item_id).await?;

        let spec = NewBatchSpec {
            quantity_in: request.quantity_in,
            cost_price: request.cost_price,
            selling_price: request.selling_price,
            date_received: request.date_received.unwrap_or_else(Utc::now),
            supplier: request.supplier.clone(),
            expiry_date: request.expiry_date,
            explicit_code: request.batch_code.clone(),
        };
        let created = insert_batch(txn, &item, spec).await?;

        let quantity_in_stock = item.quantity_in_stock + request.quantity_in;
        let total_stocked_quantity = item.total_stocked_quantity + request.quantity_in;
        let mut item_active: catalogue_item::ActiveModel = item.clone().into();
        item_active.quantity_in_stock = Set(quantity_in_stock);
        item_active.total_stocked_quantity = Set(total_stocked_quantity);
        item_active.updated_at = Set(Some(Utc::now()));
        item_active.version = Set(item.version + 1);
        item_active.update(txn).await?;

        Ok(AddBatchResponse {
            batch: created,
            inventory: InventoryTotals {
                quantity_in_stock,
                total_stocked_quantity,
            },
        })
    }

    /// Fetches a batch scoped to its owner; cross-tenant ids read as absent.
    pub async fn find_owned_batch(
        &self,
        seller_id: Uuid,
        item_id: Uuid,
        batch_id: Uuid,
    ) -> Result<batch::Model, ServiceError> {
        find_owned_batch(self.uow.connection(), seller_id, item_id, batch_id).await
    }
}

pub(crate) async fn find_owned_batch<C: sea_orm::ConnectionTrait>(
    conn: &C,
    seller_id: Uuid,
    item_id: Uuid,
    batch_id: Uuid,
) -> Result<batch::Model, ServiceError> {
    BatchEntity::find_by_id(batch_id)
        .filter(batch::Column::SellerId.eq(seller_id))
        .filter(batch::Column::ItemId.eq(item_id))
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Batch {} not found", batch_id)))
}

/// Inserts a batch inside an open unit of work.
///
/// Generated codes are `{prefix}-{YYMMDD}-B{seq}`. Each attempt runs in a
/// savepoint so a constraint violation does not poison the enclosing
/// transaction; after [`MAX_CODE_ATTEMPTS`] the code falls back to a
/// timestamp-derived form with a random suffix. Explicit codes get a single
/// attempt and surface a Conflict.
pub(crate) async fn insert_batch(
    txn: &LedgerTxn,
    item: &catalogue_item::Model,
    spec: NewBatchSpec,
) -> Result<batch::Model, ServiceError> {
    let now = Utc::now();

    if let Some(code) = spec.explicit_code.as_deref() {
        return match try_insert_batch(txn, item, &spec, code, now).await {
            Ok(model) => Ok(model),
            Err(e) if is_unique_violation(&e) => Err(ServiceError::Conflict(format!(
                "batch code '{}' already exists for this item",
                code
            ))),
            Err(e) => Err(e.into()),
        };
    }

    let prefix = code_prefix(&item.sku);
    let date_code = spec.date_received.format("%y%m%d").to_string();
    // Existing lot count is only a starting hint; uniqueness is enforced by
    // the store index.
    let existing = BatchEntity::find()
        .filter(batch::Column::ItemId.eq(item.id))
        .count(txn)
        .await?;
    let mut seq = existing + 1;

    for _ in 0..MAX_CODE_ATTEMPTS {
        let code = format!("{prefix}-{date_code}-B{seq}");
        match try_insert_batch(txn, item, &spec, &code, now).await {
            Ok(model) => return Ok(model),
            Err(e) if is_unique_violation(&e) => {
                seq += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let fallback = fallback_code(&prefix, now);
    warn!(
        item_id = %item.id,
        code = %fallback,
        "batch code sequence exhausted; using timestamp-derived code"
    );
    match try_insert_batch(txn, item, &spec, &fallback, now).await {
        Ok(model) => Ok(model),
        Err(e) if is_unique_violation(&e) => Err(ServiceError::Conflict(
            "could not generate a unique batch code".to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}

async fn try_insert_batch(
    txn: &LedgerTxn,
    item: &catalogue_item::Model,
    spec: &NewBatchSpec,
    code: &str,
    now: DateTime<Utc>,
) -> Result<batch::Model, sea_orm::DbErr> {
    let savepoint = txn.savepoint().await?;
    let active = batch::ActiveModel {
        id: Set(Uuid::new_v4()),
        item_id: Set(item.id),
        seller_id: Set(item.seller_id),
        batch_code: Set(code.to_string()),
        quantity_in: Set(spec.quantity_in),
        quantity_remaining: Set(spec.quantity_in),
        quantity_sold: Set(0),
        cost_price: Set(spec.cost_price),
        selling_price: Set(spec.selling_price),
        date_received: Set(spec.date_received),
        status: Set(BatchStatus::Active.as_str().to_string()),
        supplier: Set(spec.supplier.clone()),
        expiry_date: Set(spec.expiry_date),
        created_at: Set(now),
        updated_at: Set(None),
    };
    match active.insert(&savepoint).await {
        Ok(model) => {
            savepoint.commit().await?;
            Ok(model)
        }
        Err(e) => {
            savepoint.abort().await?;
            Err(e)
        }
    }
}

/// Uppercased leading alphanumerics of the SKU, at most 8 characters.
fn code_prefix(sku: &str) -> String {
    let prefix: String = sku
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(8)
        .collect::<String>()
        .to_ascii_uppercase();
    if prefix.is_empty() {
        "LOT".to_string()
    } else {
        prefix
    }
}

fn fallback_code(prefix: &str, now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(1000..10000);
    format!("{prefix}-{}-{suffix}", now.timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_prefix_strips_punctuation_and_uppercases() {
        assert_eq!(code_prefix("tea-001"), "TEA001");
        assert_eq!(code_prefix("coffee_beans_dark"), "COFFEEBE");
        assert_eq!(code_prefix("--"), "LOT");
    }

    #[test]
    fn generated_code_shape() {
        let date = chrono::DateTime::parse_from_rfc3339("2026-03-05T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let code = format!("{}-{}-B{}", code_prefix("tea-001"), date.format("%y%m%d"), 3);
        assert_eq!(code, "TEA001-260305-B3");
    }

    #[test]
    fn fallback_code_carries_prefix_and_random_suffix() {
        let now = Utc::now();
        let code = fallback_code("TEA001", now);
        assert!(code.starts_with("TEA001-"));
        let suffix = code.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 4);
        suffix.parse::<u32>().unwrap();
    }
}
