//! Catalogue item service: creation (with the implicit first batch), reads,
//! and the tenant-scoped lookups the rest of the core builds on.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::db::{is_unique_violation, UnitOfWork};
use crate::entities::catalogue_item::{self, Entity as ItemEntity, ItemStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::batches::{insert_batch, NewBatchSpec};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateItemRequest {
    #[validate(length(min = 1, max = 64, message = "SKU is required"))]
    pub sku: String,
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 32, message = "Unit of measure is required"))]
    pub unit: String,
    #[serde(default)]
    pub reorder_level: i64,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    /// Opening stock; a first batch is created when positive
    #[serde(default)]
    pub initial_quantity: i64,
    pub supplier: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ItemResponse {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub unit: String,
    pub reorder_level: i64,
    pub quantity_in_stock: i64,
    pub total_stocked_quantity: i64,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    pub status: String,
    pub is_deleted: bool,
    pub created_at: chrono::DateTime<Utc>,
}

impl From<catalogue_item::Model> for ItemResponse {
    fn from(model: catalogue_item::Model) -> Self {
        Self {
            id: model.id,
            sku: model.sku,
            name: model.name,
            unit: model.unit,
            reorder_level: model.reorder_level,
            quantity_in_stock: model.quantity_in_stock,
            total_stocked_quantity: model.total_stocked_quantity,
            cost_price: model.cost_price,
            selling_price: model.selling_price,
            status: model.status,
            is_deleted: model.is_deleted,
            created_at: model.created_at,
        }
    }
}

#[derive(Clone)]
pub struct ItemService {
    uow: UnitOfWork,
    event_sender: EventSender,
}

impl ItemService {
    pub fn new(uow: UnitOfWork, event_sender: EventSender) -> Self {
        Self { uow, event_sender }
    }

    /// Creates a catalogue item. A positive opening quantity materializes as
    /// exactly one batch carrying the item's receipt prices.
    #[instrument(skip(self, request), fields(%seller_id, sku = %request.sku))]
    pub async fn create_item(
        &self,
        seller_id: Uuid,
        request: CreateItemRequest,
    ) -> Result<ItemResponse, ServiceError> {
        request.validate()?;
        if request.initial_quantity < 0 {
            return Err(ServiceError::Validation(
                "initial_quantity must not be negative".to_string(),
            ));
        }

        let txn = self.uow.begin().await?;
        let now = Utc::now();
        let item_id = Uuid::new_v4();

        let active = catalogue_item::ActiveModel {
            id: Set(item_id),
            seller_id: Set(seller_id),
            sku: Set(request.sku.clone()),
            name: Set(request.name.clone()),
            unit: Set(request.unit.clone()),
            reorder_level: Set(request.reorder_level),
            quantity_in_stock: Set(0),
            total_stocked_quantity: Set(0),
            cost_price: Set(request.cost_price),
            selling_price: Set(request.selling_price),
            status: Set(ItemStatus::Active.as_str().to_string()),
            is_deleted: Set(false),
            deleted_at: Set(None),
            deletion_reason: Set(None),
            created_at: Set(now),
            updated_at: Set(None),
            version: Set(1),
        };

        let outcome = async {
            let mut item = match active.insert(&txn).await {
                Ok(model) => model,
                Err(e) if is_unique_violation(&e) => {
                    return Err(ServiceError::Conflict(format!(
                        "SKU '{}' already exists",
                        request.sku
                    )))
                }
                Err(e) => return Err(e.into()),
            };

            let mut created_batch = None;
            if request.initial_quantity > 0 {
                let spec = NewBatchSpec {
                    quantity_in: request.initial_quantity,
                    cost_price: request.cost_price,
                    selling_price: request.selling_price,
                    date_received: now,
                    supplier: request.supplier.clone(),
                    expiry_date: None,
                    explicit_code: None,
                };
                let batch = insert_batch(&txn, &item, spec).await?;

                let mut item_active: catalogue_item::ActiveModel = item.clone().into();
                item_active.quantity_in_stock = Set(request.initial_quantity);
                item_active.total_stocked_quantity = Set(request.initial_quantity);
                item_active.updated_at = Set(Some(Utc::now()));
                item = item_active.update(&txn).await?;
                created_batch = Some(batch);
            }

            Ok((item, created_batch))
        }
        .await;

        match outcome {
            Ok((item, created_batch)) => {
                txn.commit().await?;
                if let Some(batch) = created_batch {
                    self.event_sender
                        .emit(Event::BatchCreated {
                            seller_id,
                            item_id,
                            batch_id: batch.id,
                            batch_code: batch.batch_code,
                            quantity_in: batch.quantity_in,
                        })
                        .await;
                }
                info!(%item_id, "catalogue item created");
                Ok(item.into())
            }
            Err(e) => {
                txn.abort().await?;
                Err(e)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn get_item(
        &self,
        seller_id: Uuid,
        item_id: Uuid,
    ) -> Result<ItemResponse, ServiceError> {
        let item = find_owned_item(self.uow.connection(), seller_id, item_id).await?;
        Ok(item.into())
    }

    /// Lists the seller's live catalogue (archived items excluded).
    #[instrument(skip(self))]
    pub async fn list_items(
        &self,
        seller_id: Uuid,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<ItemResponse>, u64), ServiceError> {
        let paginator = ItemEntity::find()
            .filter(catalogue_item::Column::SellerId.eq(seller_id))
            .filter(catalogue_item::Column::IsDeleted.eq(false))
            .order_by_desc(catalogue_item::Column::CreatedAt)
            .paginate(self.uow.connection(), limit);

        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((items.into_iter().map(Into::into).collect(), total))
    }
}

/// Tenant-scoped lookup excluding soft-deleted items. Cross-tenant ids read
/// as absent so ownership is never leaked.
pub(crate) async fn find_owned_item<C: ConnectionTrait>(
    conn: &C,
    seller_id: Uuid,
    item_id: Uuid,
) -> Result<catalogue_item::Model, ServiceError> {
    ItemEntity::find_by_id(item_id)
        .filter(catalogue_item::Column::SellerId.eq(seller_id))
        .filter(catalogue_item::Column::IsDeleted.eq(false))
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", item_id)))
}

/// Tenant-scoped lookup that also returns soft-deleted items; used by the
/// retention governor and by reconciliation of historical orders.
pub(crate) async fn find_owned_item_any<C: ConnectionTrait>(
    conn: &C,
    seller_id: Uuid,
    item_id: Uuid,
) -> Result<catalogue_item::Model, ServiceError> {
    ItemEntity::find_by_id(item_id)
        .filter(catalogue_item::Column::SellerId.eq(seller_id))
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", item_id)))
}
