//! Retention / soft-delete governor: archival with a 30-day grace window,
//! dependency-guarded hard deletion, restore, and the cleanup sweep.

use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::{LedgerTxn, UnitOfWork};
use crate::entities::{
    batch::{self, BatchStatus, Entity as BatchEntity},
    catalogue_item::{self, Entity as ItemEntity, ItemStatus},
    item_sale::{self, Entity as ItemSaleEntity},
    order_item::{self, Entity as OrderItemEntity},
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::items::find_owned_item_any;

/// Grace window between soft deletion and eligibility for permanent removal.
pub const RETENTION_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct DeleteItemRequest {
    /// Request immediate permanent removal; still refused while any
    /// dependency exists
    #[serde(default)]
    pub force: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteItemResponse {
    /// "soft_delete" or "hard_delete"
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permanent_deletion_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CleanupReport {
    pub success: Vec<Uuid>,
    pub skipped: Vec<CleanupSkip>,
    pub failed: Vec<CleanupFailure>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CleanupSkip {
    pub item_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CleanupFailure {
    pub item_id: Uuid,
    pub error: String,
}

/// Referential dependencies that pin an item to the ledger.
#[derive(Debug, Clone, Copy)]
struct DependencyCounts {
    sales: u64,
    moved_batches: u64,
    orders: u64,
}

impl DependencyCounts {
    fn any(&self) -> bool {
        self.sales > 0 || self.moved_batches > 0 || self.orders > 0
    }

    /// Sale or order references make hard deletion permanently impossible.
    fn permanently_referenced(&self) -> bool {
        self.sales > 0 || self.orders > 0
    }
}

#[derive(Clone)]
pub struct RetentionService {
    uow: UnitOfWork,
    event_sender: EventSender,
}

impl RetentionService {
    pub fn new(uow: UnitOfWork, event_sender: EventSender) -> Self {
        Self { uow, event_sender }
    }

    /// Deletes a catalogue item, soft by default. Hard deletion requires
    /// `force` and a complete absence of dependencies.
    #[instrument(skip(self, request), fields(%seller_id, %item_id, force = request.force))]
    pub async fn delete_item(
        &self,
        seller_id: Uuid,
        item_id: Uuid,
        request: DeleteItemRequest,
    ) -> Result<DeleteItemResponse, ServiceError> {
        let txn = self.uow.begin().await?;

        let outcome = async {
            let item = find_owned_item_any(&txn, seller_id, item_id).await?;
            if item.is_deleted {
                return Err(ServiceError::Validation(format!(
                    "Item {} is already archived",
                    item_id
                )));
            }

            let deps = dependency_counts(&txn, seller_id, item_id).await?;

            if request.force && !deps.any() {
                hard_delete(&txn, &item).await?;
                Ok((DeleteItemResponse {
                    kind: "hard_delete".to_string(),
                    permanent_deletion_date: None,
                }, None))
            } else {
                if request.force && deps.permanently_referenced() {
                    // A forced request with live references is downgraded,
                    // not rejected; the caller learns the counts.
                    info!(
                        sales = deps.sales,
                        orders = deps.orders,
                        "forced deletion downgraded to archive"
                    );
                }
                let deleted_at = Utc::now();
                let permanent = deleted_at + Duration::days(RETENTION_WINDOW_DAYS);
                soft_delete(&txn, &item, deleted_at, request.reason.clone()).await?;
                Ok((DeleteItemResponse {
                    kind: "soft_delete".to_string(),
                    permanent_deletion_date: Some(permanent),
                }, Some(permanent)))
            }
        }
        .await;

        match outcome {
            Ok((response, permanent)) => {
                txn.commit().await?;
                match permanent {
                    Some(date) => {
                        self.event_sender
                            .emit(Event::ItemSoftDeleted {
                                seller_id,
                                item_id,
                                permanent_deletion_date: date,
                            })
                            .await
                    }
                    None => {
                        self.event_sender
                            .emit(Event::ItemHardDeleted { seller_id, item_id })
                            .await
                    }
                }
                Ok(response)
            }
            Err(e) => {
                txn.abort().await?;
                Err(e)
            }
        }
    }

    /// Reverses a soft deletion while the grace window is open.
    #[instrument(skip(self))]
    pub async fn restore_item(
        &self,
        seller_id: Uuid,
        item_id: Uuid,
    ) -> Result<(), ServiceError> {
        let txn = self.uow.begin().await?;

        let outcome = async {
            let item = find_owned_item_any(&txn, seller_id, item_id).await?;
            if !item.is_deleted {
                return Err(ServiceError::Validation(format!(
                    "Item {} is not archived",
                    item_id
                )));
            }
            let deleted_at = item.deleted_at.ok_or_else(|| {
                ServiceError::Internal(format!("archived item {} missing deleted_at", item_id))
            })?;
            if Utc::now() - deleted_at >= Duration::days(RETENTION_WINDOW_DAYS) {
                return Err(ServiceError::Validation(format!(
                    "restore window of {} days has elapsed",
                    RETENTION_WINDOW_DAYS
                )));
            }

            let mut active: catalogue_item::ActiveModel = item.clone().into();
            active.is_deleted = Set(false);
            active.deleted_at = Set(None);
            active.deletion_reason = Set(None);
            active.status = Set(ItemStatus::Active.as_str().to_string());
            active.updated_at = Set(Some(Utc::now()));
            active.version = Set(item.version + 1);
            active.update(&txn).await?;

            // Archived lots come back as active or depleted depending on
            // what remains in them.
            let batches = BatchEntity::find()
                .filter(batch::Column::ItemId.eq(item_id))
                .filter(batch::Column::Status.eq(BatchStatus::Archived.as_str()))
                .all(&txn)
                .await?;
            for b in batches {
                let next = BatchStatus::for_remaining(b.quantity_remaining);
                let mut active: batch::ActiveModel = b.into();
                active.status = Set(next.as_str().to_string());
                active.updated_at = Set(Some(Utc::now()));
                active.update(&txn).await?;
            }

            Ok(())
        }
        .await;

        match outcome {
            Ok(()) => {
                txn.commit().await?;
                self.event_sender
                    .emit(Event::ItemRestored { seller_id, item_id })
                    .await;
                info!("item restored");
                Ok(())
            }
            Err(e) => {
                txn.abort().await?;
                Err(e)
            }
        }
    }

    /// Permanently removes items whose grace window has elapsed.
    /// Dependencies are re-checked per item at sweep time; anything that
    /// acquired sale or order references since archival is skipped, never
    /// force-deleted.
    #[instrument(skip(self))]
    pub async fn cleanup_expired(&self, seller_id: Uuid) -> Result<CleanupReport, ServiceError> {
        let cutoff = Utc::now() - Duration::days(RETENTION_WINDOW_DAYS);
        let candidates = ItemEntity::find()
            .filter(catalogue_item::Column::SellerId.eq(seller_id))
            .filter(catalogue_item::Column::IsDeleted.eq(true))
            .filter(catalogue_item::Column::DeletedAt.lte(cutoff))
            .all(self.uow.connection())
            .await?;

        let mut report = CleanupReport {
            success: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        };

        for item in candidates {
            match self.cleanup_one(seller_id, &item).await {
                Ok(None) => report.success.push(item.id),
                Ok(Some(reason)) => report.skipped.push(CleanupSkip {
                    item_id: item.id,
                    reason,
                }),
                Err(e) => {
                    warn!(item_id = %item.id, error = %e, "cleanup failed for item");
                    report.failed.push(CleanupFailure {
                        item_id: item.id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            success = report.success.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "cleanup sweep finished"
        );
        Ok(report)
    }

    /// Removes a single expired item, or reports why it was skipped.
    async fn cleanup_one(
        &self,
        seller_id: Uuid,
        item: &catalogue_item::Model,
    ) -> Result<Option<String>, ServiceError> {
        let txn = self.uow.begin().await?;

        let outcome = async {
            let deps = dependency_counts(&txn, seller_id, item.id).await?;
            if deps.permanently_referenced() {
                return Ok(Some(format!(
                    "referenced by {} sale record(s) and {} order reference(s)",
                    deps.sales, deps.orders
                )));
            }
            if sold_batch_count(&txn, item.id).await? > 0 {
                return Ok(Some("item has batch sales history".to_string()));
            }

            hard_delete(&txn, item).await?;
            Ok(None)
        }
        .await;

        match outcome {
            Ok(skip) => {
                txn.commit().await?;
                if skip.is_none() {
                    self.event_sender
                        .emit(Event::ItemHardDeleted {
                            seller_id,
                            item_id: item.id,
                        })
                        .await;
                }
                Ok(skip)
            }
            Err(e) => {
                txn.abort().await?;
                Err(e)
            }
        }
    }
}

async fn dependency_counts<C: ConnectionTrait>(
    conn: &C,
    seller_id: Uuid,
    item_id: Uuid,
) -> Result<DependencyCounts, ServiceError> {
    let sales = ItemSaleEntity::find()
        .filter(item_sale::Column::SellerId.eq(seller_id))
        .filter(item_sale::Column::ItemId.eq(item_id))
        .count(conn)
        .await?;

    let moved_batches = BatchEntity::find()
        .filter(batch::Column::ItemId.eq(item_id))
        .filter(
            Condition::any()
                .add(batch::Column::QuantitySold.gt(0))
                .add(batch::Column::QuantityRemaining.gt(0)),
        )
        .count(conn)
        .await?;

    let orders = OrderItemEntity::find()
        .filter(order_item::Column::SellerId.eq(seller_id))
        .filter(order_item::Column::ItemId.eq(item_id))
        .count(conn)
        .await?;

    Ok(DependencyCounts {
        sales,
        moved_batches,
        orders,
    })
}

async fn sold_batch_count<C: ConnectionTrait>(
    conn: &C,
    item_id: Uuid,
) -> Result<u64, ServiceError> {
    BatchEntity::find()
        .filter(batch::Column::ItemId.eq(item_id))
        .filter(batch::Column::QuantitySold.gt(0))
        .count(conn)
        .await
        .map_err(ServiceError::from)
}

async fn soft_delete(
    txn: &LedgerTxn,
    item: &catalogue_item::Model,
    deleted_at: DateTime<Utc>,
    reason: Option<String>,
) -> Result<(), ServiceError> {
    let mut active: catalogue_item::ActiveModel = item.clone().into();
    active.is_deleted = Set(true);
    active.deleted_at = Set(Some(deleted_at));
    active.deletion_reason = Set(reason);
    active.status = Set(ItemStatus::Discontinued.as_str().to_string());
    active.updated_at = Set(Some(deleted_at));
    active.version = Set(item.version + 1);
    active.update(txn).await?;

    // Cascade-archive every lot of the item.
    let batches = BatchEntity::find()
        .filter(batch::Column::ItemId.eq(item.id))
        .all(txn)
        .await?;
    for b in batches {
        if b.status == BatchStatus::Archived.as_str() {
            continue;
        }
        let mut active: batch::ActiveModel = b.into();
        active.status = Set(BatchStatus::Archived.as_str().to_string());
        active.updated_at = Set(Some(deleted_at));
        active.update(txn).await?;
    }

    Ok(())
}

/// Irreversible removal. Callers must have verified the absence of sale and
/// order references and of any batch ever sold from.
async fn hard_delete(txn: &LedgerTxn, item: &catalogue_item::Model) -> Result<(), ServiceError> {
    BatchEntity::delete_many()
        .filter(batch::Column::ItemId.eq(item.id))
        .exec(txn)
        .await?;
    ItemEntity::delete_by_id(item.id).exec(txn).await?;
    Ok(())
}
