//! Stock mutation service: validates and executes a single explicit
//! inventory-quantity change across the item aggregate and its batches.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::db::{LedgerTxn, UnitOfWork};
use crate::entities::catalogue_item;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::allocation::{
    self, active_batches_fifo, apply_draws, plan_fifo_depletion, BatchMovement,
};
use crate::services::batches::{find_owned_batch, insert_batch, InventoryTotals, NewBatchSpec};
use crate::services::items::find_owned_item;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StockMovementKind {
    Add,
    Subtract,
}

impl StockMovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockMovementKind::Add => "add",
            StockMovementKind::Subtract => "subtract",
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct StockMutationRequest {
    /// Movement direction; accepts the legacy `type` key
    #[serde(alias = "type")]
    pub movement: StockMovementKind,
    #[validate(range(min = 1, message = "quantity must be positive"))]
    pub quantity: i64,
    #[validate(length(min = 1, message = "reason is required"))]
    pub reason: String,
    /// Target an existing batch instead of FIFO/new-batch behavior
    pub batch_id: Option<Uuid>,
    /// Kept for callers that spell out the default add behavior explicitly
    #[serde(default)]
    pub create_new_batch: bool,
    /// Receipt prices for a new batch; the item's current prices otherwise
    pub cost_price: Option<Decimal>,
    pub selling_price: Option<Decimal>,
    pub supplier: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StockChange {
    pub movement: String,
    pub quantity: i64,
    pub reason: String,
    pub previous_stock: i64,
    pub new_stock: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StockMutationResponse {
    pub inventory: InventoryTotals,
    pub affected_batches: Vec<BatchMovement>,
    pub stock_change: StockChange,
}

#[derive(Clone)]
pub struct StockMutationService {
    uow: UnitOfWork,
    event_sender: EventSender,
}

impl StockMutationService {
    pub fn new(uow: UnitOfWork, event_sender: EventSender) -> Self {
        Self { uow, event_sender }
    }

    /// Executes one stock change in a single unit of work. Validation and
    /// the item-level sufficiency check run before any write; a failure
    /// after that point aborts the whole unit of work.
    #[instrument(skip(self, request), fields(%seller_id, %item_id, movement = request.movement.as_str(), quantity = request.quantity))]
    pub async fn mutate_stock(
        &self,
        seller_id: Uuid,
        item_id: Uuid,
        request: StockMutationRequest,
    ) -> Result<StockMutationResponse, ServiceError> {
        request.validate()?;

        let txn = self.uow.begin().await?;
        let outcome = self.mutate_in_txn(&txn, seller_id, item_id, &request).await;

        match outcome {
            Ok((response, reorder_level)) => {
                txn.commit().await?;
                self.emit_events(seller_id, item_id, &request, &response, reorder_level)
                    .await;
                info!(
                    previous = response.stock_change.previous_stock,
                    new = response.stock_change.new_stock,
                    "stock mutation applied"
                );
                Ok(response)
            }
            Err(e) => {
                if !txn.is_transactional() {
                    if let ServiceError::Database(_) = &e {
                        warn!(
                            %item_id,
                            quantity = request.quantity,
                            movement = request.movement.as_str(),
                            "stock mutation failed mid-write in degraded mode; state may need manual reconciliation"
                        );
                    }
                }
                txn.abort().await?;
                Err(e)
            }
        }
    }

    async fn mutate_in_txn(
        &self,
        txn: &LedgerTxn,
        seller_id: Uuid,
        item_id: Uuid,
        request: &StockMutationRequest,
    ) -> Result<(StockMutationResponse, i64), ServiceError> {
        let item = find_owned_item(txn, seller_id, item_id).await?;
        let previous_stock = item.quantity_in_stock;

        let (movements, new_stock, new_total) = match request.movement {
            StockMovementKind::Add => {
                let movement = match request.batch_id {
                    Some(batch_id) => {
                        let batch = find_owned_batch(txn, seller_id, item_id, batch_id).await?;
                        allocation::add_to_batch(txn, batch, request.quantity).await?
                    }
                    None => {
                        let spec = NewBatchSpec {
                            quantity_in: request.quantity,
                            cost_price: request.cost_price.unwrap_or(item.cost_price),
                            selling_price: request.selling_price.unwrap_or(item.selling_price),
                            date_received: Utc::now(),
                            supplier: request.supplier.clone(),
                            expiry_date: None,
                            explicit_code: None,
                        };
                        let batch = insert_batch(txn, &item, spec).await?;
                        BatchMovement {
                            batch_id: batch.id,
                            batch_code: batch.batch_code,
                            quantity: batch.quantity_in,
                            unit_cost: batch.cost_price,
                            remaining_after: batch.quantity_remaining,
                        }
                    }
                };
                (
                    vec![movement],
                    previous_stock + request.quantity,
                    item.total_stocked_quantity + request.quantity,
                )
            }
            StockMovementKind::Subtract => {
                if request.quantity > previous_stock {
                    return Err(ServiceError::insufficient_item_stock(
                        request.quantity,
                        previous_stock,
                    ));
                }
                let movements = match request.batch_id {
                    Some(batch_id) => {
                        let batch = find_owned_batch(txn, seller_id, item_id, batch_id).await?;
                        vec![allocation::remove_from_batch(txn, batch, request.quantity).await?]
                    }
                    None => {
                        let batches = active_batches_fifo(txn, seller_id, item_id).await?;
                        let draws = plan_fifo_depletion(&batches, request.quantity)
                            .map_err(|s| {
                                ServiceError::insufficient_item_stock(s.requested, s.available)
                            })?;
                        apply_draws(txn, &batches, &draws).await?
                    }
                };
                (
                    movements,
                    previous_stock - request.quantity,
                    // Lifetime received total never decreases on removal
                    item.total_stocked_quantity,
                )
            }
        };

        let mut item_active: catalogue_item::ActiveModel = item.clone().into();
        item_active.quantity_in_stock = Set(new_stock);
        item_active.total_stocked_quantity = Set(new_total);
        item_active.updated_at = Set(Some(Utc::now()));
        item_active.version = Set(item.version + 1);
        item_active.update(txn).await?;

        Ok((
            StockMutationResponse {
                inventory: InventoryTotals {
                    quantity_in_stock: new_stock,
                    total_stocked_quantity: new_total,
                },
                affected_batches: movements,
                stock_change: StockChange {
                    movement: request.movement.as_str().to_string(),
                    quantity: request.quantity,
                    reason: request.reason.clone(),
                    previous_stock,
                    new_stock,
                },
            },
            item.reorder_level,
        ))
    }

    async fn emit_events(
        &self,
        seller_id: Uuid,
        item_id: Uuid,
        request: &StockMutationRequest,
        response: &StockMutationResponse,
        reorder_level: i64,
    ) {
        self.event_sender
            .emit(Event::StockMovementRecorded {
                seller_id,
                item_id,
                movement: request.movement.as_str().to_string(),
                quantity: request.quantity,
                previous_stock: response.stock_change.previous_stock,
                new_stock: response.stock_change.new_stock,
                reason: request.reason.clone(),
                batches: serde_json::to_value(&response.affected_batches)
                    .unwrap_or(serde_json::Value::Null),
            })
            .await;

        if request.movement == StockMovementKind::Add && request.batch_id.is_none() {
            if let Some(created) = response.affected_batches.first() {
                self.event_sender
                    .emit(Event::BatchCreated {
                        seller_id,
                        item_id,
                        batch_id: created.batch_id,
                        batch_code: created.batch_code.clone(),
                        quantity_in: created.quantity,
                    })
                    .await;
            }
        }

        if request.movement == StockMovementKind::Subtract {
            let new_stock = response.stock_change.new_stock;
            if new_stock == 0 {
                self.event_sender
                    .emit(Event::OutOfStock { seller_id, item_id })
                    .await;
            } else if new_stock <= reorder_level {
                self.event_sender
                    .emit(Event::LowStockDetected {
                        seller_id,
                        item_id,
                        quantity_in_stock: new_stock,
                        reorder_level,
                    })
                    .await;
            }
        }
    }
}
