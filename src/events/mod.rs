use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Best-effort sender for ledger activity events.
///
/// Services call this after a successful commit; a send failure must never
/// roll back ledger state, so callers downgrade errors to warnings.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Fire-and-forget emission used on every post-commit path.
    pub async fn emit(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "failed to emit activity event");
        }
    }
}

/// Events describing what changed in the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    StockMovementRecorded {
        seller_id: Uuid,
        item_id: Uuid,
        movement: String,
        quantity: i64,
        previous_stock: i64,
        new_stock: i64,
        reason: String,
        /// Per-batch breakdown of the movement
        batches: serde_json::Value,
    },
    BatchCreated {
        seller_id: Uuid,
        item_id: Uuid,
        batch_id: Uuid,
        batch_code: String,
        quantity_in: i64,
    },
    SaleCreated {
        seller_id: Uuid,
        sale_id: Uuid,
        order_id: Option<Uuid>,
        total: Decimal,
        line_count: usize,
    },
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    DegradedCostApplied {
        seller_id: Uuid,
        item_id: Uuid,
        order_id: Uuid,
        shortfall: i64,
        fallback_unit_cost: Decimal,
    },
    LowStockDetected {
        seller_id: Uuid,
        item_id: Uuid,
        quantity_in_stock: i64,
        reorder_level: i64,
    },
    OutOfStock {
        seller_id: Uuid,
        item_id: Uuid,
    },
    ItemSoftDeleted {
        seller_id: Uuid,
        item_id: Uuid,
        permanent_deletion_date: DateTime<Utc>,
    },
    ItemRestored {
        seller_id: Uuid,
        item_id: Uuid,
    },
    ItemHardDeleted {
        seller_id: Uuid,
        item_id: Uuid,
    },
    DeliveryStatusChanged {
        delivery_id: Uuid,
        old_status: String,
        new_status: String,
    },
}

/// Consumes the event channel and fans events out to the activity log and
/// notification collaborators. Runs until every sender is dropped.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    info!("Event processor started");

    while let Some(event) = receiver.recv().await {
        match event {
            Event::StockMovementRecorded {
                seller_id,
                item_id,
                ref movement,
                quantity,
                previous_stock,
                new_stock,
                ref reason,
                ..
            } => {
                info!(
                    %seller_id, %item_id, movement, quantity,
                    previous_stock, new_stock, reason,
                    "stock movement recorded"
                );
            }
            Event::BatchCreated {
                seller_id,
                item_id,
                batch_id,
                ref batch_code,
                quantity_in,
            } => {
                info!(
                    %seller_id, %item_id, %batch_id, batch_code, quantity_in,
                    "batch created"
                );
            }
            Event::SaleCreated {
                seller_id,
                sale_id,
                order_id,
                total,
                line_count,
            } => {
                info!(
                    %seller_id, %sale_id, ?order_id, %total, line_count,
                    "sale created"
                );
            }
            Event::OrderStatusChanged {
                order_id,
                ref old_status,
                ref new_status,
            } => {
                info!(%order_id, old_status, new_status, "order status changed");
            }
            Event::DegradedCostApplied {
                seller_id,
                item_id,
                order_id,
                shortfall,
                fallback_unit_cost,
            } => {
                warn!(
                    %seller_id, %item_id, %order_id, shortfall, %fallback_unit_cost,
                    "batches exhausted; cost attribution degraded to current item cost"
                );
            }
            Event::LowStockDetected {
                seller_id,
                item_id,
                quantity_in_stock,
                reorder_level,
            } => {
                warn!(
                    %seller_id, %item_id, quantity_in_stock, reorder_level,
                    "item at or below reorder level"
                );
            }
            Event::OutOfStock { seller_id, item_id } => {
                warn!(%seller_id, %item_id, "item out of stock");
            }
            Event::ItemSoftDeleted {
                seller_id,
                item_id,
                permanent_deletion_date,
            } => {
                info!(
                    %seller_id, %item_id, %permanent_deletion_date,
                    "item archived"
                );
            }
            Event::ItemRestored { seller_id, item_id } => {
                info!(%seller_id, %item_id, "item restored");
            }
            Event::ItemHardDeleted { seller_id, item_id } => {
                info!(%seller_id, %item_id, "item permanently deleted");
            }
            Event::DeliveryStatusChanged {
                delivery_id,
                ref old_status,
                ref new_status,
            } => {
                info!(%delivery_id, old_status, new_status, "delivery status changed");
            }
        }
    }

    warn!("Event processing loop has ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emit_swallows_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        // Must not panic or error out of the call.
        sender
            .emit(Event::OutOfStock {
                seller_id: Uuid::new_v4(),
                item_id: Uuid::new_v4(),
            })
            .await;
    }

    #[tokio::test]
    async fn events_round_trip_through_channel() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        sender
            .send(Event::OrderStatusChanged {
                order_id: Uuid::new_v4(),
                old_status: "shipped".into(),
                new_status: "delivered".into(),
            })
            .await
            .unwrap();
        assert!(matches!(
            rx.recv().await,
            Some(Event::OrderStatusChanged { .. })
        ));
    }
}
