//! Batch allocator: translates a signed quantity delta for an item into
//! batch-level mutations, preserving FIFO order and stock conservation.
//!
//! Planning is a pure function over a batch list read once at the start of
//! the unit of work; applying the plan mutates the batches inside the
//! caller's transaction so a failed unit of work discards every draw.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use uuid::Uuid;

use crate::entities::batch::{self, BatchStatus, Entity as BatchEntity};
use crate::errors::ServiceError;

/// One planned draw against a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchDraw {
    pub batch_id: Uuid,
    pub batch_code: String,
    pub quantity: i64,
    pub unit_cost: Decimal,
}

/// One applied batch mutation, reported back to callers for activity
/// records and `batches_sold_from` snapshots.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct BatchMovement {
    pub batch_id: Uuid,
    pub batch_code: String,
    pub quantity: i64,
    pub unit_cost: Decimal,
    pub remaining_after: i64,
}

/// Requested quantity could not be covered by the supplied batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortfall {
    pub requested: i64,
    pub available: i64,
}

impl Shortfall {
    pub fn missing(&self) -> i64 {
        self.requested - self.available
    }
}

/// Active batches of an item in depletion order: `date_received` ascending,
/// ties broken by creation time then id so the walk is deterministic.
pub async fn active_batches_fifo<C: ConnectionTrait>(
    conn: &C,
    seller_id: Uuid,
    item_id: Uuid,
) -> Result<Vec<batch::Model>, ServiceError> {
    BatchEntity::find()
        .filter(batch::Column::SellerId.eq(seller_id))
        .filter(batch::Column::ItemId.eq(item_id))
        .filter(batch::Column::Status.eq(BatchStatus::Active.as_str()))
        .filter(batch::Column::QuantityRemaining.gt(0))
        .order_by_asc(batch::Column::DateReceived)
        .order_by_asc(batch::Column::CreatedAt)
        .order_by_asc(batch::Column::Id)
        .all(conn)
        .await
        .map_err(ServiceError::from)
}

/// Plans a FIFO depletion of `requested` units across `batches`.
///
/// All-or-nothing: if the batches cannot cover the request the plan is
/// rejected and nothing may be applied.
pub fn plan_fifo_depletion(
    batches: &[batch::Model],
    requested: i64,
) -> Result<Vec<BatchDraw>, Shortfall> {
    let (draws, shortfall) = plan_fifo_partial(batches, requested);
    if shortfall > 0 {
        return Err(Shortfall {
            requested,
            available: requested - shortfall,
        });
    }
    Ok(draws)
}

/// Plans as much of `requested` as the batches can fund, returning the draws
/// and the uncovered remainder. Used by order reconciliation, where a
/// shortfall degrades cost attribution instead of failing the operation.
pub fn plan_fifo_partial(batches: &[batch::Model], requested: i64) -> (Vec<BatchDraw>, i64) {
    let mut remaining = requested;
    let mut draws = Vec::new();

    for b in batches {
        if remaining == 0 {
            break;
        }
        let take = remaining.min(b.quantity_remaining);
        if take == 0 {
            continue;
        }
        draws.push(BatchDraw {
            batch_id: b.id,
            batch_code: b.batch_code.clone(),
            quantity: take,
            unit_cost: b.cost_price,
        });
        remaining -= take;
    }

    (draws, remaining)
}

/// Applies a depletion plan to the batches it was computed from, inside the
/// caller's unit of work. `batches` must be the same list the plan was built
/// over; the list is not re-read mid-walk.
pub async fn apply_draws<C: ConnectionTrait>(
    conn: &C,
    batches: &[batch::Model],
    draws: &[BatchDraw],
) -> Result<Vec<BatchMovement>, ServiceError> {
    let mut movements = Vec::with_capacity(draws.len());

    for draw in draws {
        let model = batches
            .iter()
            .find(|b| b.id == draw.batch_id)
            .ok_or_else(|| {
                ServiceError::Internal(format!("planned batch {} missing from read set", draw.batch_id))
            })?;

        let remaining_after = model.quantity_remaining - draw.quantity;
        let mut active: batch::ActiveModel = model.clone().into();
        active.quantity_remaining = Set(remaining_after);
        active.quantity_sold = Set(model.quantity_sold + draw.quantity);
        active.status = Set(BatchStatus::for_remaining(remaining_after).as_str().to_string());
        active.updated_at = Set(Some(Utc::now()));
        active.update(conn).await?;

        movements.push(BatchMovement {
            batch_id: draw.batch_id,
            batch_code: draw.batch_code.clone(),
            quantity: draw.quantity,
            unit_cost: draw.unit_cost,
            remaining_after,
        });
    }

    Ok(movements)
}

/// Adds `delta` units to an explicitly chosen batch, growing both the lot
/// size and the remainder. A depleted batch becomes active again.
pub async fn add_to_batch<C: ConnectionTrait>(
    conn: &C,
    batch_model: batch::Model,
    delta: i64,
) -> Result<BatchMovement, ServiceError> {
    let remaining_after = batch_model.quantity_remaining + delta;
    let unit_cost = batch_model.cost_price;
    let batch_id = batch_model.id;
    let batch_code = batch_model.batch_code.clone();

    let mut active: batch::ActiveModel = batch_model.clone().into();
    active.quantity_in = Set(batch_model.quantity_in + delta);
    active.quantity_remaining = Set(remaining_after);
    active.status = Set(BatchStatus::for_remaining(remaining_after).as_str().to_string());
    active.updated_at = Set(Some(Utc::now()));
    active.update(conn).await?;

    Ok(BatchMovement {
        batch_id,
        batch_code,
        quantity: delta,
        unit_cost,
        remaining_after,
    })
}

/// Removes `delta` units from an explicitly chosen batch.
pub async fn remove_from_batch<C: ConnectionTrait>(
    conn: &C,
    batch_model: batch::Model,
    delta: i64,
) -> Result<BatchMovement, ServiceError> {
    if delta > batch_model.quantity_remaining {
        return Err(ServiceError::insufficient_batch_stock(
            delta,
            batch_model.quantity_remaining,
        ));
    }

    let remaining_after = batch_model.quantity_remaining - delta;
    let unit_cost = batch_model.cost_price;
    let batch_id = batch_model.id;
    let batch_code = batch_model.batch_code.clone();

    let mut active: batch::ActiveModel = batch_model.clone().into();
    active.quantity_remaining = Set(remaining_after);
    active.quantity_sold = Set(batch_model.quantity_sold + delta);
    active.status = Set(BatchStatus::for_remaining(remaining_after).as_str().to_string());
    active.updated_at = Set(Some(Utc::now()));
    active.update(conn).await?;

    Ok(BatchMovement {
        batch_id,
        batch_code,
        quantity: delta,
        unit_cost,
        remaining_after,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn make_batch(code: &str, received_days_ago: i64, remaining: i64, cost: Decimal) -> batch::Model {
        let received = Utc::now() - Duration::days(received_days_ago);
        batch::Model {
            id: Uuid::new_v4(),
            item_id: Uuid::new_v4(),
            seller_id: Uuid::new_v4(),
            batch_code: code.to_string(),
            quantity_in: remaining,
            quantity_remaining: remaining,
            quantity_sold: 0,
            cost_price: cost,
            selling_price: cost * dec!(2),
            date_received: received,
            status: BatchStatus::Active.as_str().to_string(),
            supplier: None,
            expiry_date: None,
            created_at: received,
            updated_at: None,
        }
    }

    #[test]
    fn depletes_oldest_batch_first() {
        let b1 = make_batch("B1", 2, 5, dec!(100));
        let b2 = make_batch("B2", 1, 5, dec!(150));
        let draws = plan_fifo_depletion(&[b1.clone(), b2.clone()], 7).unwrap();

        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].batch_id, b1.id);
        assert_eq!(draws[0].quantity, 5);
        assert_eq!(draws[1].batch_id, b2.id);
        assert_eq!(draws[1].quantity, 2);
    }

    #[test]
    fn exact_single_batch_fill_leaves_later_batches_untouched() {
        let b1 = make_batch("B1", 2, 5, dec!(100));
        let b2 = make_batch("B2", 1, 5, dec!(150));
        let draws = plan_fifo_depletion(&[b1.clone(), b2], 5).unwrap();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].batch_id, b1.id);
    }

    #[test]
    fn over_ask_is_rejected_with_the_shortfall() {
        let b1 = make_batch("B1", 2, 5, dec!(100));
        let b2 = make_batch("B2", 1, 3, dec!(150));
        let err = plan_fifo_depletion(&[b1, b2], 9).unwrap_err();
        assert_eq!(err.requested, 9);
        assert_eq!(err.available, 8);
        assert_eq!(err.missing(), 1);
    }

    #[test]
    fn partial_plan_reports_uncovered_remainder() {
        let b1 = make_batch("B1", 2, 5, dec!(100));
        let (draws, shortfall) = plan_fifo_partial(&[b1], 8);
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].quantity, 5);
        assert_eq!(shortfall, 3);
    }

    #[test]
    fn empty_batch_list_covers_nothing() {
        let (draws, shortfall) = plan_fifo_partial(&[], 4);
        assert!(draws.is_empty());
        assert_eq!(shortfall, 4);
    }

    proptest! {
        #[test]
        fn planned_draws_conserve_quantity(
            remainders in proptest::collection::vec(0i64..200, 0..8),
            requested in 0i64..1000,
        ) {
            let batches: Vec<batch::Model> = remainders
                .iter()
                .enumerate()
                .map(|(i, r)| make_batch(&format!("B{i}"), (remainders.len() - i) as i64, *r, dec!(10)))
                .collect();
            let available: i64 = remainders.iter().sum();

            let (draws, shortfall) = plan_fifo_partial(&batches, requested);
            let drawn: i64 = draws.iter().map(|d| d.quantity).sum();

            // Drawn plus shortfall always reconstructs the request.
            prop_assert_eq!(drawn + shortfall, requested);
            prop_assert!(drawn <= available);
            // No draw exceeds its batch remainder and none are empty.
            for d in &draws {
                let b = batches.iter().find(|b| b.id == d.batch_id).unwrap();
                prop_assert!(d.quantity >= 1);
                prop_assert!(d.quantity <= b.quantity_remaining);
            }
            // A batch is only drawn from when every earlier batch is drained.
            for (i, d) in draws.iter().enumerate() {
                let pos = batches.iter().position(|b| b.id == d.batch_id).unwrap();
                for earlier in batches.iter().take(pos) {
                    if earlier.quantity_remaining > 0 {
                        prop_assert!(draws[..i]
                            .iter()
                            .any(|p| p.batch_id == earlier.id
                                && p.quantity == earlier.quantity_remaining));
                    }
                }
            }
        }
    }
}
