//! Order aggregate support and the order-to-sale reconciler.
//!
//! The status update and the reconciliation are independent units of work:
//! the status change is durable before any sale is attempted, and per-seller
//! sale creation failures are reported back rather than undoing it.

use std::collections::BTreeMap;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::db::{LedgerTxn, UnitOfWork};
use crate::entities::{
    catalogue_item,
    item_sale::{self, BatchFunding},
    order::{self, Entity as OrderEntity, OrderStatus},
    order_item::{self, Entity as OrderItemEntity},
    sale::{self, Entity as SaleEntity},
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::allocation::{active_batches_fifo, apply_draws, plan_fifo_partial};
use crate::services::items::{find_owned_item, find_owned_item_any};
use crate::services::sales::SaleWithLines;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    pub buyer_id: Uuid,
    /// Generated when absent
    pub order_number: Option<String>,
    #[validate(length(min = 1, message = "an order needs at least one line"))]
    pub lines: Vec<CreateOrderLine>,
    #[serde(default)]
    pub tax: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub shipping_fee: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderLine {
    pub seller_id: Uuid,
    pub item_id: Uuid,
    pub quantity: i64,
    /// Defaults to the item's current selling price
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithLines {
    #[schema(value_type = Object)]
    pub order: order::Model,
    #[schema(value_type = Vec<Object>)]
    pub lines: Vec<order_item::Model>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderStatusRequest {
    #[validate(length(min = 1, message = "status is required"))]
    pub status: String,
}

/// Result of a status update; reconciliation output is attached when the
/// update was the edge into `delivered`.
#[derive(Debug, Serialize, ToSchema)]
pub struct OrderStatusResponse {
    #[schema(value_type = Object)]
    pub order: order::Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconciliation: Option<ReconciliationReport>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReconciliationReport {
    pub sales: Vec<SaleWithLines>,
    /// Seller groups whose sale creation failed; the order status remains
    /// durable and these can be retried idempotently.
    pub failures: Vec<GroupFailure>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GroupFailure {
    pub seller_id: Uuid,
    pub error: String,
}

/// Outcome of one seller group inside its unit of work, before events fire.
struct GroupOutcome {
    sale: sale::Model,
    item_sales: Vec<item_sale::Model>,
    degraded: Vec<DegradedLine>,
    low_stock: Vec<LowStockAlert>,
}

struct DegradedLine {
    item_id: Uuid,
    shortfall: i64,
    fallback_unit_cost: Decimal,
}

struct LowStockAlert {
    item_id: Uuid,
    quantity_in_stock: i64,
    reorder_level: i64,
}

#[derive(Clone)]
pub struct OrderReconciliationService {
    uow: UnitOfWork,
    event_sender: EventSender,
}

impl OrderReconciliationService {
    pub fn new(uow: UnitOfWork, event_sender: EventSender) -> Self {
        Self { uow, event_sender }
    }

    /// Creates the consumed order aggregate with its lines.
    #[instrument(skip(self, request), fields(buyer_id = %request.buyer_id))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<OrderWithLines, ServiceError> {
        request.validate()?;
        for line in &request.lines {
            if line.quantity <= 0 {
                return Err(ServiceError::Validation(
                    "line quantity must be positive".to_string(),
                ));
            }
        }

        let txn = self.uow.begin().await?;
        let outcome = self.create_order_in_txn(&txn, &request).await;

        match outcome {
            Ok(result) => {
                txn.commit().await?;
                info!(order_id = %result.order.id, "order created");
                Ok(result)
            }
            Err(e) => {
                txn.abort().await?;
                Err(e)
            }
        }
    }

    async fn create_order_in_txn(
        &self,
        txn: &LedgerTxn,
        request: &CreateOrderRequest,
    ) -> Result<OrderWithLines, ServiceError> {
        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let order_number = request
            .order_number
            .clone()
            .unwrap_or_else(|| format!("ORD-{}", short_ref(order_id)));

        let mut lines = Vec::with_capacity(request.lines.len());
        let mut subtotal = Decimal::ZERO;
        for line in &request.lines {
            // Ordering requires a live catalogue entry; reconciliation later
            // tolerates items archived after the order was placed.
            let item = find_owned_item(txn, line.seller_id, line.item_id).await?;
            let unit_price = line.unit_price.unwrap_or(item.selling_price);
            let line_subtotal = unit_price * Decimal::from(line.quantity);
            subtotal += line_subtotal;

            let active = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                seller_id: Set(line.seller_id),
                item_id: Set(line.item_id),
                item_name: Set(item.name),
                quantity: Set(line.quantity),
                unit_price: Set(unit_price),
                subtotal: Set(line_subtotal),
            };
            lines.push(active.insert(txn).await?);
        }

        let total = subtotal + request.tax + request.shipping_fee - request.discount;
        let order_active = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number),
            buyer_id: Set(request.buyer_id),
            status: Set(OrderStatus::Pending.as_str().to_string()),
            subtotal: Set(subtotal),
            tax: Set(request.tax),
            discount: Set(request.discount),
            shipping_fee: Set(request.shipping_fee),
            total: Set(total),
            created_at: Set(now),
            updated_at: Set(None),
            version: Set(1),
        };
        let order_model = order_active.insert(txn).await?;

        Ok(OrderWithLines {
            order: order_model,
            lines,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderWithLines, ServiceError> {
        let conn = self.uow.connection();
        let order_model = OrderEntity::find_by_id(order_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        let lines = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(conn)
            .await?;
        Ok(OrderWithLines {
            order: order_model,
            lines,
        })
    }

    /// Validates and persists a status transition. The transition into
    /// `delivered` (and only the edge: previous status != delivered) then
    /// runs order-to-sale reconciliation as separate units of work.
    #[instrument(skip(self, request), fields(%order_id, new_status = %request.status))]
    pub async fn update_order_status(
        &self,
        order_id: Uuid,
        request: UpdateOrderStatusRequest,
    ) -> Result<OrderStatusResponse, ServiceError> {
        request.validate()?;
        let new_status = OrderStatus::parse(&request.status).ok_or_else(|| {
            ServiceError::InvalidStatus(format!("Unknown order status: {}", request.status))
        })?;

        let txn = self.uow.begin().await?;
        let outcome = async {
            let order_model = OrderEntity::find_by_id(order_id)
                .one(&txn)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

            let old_status = OrderStatus::parse(&order_model.status).ok_or_else(|| {
                ServiceError::Internal(format!(
                    "order {} carries unknown status '{}'",
                    order_id, order_model.status
                ))
            })?;

            if !old_status.can_transition_to(new_status) {
                return Err(ServiceError::InvalidStatus(format!(
                    "Cannot transition from '{}' to '{}'",
                    old_status.as_str(),
                    new_status.as_str()
                )));
            }

            let mut active: order::ActiveModel = order_model.clone().into();
            active.status = Set(new_status.as_str().to_string());
            active.updated_at = Set(Some(Utc::now()));
            active.version = Set(order_model.version + 1);
            let updated = active.update(&txn).await?;
            Ok((updated, old_status))
        }
        .await;

        let (updated, old_status) = match outcome {
            Ok(pair) => pair,
            Err(e) => {
                txn.abort().await?;
                return Err(e);
            }
        };
        // The status change is durable before reconciliation starts.
        txn.commit().await?;

        self.event_sender
            .emit(Event::OrderStatusChanged {
                order_id,
                old_status: old_status.as_str().to_string(),
                new_status: new_status.as_str().to_string(),
            })
            .await;

        let reconciliation = if new_status == OrderStatus::Delivered
            && old_status != OrderStatus::Delivered
        {
            Some(self.reconcile_order(&updated).await?)
        } else {
            None
        };

        Ok(OrderStatusResponse {
            order: updated,
            reconciliation,
        })
    }

    /// Re-runs reconciliation for an order already in `delivered` status.
    /// Idempotent: seller groups that already produced a sale are skipped,
    /// so a retry after partial failure never re-credits a seller.
    #[instrument(skip(self))]
    pub async fn reconcile_delivered_order(
        &self,
        order_id: Uuid,
    ) -> Result<ReconciliationReport, ServiceError> {
        let order_model = OrderEntity::find_by_id(order_id)
            .one(self.uow.connection())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if OrderStatus::parse(&order_model.status) != Some(OrderStatus::Delivered) {
            return Err(ServiceError::InvalidStatus(format!(
                "order {} is not delivered (status '{}')",
                order_id, order_model.status
            )));
        }

        self.reconcile_order(&order_model).await
    }

    /// Materializes one sale per fulfilling seller, each in its own unit of
    /// work, with batch-attributed costing.
    async fn reconcile_order(
        &self,
        order_model: &order::Model,
    ) -> Result<ReconciliationReport, ServiceError> {
        let conn = self.uow.connection();
        let lines = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_model.id))
            .order_by_asc(order_item::Column::Id)
            .all(conn)
            .await?;

        // BTreeMap keeps seller iteration deterministic so the rounding
        // remainder always lands on the same group.
        let mut groups: BTreeMap<Uuid, Vec<order_item::Model>> = BTreeMap::new();
        for line in lines {
            groups.entry(line.seller_id).or_default().push(line);
        }

        let group_subtotals: Vec<Decimal> = groups
            .values()
            .map(|lines| lines.iter().map(|l| l.subtotal).sum())
            .collect();
        let tax_shares = allocate_proportional(order_model.tax, &group_subtotals);
        let discount_shares = allocate_proportional(order_model.discount, &group_subtotals);
        let shipping_shares = allocate_proportional(order_model.shipping_fee, &group_subtotals);

        let mut report = ReconciliationReport {
            sales: Vec::new(),
            failures: Vec::new(),
        };

        for (idx, (seller_id, group_lines)) in groups.into_iter().enumerate() {
            let existing = SaleEntity::find()
                .filter(sale::Column::OrderId.eq(order_model.id))
                .filter(sale::Column::SellerId.eq(seller_id))
                .one(conn)
                .await?;
            if existing.is_some() {
                info!(%seller_id, order_id = %order_model.id, "sale already exists for seller group; skipping");
                continue;
            }

            let txn = self.uow.begin().await?;
            let outcome = self
                .create_sale_for_group(
                    &txn,
                    order_model,
                    seller_id,
                    &group_lines,
                    group_subtotals[idx],
                    tax_shares[idx],
                    discount_shares[idx],
                    shipping_shares[idx],
                )
                .await;

            match outcome {
                Ok(group) => {
                    txn.commit().await?;
                    self.emit_group_events(order_model, seller_id, &group).await;
                    report.sales.push(SaleWithLines {
                        sale: group.sale,
                        item_sales: group.item_sales,
                    });
                }
                Err(e) => {
                    warn!(
                        %seller_id,
                        order_id = %order_model.id,
                        error = %e,
                        "sale creation failed for seller group"
                    );
                    txn.abort().await?;
                    report.failures.push(GroupFailure {
                        seller_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    async fn create_sale_for_group(
        &self,
        txn: &LedgerTxn,
        order_model: &order::Model,
        seller_id: Uuid,
        lines: &[order_item::Model],
        subtotal: Decimal,
        tax: Decimal,
        discount: Decimal,
        shipping_fee: Decimal,
    ) -> Result<GroupOutcome, ServiceError> {
        let now = Utc::now();
        let sale_id = Uuid::new_v4();
        let mut item_sales = Vec::with_capacity(lines.len());
        let mut degraded = Vec::new();
        let mut low_stock = Vec::new();

        for line in lines {
            let item = find_owned_item_any(txn, seller_id, line.item_id).await?;

            let batches = active_batches_fifo(txn, seller_id, line.item_id).await?;
            let (draws, shortfall) = plan_fifo_partial(&batches, line.quantity);
            let movements = apply_draws(txn, &batches, &draws).await?;
            let drawn: i64 = movements.iter().map(|m| m.quantity).sum();

            let mut funding: Vec<BatchFunding> = movements
                .iter()
                .map(|m| BatchFunding {
                    batch_id: Some(m.batch_id),
                    batch_code: m.batch_code.clone(),
                    quantity_from_batch: m.quantity,
                    cost_price_from_batch: m.unit_cost,
                })
                .collect();

            let mut total_cost: Decimal = movements
                .iter()
                .map(|m| m.unit_cost * Decimal::from(m.quantity))
                .sum();

            if shortfall > 0 {
                // Batches exhausted: cost the remainder from the item's
                // current price and flag the line as estimated.
                funding.push(BatchFunding {
                    batch_id: None,
                    batch_code: BatchFunding::ESTIMATED_CODE.to_string(),
                    quantity_from_batch: shortfall,
                    cost_price_from_batch: item.cost_price,
                });
                total_cost += item.cost_price * Decimal::from(shortfall);
                degraded.push(DegradedLine {
                    item_id: line.item_id,
                    shortfall,
                    fallback_unit_cost: item.cost_price,
                });
            }

            let unit_cost = if line.quantity > 0 {
                (total_cost / Decimal::from(line.quantity)).round_dp(4)
            } else {
                Decimal::ZERO
            };

            if drawn > 0 {
                let new_stock = item.quantity_in_stock - drawn;
                let mut item_active: catalogue_item::ActiveModel = item.clone().into();
                item_active.quantity_in_stock = Set(new_stock);
                item_active.updated_at = Set(Some(now));
                item_active.version = Set(item.version + 1);
                item_active.update(txn).await?;

                if new_stock <= item.reorder_level {
                    low_stock.push(LowStockAlert {
                        item_id: line.item_id,
                        quantity_in_stock: new_stock,
                        reorder_level: item.reorder_level,
                    });
                }
            }

            let line_active = item_sale::ActiveModel {
                id: Set(Uuid::new_v4()),
                sale_id: Set(sale_id),
                seller_id: Set(seller_id),
                item_id: Set(line.item_id),
                quantity_sold: Set(line.quantity),
                unit_selling_price: Set(line.unit_price),
                subtotal: Set(line.subtotal),
                unit_cost_price: Set(unit_cost),
                total_cost_amount: Set(total_cost),
                batches_sold_from: Set(serde_json::to_value(&funding)
                    .map_err(|e| ServiceError::Internal(e.to_string()))?),
                cost_estimated: Set(shortfall > 0),
                refunded_quantity: Set(0),
                created_at: Set(now),
            };
            item_sales.push(line_active.insert(txn).await?);
        }

        let total = subtotal + tax + shipping_fee - discount;
        let sale_active = sale::ActiveModel {
            id: Set(sale_id),
            seller_id: Set(seller_id),
            order_id: Set(Some(order_model.id)),
            sale_number: Set(format!("SALE-{}", short_ref(sale_id))),
            subtotal: Set(subtotal),
            tax: Set(tax),
            discount: Set(discount),
            shipping_fee: Set(shipping_fee),
            total: Set(total),
            // The order is considered pre-paid
            amount_received: Set(total),
            balance: Set(Decimal::ZERO),
            is_from_order: Set(true),
            refunded_amount: Set(Decimal::ZERO),
            created_at: Set(now),
        };
        let sale_model = sale_active.insert(txn).await?;

        Ok(GroupOutcome {
            sale: sale_model,
            item_sales,
            degraded,
            low_stock,
        })
    }

    async fn emit_group_events(
        &self,
        order_model: &order::Model,
        seller_id: Uuid,
        group: &GroupOutcome,
    ) {
        self.event_sender
            .emit(Event::SaleCreated {
                seller_id,
                sale_id: group.sale.id,
                order_id: Some(order_model.id),
                total: group.sale.total,
                line_count: group.item_sales.len(),
            })
            .await;

        for d in &group.degraded {
            self.event_sender
                .emit(Event::DegradedCostApplied {
                    seller_id,
                    item_id: d.item_id,
                    order_id: order_model.id,
                    shortfall: d.shortfall,
                    fallback_unit_cost: d.fallback_unit_cost,
                })
                .await;
        }

        for alert in &group.low_stock {
            if alert.quantity_in_stock == 0 {
                self.event_sender
                    .emit(Event::OutOfStock {
                        seller_id,
                        item_id: alert.item_id,
                    })
                    .await;
            } else {
                self.event_sender
                    .emit(Event::LowStockDetected {
                        seller_id,
                        item_id: alert.item_id,
                        quantity_in_stock: alert.quantity_in_stock,
                        reorder_level: alert.reorder_level,
                    })
                    .await;
            }
        }
    }
}

/// Splits `amount` across groups proportionally to `weights`, rounded to
/// currency precision, folding the rounding remainder into the last group so
/// the parts always sum to the whole.
fn allocate_proportional(amount: Decimal, weights: &[Decimal]) -> Vec<Decimal> {
    if weights.is_empty() {
        return Vec::new();
    }
    let total_weight: Decimal = weights.iter().copied().sum();
    let mut shares = Vec::with_capacity(weights.len());
    let mut allocated = Decimal::ZERO;

    for (i, w) in weights.iter().enumerate() {
        if i == weights.len() - 1 {
            shares.push(amount - allocated);
        } else if total_weight.is_zero() {
            shares.push(Decimal::ZERO);
        } else {
            let share = (amount * w / total_weight).round_dp(2);
            allocated += share;
            shares.push(share);
        }
    }
    shares
}

fn short_ref(id: Uuid) -> String {
    id.simple().to_string()[..8].to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn proportional_shares_sum_to_the_whole() {
        let shares = allocate_proportional(dec!(10.00), &[dec!(30), dec!(30), dec!(40)]);
        assert_eq!(shares.len(), 3);
        let sum: Decimal = shares.iter().copied().sum();
        assert_eq!(sum, dec!(10.00));
        assert_eq!(shares[0], dec!(3.00));
        assert_eq!(shares[1], dec!(3.00));
        assert_eq!(shares[2], dec!(4.00));
    }

    #[test]
    fn rounding_remainder_lands_on_the_last_group() {
        let shares = allocate_proportional(dec!(10.00), &[dec!(1), dec!(1), dec!(1)]);
        let sum: Decimal = shares.iter().copied().sum();
        assert_eq!(sum, dec!(10.00));
        assert_eq!(shares[0], dec!(3.33));
        assert_eq!(shares[1], dec!(3.33));
        assert_eq!(shares[2], dec!(3.34));
    }

    #[test]
    fn zero_weights_push_everything_to_the_last_group() {
        let shares = allocate_proportional(dec!(5.00), &[dec!(0), dec!(0)]);
        assert_eq!(shares, vec![dec!(0), dec!(5.00)]);
    }

    #[test]
    fn single_group_takes_the_full_amount() {
        let shares = allocate_proportional(dec!(7.77), &[dec!(123)]);
        assert_eq!(shares, vec![dec!(7.77)]);
    }

    #[test]
    fn short_ref_is_stable_and_uppercase() {
        let id = Uuid::nil();
        assert_eq!(short_ref(id), "00000000");
    }
}
