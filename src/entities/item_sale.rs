use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A per-line, per-item sale record snapshotting exactly which batches
/// funded the line and at what historical cost.
///
/// Invariants: the `batches_sold_from` quantities sum to `quantity_sold`;
/// `total_cost_amount` equals the quantity-weighted sum of batch costs;
/// `unit_cost_price == total_cost_amount / quantity_sold`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "item_sales")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub sale_id: Uuid,
    pub seller_id: Uuid,
    pub item_id: Uuid,
    pub quantity_sold: i64,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub unit_selling_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub subtotal: Decimal,
    /// Weighted-average historical cost across the funding batches
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub unit_cost_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total_cost_amount: Decimal,
    /// Ordered JSON array of [`BatchFunding`] records
    pub batches_sold_from: Json,
    /// Set when part of the line was costed from the item's current price
    /// because the batches were exhausted
    pub cost_estimated: bool,
    pub refunded_quantity: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::sale::Entity",
        from = "Column::SaleId",
        to = "super::sale::Column::Id"
    )]
    Sale,
    #[sea_orm(
        belongs_to = "super::catalogue_item::Entity",
        from = "Column::ItemId",
        to = "super::catalogue_item::Column::Id"
    )]
    CatalogueItem,
}

impl Related<super::sale::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sale.def()
    }
}

impl Related<super::catalogue_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CatalogueItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Persisted shape of one `batches_sold_from` element.
///
/// `batch_id` is `None` only for the synthetic shortfall entry written when
/// cost attribution degraded to the item's current price; such entries carry
/// the `ESTIMATED` batch code and the parent line has `cost_estimated` set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFunding {
    pub batch_id: Option<Uuid>,
    pub batch_code: String,
    pub quantity_from_batch: i64,
    pub cost_price_from_batch: Decimal,
}

impl BatchFunding {
    pub const ESTIMATED_CODE: &'static str = "ESTIMATED";
}
