use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A discrete stock lot. Invariant for any batch not externally adjusted:
/// `quantity_in == quantity_remaining + quantity_sold`, `quantity_remaining >= 0`.
///
/// Batches are never physically deleted while a sale references them; the
/// retention governor archives them instead.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "batches")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub item_id: Uuid,
    pub seller_id: Uuid,
    /// Human-readable lot code, unique per catalogue item
    pub batch_code: String,
    /// Lot size at creation; grows only through an explicit add-to-batch
    pub quantity_in: i64,
    pub quantity_remaining: i64,
    pub quantity_sold: i64,
    /// Prices snapshotted at receipt time
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub cost_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub selling_price: Decimal,
    pub date_received: DateTime<Utc>,
    pub status: String,
    pub supplier: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::catalogue_item::Entity",
        from = "Column::ItemId",
        to = "super::catalogue_item::Column::Id"
    )]
    CatalogueItem,
}

impl Related<super::catalogue_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CatalogueItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchStatus {
    Active,
    Depleted,
    Archived,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Active => "active",
            BatchStatus::Depleted => "depleted",
            BatchStatus::Archived => "archived",
        }
    }

    /// Status a batch should carry for a given remaining quantity.
    pub fn for_remaining(remaining: i64) -> Self {
        if remaining > 0 {
            BatchStatus::Active
        } else {
            BatchStatus::Depleted
        }
    }
}
