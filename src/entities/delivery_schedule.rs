use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Logistics snapshot of a sale/order at scheduling time, with an
/// independent status machine and append-only history. Carries no stock
/// effects.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "delivery_schedules")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub seller_id: Uuid,
    pub order_id: Option<Uuid>,
    pub sale_id: Option<Uuid>,
    pub address: String,
    /// Snapshot of the scheduled line items
    pub items: Json,
    pub status: String,
    /// Append-only array of [`StatusHistoryEntry`]
    pub status_history: Json,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: String,
    pub at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Scheduled,
    InTransit,
    Delivered,
    Failed,
    Cancelled,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Scheduled => "scheduled",
            DeliveryStatus::InTransit => "in_transit",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "scheduled" => Some(DeliveryStatus::Scheduled),
            "in_transit" => Some(DeliveryStatus::InTransit),
            "delivered" => Some(DeliveryStatus::Delivered),
            "failed" => Some(DeliveryStatus::Failed),
            "cancelled" | "canceled" => Some(DeliveryStatus::Cancelled),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: DeliveryStatus) -> bool {
        use DeliveryStatus::*;
        match (self, next) {
            (Scheduled, InTransit) | (Scheduled, Cancelled) => true,
            (InTransit, Delivered) | (InTransit, Failed) | (InTransit, Cancelled) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DeliveryStatus::*;

    #[test]
    fn delivery_machine_is_one_way() {
        assert!(Scheduled.can_transition_to(InTransit));
        assert!(InTransit.can_transition_to(Delivered));
        assert!(InTransit.can_transition_to(Failed));
        assert!(!Delivered.can_transition_to(InTransit));
        assert!(!Failed.can_transition_to(Delivered));
        assert!(!Scheduled.can_transition_to(Delivered));
    }
}
