//! Delivery schedules: informational logistics snapshots with an
//! append-only status history. No stock effects.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::db::UnitOfWork;
use crate::entities::delivery_schedule::{
    self, DeliveryStatus, Entity as DeliveryEntity, StatusHistoryEntry,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateDeliveryRequest {
    pub order_id: Option<Uuid>,
    pub sale_id: Option<Uuid>,
    #[validate(length(min = 1, message = "address is required"))]
    pub address: String,
    #[validate(length(min = 1, message = "a delivery needs at least one item"))]
    pub items: Vec<DeliveryItemSnapshot>,
    pub scheduled_for: Option<DateTime<Utc>>,
}

/// Frozen view of one scheduled line; later catalogue edits do not affect it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeliveryItemSnapshot {
    pub item_id: Uuid,
    pub name: String,
    pub quantity: i64,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateDeliveryStatusRequest {
    #[validate(length(min = 1, message = "status is required"))]
    pub status: String,
    pub note: Option<String>,
}

#[derive(Clone)]
pub struct DeliveryService {
    uow: UnitOfWork,
    event_sender: EventSender,
}

impl DeliveryService {
    pub fn new(uow: UnitOfWork, event_sender: EventSender) -> Self {
        Self { uow, event_sender }
    }

    #[instrument(skip(self, request), fields(%seller_id))]
    pub async fn create_schedule(
        &self,
        seller_id: Uuid,
        request: CreateDeliveryRequest,
    ) -> Result<delivery_schedule::Model, ServiceError> {
        request.validate()?;

        let now = Utc::now();
        let initial = DeliveryStatus::Scheduled;
        let history = vec![StatusHistoryEntry {
            status: initial.as_str().to_string(),
            at: now,
            note: None,
        }];

        let active = delivery_schedule::ActiveModel {
            id: Set(Uuid::new_v4()),
            seller_id: Set(seller_id),
            order_id: Set(request.order_id),
            sale_id: Set(request.sale_id),
            address: Set(request.address.clone()),
            items: Set(serde_json::to_value(&request.items)
                .map_err(|e| ServiceError::Internal(e.to_string()))?),
            status: Set(initial.as_str().to_string()),
            status_history: Set(serde_json::to_value(&history)
                .map_err(|e| ServiceError::Internal(e.to_string()))?),
            scheduled_for: Set(request.scheduled_for),
            created_at: Set(now),
            updated_at: Set(None),
        };

        let model = active.insert(self.uow.connection()).await?;
        info!(delivery_id = %model.id, "delivery schedule created");
        Ok(model)
    }

    #[instrument(skip(self))]
    pub async fn get_schedule(
        &self,
        seller_id: Uuid,
        delivery_id: Uuid,
    ) -> Result<delivery_schedule::Model, ServiceError> {
        DeliveryEntity::find_by_id(delivery_id)
            .filter(delivery_schedule::Column::SellerId.eq(seller_id))
            .one(self.uow.connection())
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Delivery schedule {} not found", delivery_id))
            })
    }

    /// Moves the schedule along its status machine and appends to the
    /// history; the history is never rewritten.
    #[instrument(skip(self, request), fields(%seller_id, %delivery_id, new_status = %request.status))]
    pub async fn update_status(
        &self,
        seller_id: Uuid,
        delivery_id: Uuid,
        request: UpdateDeliveryStatusRequest,
    ) -> Result<delivery_schedule::Model, ServiceError> {
        request.validate()?;
        let new_status = DeliveryStatus::parse(&request.status).ok_or_else(|| {
            ServiceError::InvalidStatus(format!("Unknown delivery status: {}", request.status))
        })?;

        let model = self.get_schedule(seller_id, delivery_id).await?;
        let old_status = DeliveryStatus::parse(&model.status).ok_or_else(|| {
            ServiceError::Internal(format!(
                "delivery {} carries unknown status '{}'",
                delivery_id, model.status
            ))
        })?;

        if !old_status.can_transition_to(new_status) {
            return Err(ServiceError::InvalidStatus(format!(
                "Cannot transition delivery from '{}' to '{}'",
                old_status.as_str(),
                new_status.as_str()
            )));
        }

        let now = Utc::now();
        let mut history: Vec<StatusHistoryEntry> =
            serde_json::from_value(model.status_history.clone()).unwrap_or_default();
        history.push(StatusHistoryEntry {
            status: new_status.as_str().to_string(),
            at: now,
            note: request.note.clone(),
        });

        let mut active: delivery_schedule::ActiveModel = model.into();
        active.status = Set(new_status.as_str().to_string());
        active.status_history = Set(serde_json::to_value(&history)
            .map_err(|e| ServiceError::Internal(e.to_string()))?);
        active.updated_at = Set(Some(now));
        let updated = active.update(self.uow.connection()).await?;

        self.event_sender
            .emit(Event::DeliveryStatusChanged {
                delivery_id,
                old_status: old_status.as_str().to_string(),
                new_status: new_status.as_str().to_string(),
            })
            .await;

        Ok(updated)
    }
}
