pub mod deliveries;
pub mod inventory;
pub mod items;
pub mod maintenance;
pub mod orders;
pub mod sales;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::UnitOfWork;
use crate::errors::ServiceError;
use crate::events::EventSender;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub items: Arc<crate::services::items::ItemService>,
    pub batches: Arc<crate::services::batches::BatchService>,
    pub stock: Arc<crate::services::stock::StockMutationService>,
    pub orders: Arc<crate::services::reconciliation::OrderReconciliationService>,
    pub sales: Arc<crate::services::sales::SaleService>,
    pub retention: Arc<crate::services::retention::RetentionService>,
    pub deliveries: Arc<crate::services::deliveries::DeliveryService>,
}

impl AppServices {
    /// Build the service container over one unit-of-work handle and one
    /// event channel.
    pub fn new(uow: UnitOfWork, event_sender: EventSender) -> Self {
        Self {
            items: Arc::new(crate::services::items::ItemService::new(
                uow.clone(),
                event_sender.clone(),
            )),
            batches: Arc::new(crate::services::batches::BatchService::new(
                uow.clone(),
                event_sender.clone(),
            )),
            stock: Arc::new(crate::services::stock::StockMutationService::new(
                uow.clone(),
                event_sender.clone(),
            )),
            orders: Arc::new(
                crate::services::reconciliation::OrderReconciliationService::new(
                    uow.clone(),
                    event_sender.clone(),
                ),
            ),
            sales: Arc::new(crate::services::sales::SaleService::new(uow.clone())),
            retention: Arc::new(crate::services::retention::RetentionService::new(
                uow.clone(),
                event_sender.clone(),
            )),
            deliveries: Arc::new(crate::services::deliveries::DeliveryService::new(
                uow,
                event_sender,
            )),
        }
    }
}

/// Session-verified tenant identity, forwarded by the authentication
/// collaborator as the `x-seller-id` header. Requests without it are
/// rejected at the boundary; the core never sees unscoped calls.
#[derive(Debug, Clone, Copy)]
pub struct SellerIdentity(pub Uuid);

const SELLER_HEADER: &str = "x-seller-id";

#[async_trait]
impl<S> FromRequestParts<S> for SellerIdentity
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(SELLER_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ServiceError::Unauthorized(format!("missing {} header", SELLER_HEADER))
            })?;
        let seller_id = Uuid::parse_str(raw)
            .map_err(|_| ServiceError::Unauthorized("invalid seller identity".to_string()))?;
        Ok(SellerIdentity(seller_id))
    }
}
