use axum::{extract::State, response::IntoResponse, Json};

use crate::errors::ServiceError;
use crate::handlers::SellerIdentity;
use crate::services::retention::CleanupReport;
use crate::{ApiResponse, AppState};

/// Run the retention cleanup sweep for the tenant. Triggerable on demand or
/// by an external scheduler; not a resident background process.
#[utoipa::path(
    post,
    path = "/api/v1/maintenance/cleanup",
    responses(
        (status = 200, description = "Cleanup report", body = CleanupReport)
    ),
    tag = "maintenance"
)]
pub async fn cleanup_sweep(
    State(state): State<AppState>,
    SellerIdentity(seller_id): SellerIdentity,
) -> Result<impl IntoResponse, ServiceError> {
    let report = state.services.retention.cleanup_expired(seller_id).await?;
    Ok(Json(ApiResponse::success(report)))
}
