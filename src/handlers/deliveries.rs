use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::handlers::SellerIdentity;
use crate::services::deliveries::{CreateDeliveryRequest, UpdateDeliveryStatusRequest};
use crate::{ApiResponse, AppState};

/// Create a delivery schedule snapshot
#[utoipa::path(
    post,
    path = "/api/v1/deliveries",
    request_body = CreateDeliveryRequest,
    responses(
        (status = 201, description = "Schedule created"),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse)
    ),
    tag = "deliveries"
)]
pub async fn create_delivery(
    State(state): State<AppState>,
    SellerIdentity(seller_id): SellerIdentity,
    Json(request): Json<CreateDeliveryRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let schedule = state
        .services
        .deliveries
        .create_schedule(seller_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(schedule))))
}

/// Fetch a delivery schedule with its status history
#[utoipa::path(
    get,
    path = "/api/v1/deliveries/{id}",
    responses(
        (status = 200, description = "Schedule returned"),
        (status = 404, description = "Unknown or foreign schedule", body = crate::errors::ErrorResponse)
    ),
    tag = "deliveries"
)]
pub async fn get_delivery(
    State(state): State<AppState>,
    SellerIdentity(seller_id): SellerIdentity,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let schedule = state.services.deliveries.get_schedule(seller_id, id).await?;
    Ok(Json(ApiResponse::success(schedule)))
}

/// Advance a delivery schedule along its status machine
#[utoipa::path(
    post,
    path = "/api/v1/deliveries/{id}/status",
    request_body = UpdateDeliveryStatusRequest,
    responses(
        (status = 200, description = "Status updated"),
        (status = 400, description = "Invalid transition", body = crate::errors::ErrorResponse)
    ),
    tag = "deliveries"
)]
pub async fn update_delivery_status(
    State(state): State<AppState>,
    SellerIdentity(seller_id): SellerIdentity,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateDeliveryStatusRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let schedule = state
        .services
        .deliveries
        .update_status(seller_id, id, request)
        .await?;
    Ok(Json(ApiResponse::success(schedule)))
}
