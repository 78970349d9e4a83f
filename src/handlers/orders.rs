use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::services::reconciliation::{
    CreateOrderRequest, OrderStatusResponse, OrderWithLines, ReconciliationReport,
    UpdateOrderStatusRequest,
};
use crate::{ApiResponse, AppState};

/// Create an order with its lines (consumed aggregate; platform-scoped)
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = OrderWithLines),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.orders.create_order(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(order))))
}

/// Fetch an order with its lines
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    responses(
        (status = 200, description = "Order returned", body = OrderWithLines),
        (status = 404, description = "Unknown order", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.orders.get_order(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Update an order's status; the edge into `delivered` reconciles the order
/// into per-seller sales and returns the report
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/status",
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = OrderStatusResponse),
        (status = 400, description = "Invalid transition", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown order", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state
        .services
        .orders
        .update_order_status(id, request)
        .await?;
    Ok(Json(ApiResponse::success(response)))
}

/// Retry reconciliation for a delivered order (idempotent; already-credited
/// seller groups are skipped)
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/reconcile",
    responses(
        (status = 200, description = "Reconciliation report", body = ReconciliationReport),
        (status = 400, description = "Order not delivered", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn reconcile_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let report = state.services.orders.reconcile_delivered_order(id).await?;
    Ok(Json(ApiResponse::success(report)))
}
