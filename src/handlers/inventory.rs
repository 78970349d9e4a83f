use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::handlers::SellerIdentity;
use crate::services::batches::{AddBatchRequest, AddBatchResponse};
use crate::services::stock::{StockMutationRequest, StockMutationResponse};
use crate::{ApiResponse, AppState, ListQuery, PaginatedResponse};

/// Apply one explicit stock change (add or subtract) to an item
#[utoipa::path(
    post,
    path = "/api/v1/items/{id}/stock",
    request_body = StockMutationRequest,
    responses(
        (status = 200, description = "Stock mutated", body = StockMutationResponse),
        (status = 400, description = "Invalid input or insufficient stock", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown item or batch", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn mutate_stock(
    State(state): State<AppState>,
    SellerIdentity(seller_id): SellerIdentity,
    Path(id): Path<Uuid>,
    Json(request): Json<StockMutationRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state
        .services
        .stock
        .mutate_stock(seller_id, id, request)
        .await?;
    Ok(Json(ApiResponse::success(response)))
}

/// Add a stock batch to an item
#[utoipa::path(
    post,
    path = "/api/v1/items/{id}/batches",
    request_body = AddBatchRequest,
    responses(
        (status = 201, description = "Batch created", body = AddBatchResponse),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 409, description = "Duplicate batch code", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn add_batch(
    State(state): State<AppState>,
    SellerIdentity(seller_id): SellerIdentity,
    Path(id): Path<Uuid>,
    Json(request): Json<AddBatchRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state
        .services
        .batches
        .add_batch(seller_id, id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

/// List an item's batches, newest receipt first
#[utoipa::path(
    get,
    path = "/api/v1/items/{id}/batches",
    responses(
        (status = 200, description = "Batch list returned"),
        (status = 404, description = "Unknown or foreign item", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn list_batches(
    State(state): State<AppState>,
    SellerIdentity(seller_id): SellerIdentity,
    Path(id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let (batches, total) = state
        .services
        .batches
        .list_for_item(seller_id, id, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        batches, total, &query,
    ))))
}
