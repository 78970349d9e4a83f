use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::handlers::SellerIdentity;
use crate::services::items::{CreateItemRequest, ItemResponse};
use crate::services::retention::{DeleteItemRequest, DeleteItemResponse};
use crate::{ApiResponse, AppState, ListQuery, PaginatedResponse};

/// Create a catalogue item (with an implicit first batch when an opening
/// quantity is supplied)
#[utoipa::path(
    post,
    path = "/api/v1/items",
    request_body = CreateItemRequest,
    responses(
        (status = 201, description = "Item created", body = ItemResponse),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 409, description = "Duplicate SKU", body = crate::errors::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn create_item(
    State(state): State<AppState>,
    SellerIdentity(seller_id): SellerIdentity,
    Json(request): Json<CreateItemRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let item = state.services.items.create_item(seller_id, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(item))))
}

/// Fetch one catalogue item
#[utoipa::path(
    get,
    path = "/api/v1/items/{id}",
    responses(
        (status = 200, description = "Item returned", body = ItemResponse),
        (status = 404, description = "Unknown or foreign item", body = crate::errors::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn get_item(
    State(state): State<AppState>,
    SellerIdentity(seller_id): SellerIdentity,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let item = state.services.items.get_item(seller_id, id).await?;
    Ok(Json(ApiResponse::success(item)))
}

/// List the seller's catalogue
#[utoipa::path(
    get,
    path = "/api/v1/items",
    responses(
        (status = 200, description = "Item list returned")
    ),
    tag = "items"
)]
pub async fn list_items(
    State(state): State<AppState>,
    SellerIdentity(seller_id): SellerIdentity,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let (items, total) = state
        .services
        .items
        .list_items(seller_id, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        items, total, &query,
    ))))
}

/// Delete a catalogue item, soft by default (retention governor)
#[utoipa::path(
    delete,
    path = "/api/v1/items/{id}",
    request_body = DeleteItemRequest,
    responses(
        (status = 200, description = "Deletion outcome", body = DeleteItemResponse),
        (status = 400, description = "Dependencies block removal", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown or foreign item", body = crate::errors::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn delete_item(
    State(state): State<AppState>,
    SellerIdentity(seller_id): SellerIdentity,
    Path(id): Path<Uuid>,
    request: Option<Json<DeleteItemRequest>>,
) -> Result<impl IntoResponse, ServiceError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let outcome = state
        .services
        .retention
        .delete_item(seller_id, id, request)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// Restore a soft-deleted item inside the grace window
#[utoipa::path(
    post,
    path = "/api/v1/items/{id}/restore",
    responses(
        (status = 200, description = "Item restored", body = ItemResponse),
        (status = 400, description = "Outside the restore window", body = crate::errors::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn restore_item(
    State(state): State<AppState>,
    SellerIdentity(seller_id): SellerIdentity,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.retention.restore_item(seller_id, id).await?;
    let item = state.services.items.get_item(seller_id, id).await?;
    Ok(Json(ApiResponse::success(item)))
}
