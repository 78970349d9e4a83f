use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::handlers::SellerIdentity;
use crate::services::sales::SaleWithLines;
use crate::{ApiResponse, AppState, ListQuery, PaginatedResponse};

/// List the seller's sales
#[utoipa::path(
    get,
    path = "/api/v1/sales",
    responses(
        (status = 200, description = "Sales list returned")
    ),
    tag = "sales"
)]
pub async fn list_sales(
    State(state): State<AppState>,
    SellerIdentity(seller_id): SellerIdentity,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let (sales, total) = state
        .services
        .sales
        .list_sales(seller_id, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        sales, total, &query,
    ))))
}

/// Fetch one sale with its batch-attributed lines
#[utoipa::path(
    get,
    path = "/api/v1/sales/{id}",
    responses(
        (status = 200, description = "Sale returned", body = SaleWithLines),
        (status = 404, description = "Unknown or foreign sale", body = crate::errors::ErrorResponse)
    ),
    tag = "sales"
)]
pub async fn get_sale(
    State(state): State<AppState>,
    SellerIdentity(seller_id): SellerIdentity,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let sale = state.services.sales.get_sale(seller_id, id).await?;
    Ok(Json(ApiResponse::success(sale)))
}
