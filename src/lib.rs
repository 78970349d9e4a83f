//! stockledger-api
//!
//! Multi-tenant inventory and point-of-sale batch ledger. Stock is held in
//! cost-price lots (batches) depleted in FIFO order so that cost-of-goods
//! and profit come from the correct historical cost.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, response::Json, routing::get, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::errors::ServiceError;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

/// Common query parameters for list endpoints
#[derive(Debug, Deserialize, ToSchema)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_page() -> u64 {
    1
}
fn default_limit() -> u64 {
    20
}

/// Envelope for every successful response
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, query: &ListQuery) -> Self {
        let limit = query.limit.max(1);
        Self {
            items,
            total,
            page: query.page,
            limit,
            total_pages: total.div_ceil(limit),
        }
    }
}

/// Builds the full application router over the shared state.
pub fn app_router(state: AppState) -> Router {
    use axum::routing::post;

    let api = Router::new()
        .route(
            "/items",
            post(handlers::items::create_item).get(handlers::items::list_items),
        )
        .route(
            "/items/:id",
            get(handlers::items::get_item).delete(handlers::items::delete_item),
        )
        .route("/items/:id/restore", post(handlers::items::restore_item))
        .route("/items/:id/stock", post(handlers::inventory::mutate_stock))
        .route(
            "/items/:id/batches",
            post(handlers::inventory::add_batch).get(handlers::inventory::list_batches),
        )
        .route("/orders", post(handlers::orders::create_order))
        .route("/orders/:id", get(handlers::orders::get_order))
        .route(
            "/orders/:id/status",
            post(handlers::orders::update_order_status),
        )
        .route(
            "/orders/:id/reconcile",
            post(handlers::orders::reconcile_order),
        )
        .route("/sales", get(handlers::sales::list_sales))
        .route("/sales/:id", get(handlers::sales::get_sale))
        .route("/deliveries", post(handlers::deliveries::create_delivery))
        .route("/deliveries/:id", get(handlers::deliveries::get_delivery))
        .route(
            "/deliveries/:id/status",
            post(handlers::deliveries::update_delivery_status),
        )
        .route(
            "/maintenance/cleanup",
            post(handlers::maintenance::cleanup_sweep),
        );

    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
        .merge(
            SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(timeout))
        .with_state(state)
}

/// Liveness endpoint with a database ping
async fn health(State(state): State<AppState>) -> Result<Json<Value>, ServiceError> {
    let database = match state.db.ping().await {
        Ok(()) => "up",
        Err(_) => "down",
    };
    Ok(Json(json!({
        "status": "ok",
        "database": database,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

#[cfg(test)]
mod response_tests {
    use super::*;

    #[test]
    fn success_envelope_carries_data() {
        let response = ApiResponse::success(42);
        assert!(response.success);
        assert_eq!(response.data, Some(42));
        assert!(response.message.is_none());
    }

    #[test]
    fn pagination_math_rounds_up() {
        let query = ListQuery { page: 2, limit: 20 };
        let page = PaginatedResponse::new(vec![1, 2, 3], 41, &query);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.page, 2);
    }

    #[test]
    fn zero_limit_is_clamped() {
        let query = ListQuery { page: 1, limit: 0 };
        let page = PaginatedResponse::<i32>::new(vec![], 10, &query);
        assert_eq!(page.limit, 1);
        assert_eq!(page.total_pages, 10);
    }
}
