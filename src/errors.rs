use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable error kind (e.g. "insufficient_stock")
    #[schema(example = "insufficient_stock")]
    pub error: String,
    /// Human-readable error description
    #[schema(example = "insufficient stock: requested 10, available 4 (item)")]
    pub message: String,
    /// Additional detail (per-field validation messages, dependency counts)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub details: Option<serde_json::Value>,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(
        #[from]
        #[serde(skip)]
        DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("insufficient stock: requested {requested}, available {available} ({scope})")]
    InsufficientStock {
        requested: i64,
        available: i64,
        scope: StockScope,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("deletion blocked: {sales} sale record(s), {batches} batch(es) with stock movement, {orders} order reference(s)")]
    Dependency { sales: u64, batches: u64, orders: u64 },

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Event error: {0}")]
    Event(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Granularity at which a stock shortfall was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StockScope {
    Item,
    Batch,
}

impl std::fmt::Display for StockScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StockScope::Item => write!(f, "item"),
            StockScope::Batch => write!(f, "batch"),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

impl ServiceError {
    pub fn insufficient_item_stock(requested: i64, available: i64) -> Self {
        ServiceError::InsufficientStock {
            requested,
            available,
            scope: StockScope::Item,
        }
    }

    pub fn insufficient_batch_stock(requested: i64, available: i64) -> Self {
        ServiceError::InsufficientStock {
            requested,
            available,
            scope: StockScope::Batch,
        }
    }

    /// Machine-readable error kind for the response body.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Database(_) => "database_error",
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation_error",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::Conflict(_) => "conflict",
            Self::Dependency { .. } => "dependency_error",
            Self::InvalidStatus(_) => "invalid_status",
            Self::Unauthorized(_) => "unauthorized",
            Self::Event(_) => "event_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_)
            | Self::InsufficientStock { .. }
            | Self::Dependency { .. }
            | Self::InvalidStatus(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Database(_) | Self::Event(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message suitable for HTTP responses. Infrastructure errors return
    /// generic text to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::Database(_) => "Database error".to_string(),
            Self::Internal(_) | Self::Event(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    /// Structured detail attached to the response body, where the taxonomy
    /// requires enumerated context (shortfalls, dependency counts).
    fn response_details(&self) -> Option<serde_json::Value> {
        match self {
            Self::InsufficientStock {
                requested,
                available,
                scope,
            } => Some(serde_json::json!({
                "requested": requested,
                "available": available,
                "scope": scope.to_string(),
            })),
            Self::Dependency {
                sales,
                batches,
                orders,
            } => Some(serde_json::json!({
                "sales": sales,
                "batches": batches,
                "orders": orders,
            })),
            _ => None,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, kind = self.kind(), "request failed");
        } else {
            tracing::debug!(error = %self, kind = self.kind(), "request rejected");
        }

        let body = ErrorResponse {
            error: self.kind().to_string(),
            message: self.response_message(),
            details: self.response_details(),
            timestamp: Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}
