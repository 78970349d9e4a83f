use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use stockledger_api::{
    config::AppConfig,
    db::{self, DbConfig, UnitOfWork},
    events::EventSender,
    handlers::AppServices,
    services::items::{CreateItemRequest, ItemResponse},
    AppState,
};

/// Test harness over an in-memory SQLite database.
#[allow(dead_code)]
pub struct TestApp {
    pub state: AppState,
    pub uow: UnitOfWork,
    router: axum::Router,
}

#[allow(dead_code)]
impl TestApp {
    /// Fresh application state with the store's native transaction support.
    pub async fn new() -> Self {
        Self::build(false).await
    }

    /// Fresh application state pinned to the degraded (pass-through)
    /// unit-of-work mode.
    pub async fn degraded() -> Self {
        Self::build(true).await
    }

    async fn build(force_degraded: bool) -> Self {
        let db_cfg = DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        };
        let pool = db::establish_connection_with_config(&db_cfg)
            .await
            .expect("connect to in-memory sqlite");
        db::run_migrations(&pool).await.expect("run migrations");
        let db_arc = Arc::new(pool);

        let (tx, rx) = mpsc::channel(256);
        let event_sender = EventSender::new(tx);
        tokio::spawn(stockledger_api::events::process_events(rx));

        let uow = UnitOfWork::detect(db_arc.clone(), force_degraded).await;
        let services = AppServices::new(uow.clone(), event_sender.clone());

        let config = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        );
        let state = AppState {
            db: db_arc,
            config,
            event_sender,
            services,
        };
        let router = stockledger_api::app_router(state.clone());

        Self { state, uow, router }
    }

    /// Creates a catalogue item through the service layer.
    pub async fn seed_item(
        &self,
        seller_id: Uuid,
        sku: &str,
        initial_quantity: i64,
        cost_price: Decimal,
        selling_price: Decimal,
    ) -> ItemResponse {
        self.state
            .services
            .items
            .create_item(
                seller_id,
                CreateItemRequest {
                    sku: sku.to_string(),
                    name: format!("Item {sku}"),
                    unit: "pcs".to_string(),
                    reorder_level: 0,
                    cost_price,
                    selling_price,
                    initial_quantity,
                    supplier: None,
                },
            )
            .await
            .expect("seed item")
    }

    /// Drives the HTTP surface with an optional tenant header and JSON body.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        seller_id: Option<Uuid>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(seller) = seller_id {
            builder = builder.header("x-seller-id", seller.to_string());
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router call");
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }
}
