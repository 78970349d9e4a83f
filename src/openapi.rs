use utoipa::OpenApi;

use crate::errors::ErrorResponse;
use crate::services::allocation::BatchMovement;
use crate::services::batches::{AddBatchRequest, AddBatchResponse, InventoryTotals};
use crate::services::deliveries::{
    CreateDeliveryRequest, DeliveryItemSnapshot, UpdateDeliveryStatusRequest,
};
use crate::services::items::{CreateItemRequest, ItemResponse};
use crate::services::reconciliation::{
    CreateOrderLine, CreateOrderRequest, GroupFailure, OrderStatusResponse, OrderWithLines,
    ReconciliationReport, UpdateOrderStatusRequest,
};
use crate::services::retention::{
    CleanupFailure, CleanupReport, CleanupSkip, DeleteItemRequest, DeleteItemResponse,
};
use crate::services::sales::SaleWithLines;
use crate::services::stock::{
    StockChange, StockMovementKind, StockMutationRequest, StockMutationResponse,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "stockledger-api",
        description = "Multi-tenant inventory and point-of-sale batch ledger with FIFO cost attribution"
    ),
    paths(
        crate::handlers::items::create_item,
        crate::handlers::items::get_item,
        crate::handlers::items::list_items,
        crate::handlers::items::delete_item,
        crate::handlers::items::restore_item,
        crate::handlers::inventory::mutate_stock,
        crate::handlers::inventory::add_batch,
        crate::handlers::inventory::list_batches,
        crate::handlers::orders::create_order,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::reconcile_order,
        crate::handlers::sales::list_sales,
        crate::handlers::sales::get_sale,
        crate::handlers::deliveries::create_delivery,
        crate::handlers::deliveries::get_delivery,
        crate::handlers::deliveries::update_delivery_status,
        crate::handlers::maintenance::cleanup_sweep,
    ),
    components(schemas(
        ErrorResponse,
        CreateItemRequest,
        ItemResponse,
        DeleteItemRequest,
        DeleteItemResponse,
        StockMutationRequest,
        StockMutationResponse,
        StockMovementKind,
        StockChange,
        BatchMovement,
        AddBatchRequest,
        AddBatchResponse,
        InventoryTotals,
        CreateOrderRequest,
        CreateOrderLine,
        UpdateOrderStatusRequest,
        OrderStatusResponse,
        OrderWithLines,
        ReconciliationReport,
        GroupFailure,
        SaleWithLines,
        CreateDeliveryRequest,
        DeliveryItemSnapshot,
        UpdateDeliveryStatusRequest,
        CleanupReport,
        CleanupSkip,
        CleanupFailure,
    )),
    tags(
        (name = "items", description = "Catalogue item lifecycle"),
        (name = "inventory", description = "Stock mutations and batches"),
        (name = "orders", description = "Order aggregate and reconciliation"),
        (name = "sales", description = "Sale ledger reads"),
        (name = "deliveries", description = "Delivery schedules"),
        (name = "maintenance", description = "Retention sweeps"),
    )
)]
pub struct ApiDoc;
