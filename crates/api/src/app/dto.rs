use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use stockledger_core::{CustomerId, InvoiceId, ProductId, WarehouseId};
use stockledger_inventory::{Invoice, InvoiceLine, PurchaseOrderLine};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity_adjustment: i64,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct TransferStockRequest {
    pub product_id: ProductId,
    pub from_warehouse_id: WarehouseId,
    pub to_warehouse_id: WarehouseId,
    pub quantity: i64,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LowStockQuery {
    pub threshold: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    pub customer_id: Option<CustomerId>,
    pub warehouse_id: WarehouseId,
    pub lines: Vec<InvoiceLine>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePurchaseOrderRequest {
    pub lines: Vec<PurchaseOrderLine>,
}

#[derive(Debug, Deserialize)]
pub struct ReceivePurchaseOrderRequest {
    pub warehouse_id: WarehouseId,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceCreatedResponse {
    pub id: InvoiceId,
    pub number: String,
}

impl From<&Invoice> for InvoiceCreatedResponse {
    fn from(invoice: &Invoice) -> Self {
        Self {
            id: invoice.id,
            number: invoice.number.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductCreatedResponse {
    pub product_id: ProductId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seeded_warehouse_id: Option<WarehouseId>,
}

// -------------------------
// Mapping helpers
// -------------------------

/// Unwrap a JSON body, turning extractor rejections into the API's error shape.
pub fn body<T>(payload: Result<axum::Json<T>, JsonRejection>) -> Result<T, axum::response::Response> {
    payload.map(|axum::Json(v)| v).map_err(|e| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_request", e.body_text())
    })
}

/// Parse a typed id from a path segment.
pub fn parse_id<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, axum::response::Response> {
    raw.parse().map_err(|_| errors::invalid_id(what))
}
