use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockledger_core::{InvoiceId, MovementId, ProductId, PurchaseOrderId, UserId, WarehouseId};

use crate::stock::StockKey;

/// Cause of a quantity change.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    /// Stock received from outside (purchase-order receipt).
    In,
    /// Stock consumed by a sale.
    Out,
    /// One leg of a warehouse-to-warehouse transfer.
    Transfer,
    /// Manual correction (including initial stock).
    Adjustment,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "in",
            MovementType::Out => "out",
            MovementType::Transfer => "transfer",
            MovementType::Adjustment => "adjustment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in" => Some(MovementType::In),
            "out" => Some(MovementType::Out),
            "transfer" => Some(MovementType::Transfer),
            "adjustment" => Some(MovementType::Adjustment),
            _ => None,
        }
    }
}

/// External identifier attached to a movement for audit traceability.
///
/// Formats are stable: invoices use the bare invoice id, purchase orders `PO-{id}`,
/// transfer legs `WH-{counterpart warehouse id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceId(String);

impl ReferenceId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn invoice(id: InvoiceId) -> Self {
        Self(id.to_string())
    }

    pub fn purchase_order(id: PurchaseOrderId) -> Self {
        Self(format!("PO-{id}"))
    }

    pub fn warehouse(id: WarehouseId) -> Self {
        Self(format!("WH-{id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable ledger entry: one signed quantity delta and its cause.
///
/// For every stock row, `Stock.quantity == sum(movement.quantity)` over the movements
/// recorded for the same (product, warehouse) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    /// Signed delta: positive adds stock, negative removes it.
    pub quantity: i64,
    pub movement_type: MovementType,
    pub reason: String,
    pub reference_id: Option<ReferenceId>,
    /// Shared by every movement written in the same atomic unit (pairs transfer legs).
    pub operation_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<UserId>,
}

impl StockMovement {
    pub fn key(&self) -> StockKey {
        StockKey::new(self.product_id, self.warehouse_id)
    }
}
