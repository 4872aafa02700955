use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{ProductId, WarehouseId};

/// Key of a stock row: one product in one warehouse.
///
/// The derived ordering (product, then warehouse) is the global lock order used when
/// an atomic unit touches more than one row.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
}

impl StockKey {
    pub fn new(product_id: ProductId, warehouse_id: WarehouseId) -> Self {
        Self {
            product_id,
            warehouse_id,
        }
    }
}

impl core::fmt::Display for StockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}@{}", self.product_id, self.warehouse_id)
    }
}

/// Current quantity of one product in one warehouse.
///
/// Rows are created lazily on first touch and never deleted; a zero-quantity row is a
/// valid record of "known but empty". Quantity may be negative (manual adjustments are
/// not floor-checked).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stock {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    pub updated_at: DateTime<Utc>,
}

impl Stock {
    /// A not-yet-persisted row with quantity 0.
    pub fn empty(key: StockKey, at: DateTime<Utc>) -> Self {
        Self {
            product_id: key.product_id,
            warehouse_id: key.warehouse_id,
            quantity: 0,
            updated_at: at,
        }
    }

    pub fn key(&self) -> StockKey {
        StockKey::new(self.product_id, self.warehouse_id)
    }
}
