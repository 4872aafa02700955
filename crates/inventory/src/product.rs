use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, ProductId};

use crate::ledger::{AdjustStock, LedgerCommand};
use crate::warehouse::{Warehouse, primary_warehouse};

pub const INITIAL_STOCK_REASON: &str = "Initial Stock";

/// Product creation request. Only the fields that affect stock are modelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub initial_stock: i64,
}

impl NewProduct {
    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::invalid_request("product name cannot be empty"));
        }
        if self.initial_stock < 0 {
            return Err(DomainError::invalid_request("initial stock cannot be negative"));
        }
        Ok(())
    }
}

/// The seeding adjustment for a new product, if any.
///
/// Targets the first warehouse that is both primary and active. Returns `None` when
/// `initial_stock` is zero or no such warehouse exists.
pub fn plan_initial_stock<'a>(
    product_id: ProductId,
    initial_stock: i64,
    warehouses: impl IntoIterator<Item = &'a Warehouse>,
    at: DateTime<Utc>,
) -> Option<LedgerCommand> {
    if initial_stock <= 0 {
        return None;
    }
    let target = primary_warehouse(warehouses)?;
    Some(LedgerCommand::Adjust(AdjustStock {
        product_id,
        warehouse_id: target.id,
        delta: initial_stock,
        reason: INITIAL_STOCK_REASON.to_string(),
        occurred_at: at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockledger_core::WarehouseId;

    fn warehouse(is_primary: bool, is_active: bool) -> Warehouse {
        Warehouse {
            id: WarehouseId::new(),
            name: "W".to_string(),
            location: None,
            is_primary,
            is_active,
        }
    }

    #[test]
    fn seeds_primary_active_warehouse() {
        let secondary = warehouse(false, true);
        let primary = warehouse(true, true);
        let product = ProductId::new();

        let cmd = plan_initial_stock(product, 25, [&secondary, &primary], Utc::now()).unwrap();
        let LedgerCommand::Adjust(adjust) = cmd else {
            panic!("expected an adjustment");
        };
        assert_eq!(adjust.warehouse_id, primary.id);
        assert_eq!(adjust.delta, 25);
        assert_eq!(adjust.reason, INITIAL_STOCK_REASON);
    }

    #[test]
    fn no_seed_without_stock_or_primary() {
        let primary = warehouse(true, true);
        assert!(plan_initial_stock(ProductId::new(), 0, [&primary], Utc::now()).is_none());

        let inactive = warehouse(true, false);
        assert!(plan_initial_stock(ProductId::new(), 5, [&inactive], Utc::now()).is_none());
    }

    #[test]
    fn validate_rejects_negative_initial_stock() {
        let p = NewProduct {
            name: "Widget".to_string(),
            initial_stock: -1,
        };
        assert!(matches!(p.validate(), Err(DomainError::InvalidRequest(_))));
    }
}
