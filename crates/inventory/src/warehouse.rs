use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, WarehouseId};

const MAX_NAME_LEN: usize = 100;
const MAX_LOCATION_LEN: usize = 200;

/// Stock location. Owned by the warehouse-management flow; read-only to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub name: String,
    pub location: Option<String>,
    /// Default destination for initial stock. At most one warehouse should carry it.
    pub is_primary: bool,
    pub is_active: bool,
}

/// Registration request for a warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWarehouse {
    pub name: String,
    pub location: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

impl Warehouse {
    pub fn register(id: WarehouseId, new: NewWarehouse) -> DomainResult<Self> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(DomainError::invalid_request("warehouse name cannot be empty"));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(DomainError::invalid_request(format!(
                "warehouse name exceeds {MAX_NAME_LEN} characters"
            )));
        }
        if let Some(loc) = &new.location {
            if loc.chars().count() > MAX_LOCATION_LEN {
                return Err(DomainError::invalid_request(format!(
                    "warehouse location exceeds {MAX_LOCATION_LEN} characters"
                )));
            }
        }

        Ok(Self {
            id,
            name: name.to_string(),
            location: new.location,
            is_primary: new.is_primary,
            is_active: true,
        })
    }
}

/// The first warehouse flagged primary *and* active, if any.
pub fn primary_warehouse<'a>(
    warehouses: impl IntoIterator<Item = &'a Warehouse>,
) -> Option<&'a Warehouse> {
    warehouses.into_iter().find(|w| w.is_primary && w.is_active)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warehouse(is_primary: bool, is_active: bool) -> Warehouse {
        Warehouse {
            id: WarehouseId::new(),
            name: "Main".to_string(),
            location: None,
            is_primary,
            is_active,
        }
    }

    #[test]
    fn primary_must_also_be_active() {
        let inactive_primary = warehouse(true, false);
        let secondary = warehouse(false, true);
        assert!(primary_warehouse([&inactive_primary, &secondary]).is_none());

        let primary = warehouse(true, true);
        let all = vec![inactive_primary, secondary, primary.clone()];
        assert_eq!(primary_warehouse(&all).map(|w| w.id), Some(primary.id));
    }

    #[test]
    fn register_trims_and_validates_name() {
        let w = Warehouse::register(
            WarehouseId::new(),
            NewWarehouse {
                name: "  North  ".to_string(),
                location: Some("Dock 4".to_string()),
                is_primary: true,
            },
        )
        .unwrap();
        assert_eq!(w.name, "North");
        assert!(w.is_active);

        let err = Warehouse::register(
            WarehouseId::new(),
            NewWarehouse {
                name: "   ".to_string(),
                location: None,
                is_primary: false,
            },
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvalidRequest(_)));
    }
}
