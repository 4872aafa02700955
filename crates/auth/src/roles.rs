use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Permission;

/// Role identifier used for RBAC.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static role policy.
///
/// - `admin`: everything
/// - `warehouse`: stock corrections, transfers, purchasing and receipt
/// - `sales`: invoicing
/// - `catalog`: products and warehouses
///
/// Unknown roles (including `viewer`) grant nothing beyond read access.
pub fn permissions_for_roles(roles: &[Role]) -> Vec<Permission> {
    let mut out = Vec::new();
    for role in roles {
        let granted = match role.as_str() {
            "admin" => return vec![Permission::WILDCARD],
            "warehouse" => vec![
                Permission::STOCK_ADJUST,
                Permission::STOCK_TRANSFER,
                Permission::PURCHASES_CREATE,
                Permission::PURCHASES_RECEIVE,
            ],
            "sales" => vec![Permission::INVOICES_CREATE],
            "catalog" => vec![Permission::PRODUCTS_CREATE, Permission::WAREHOUSES_MANAGE],
            _ => Vec::new(),
        };
        for p in granted {
            if !out.contains(&p) {
                out.push(p);
            }
        }
    }
    out
}
