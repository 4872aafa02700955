use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier, e.g. `"stock.transfer"`.
///
/// `"*"` is the wildcard granted to administrators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));
    pub const STOCK_ADJUST: Permission = Permission(Cow::Borrowed("stock.adjust"));
    pub const STOCK_TRANSFER: Permission = Permission(Cow::Borrowed("stock.transfer"));
    pub const INVOICES_CREATE: Permission = Permission(Cow::Borrowed("invoices.create"));
    pub const PURCHASES_CREATE: Permission = Permission(Cow::Borrowed("purchases.create"));
    pub const PURCHASES_RECEIVE: Permission = Permission(Cow::Borrowed("purchases.receive"));
    pub const PRODUCTS_CREATE: Permission = Permission(Cow::Borrowed("products.create"));
    pub const WAREHOUSES_MANAGE: Permission = Permission(Cow::Borrowed("warehouses.manage"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
