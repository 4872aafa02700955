use axum::{Router, response::Response, routing::get};

use stockledger_auth::Permission;

use crate::app::errors;
use crate::authz::{Requires, authorize_command};
use crate::context::{PrincipalContext, TenantContext};

pub mod invoices;
pub mod products;
pub mod purchases;
pub mod stock;
pub mod system;
pub mod warehouses;

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/stock", stock::router())
        .nest("/warehouses", warehouses::router())
        .nest("/products", products::router())
        .nest("/invoices", invoices::router())
        .nest("/purchases", purchases::router())
}

/// Permission gate shared by the mutating handlers.
pub(crate) fn authorized(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    permission: Permission,
) -> Result<(), Response> {
    authorize_command(tenant, principal, &Requires(permission)).map_err(errors::forbidden)
}
