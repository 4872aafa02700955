use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use stockledger_auth::Permission;
use stockledger_core::WarehouseId;
use stockledger_inventory::NewWarehouse;

use crate::app::routes::authorized;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_warehouses).post(register_warehouse))
        .route("/:id/deactivate", post(deactivate_warehouse))
}

pub async fn list_warehouses(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    match services.warehouses.list(tenant.tenant_id()).await {
        Ok(warehouses) => Json(warehouses).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn register_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    payload: Result<Json<NewWarehouse>, JsonRejection>,
) -> axum::response::Response {
    if let Err(res) = authorized(&tenant, &principal, Permission::WAREHOUSES_MANAGE) {
        return res;
    }
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(res) => return res,
    };

    match services.warehouses.register(tenant.tenant_id(), body).await {
        Ok(warehouse) => (StatusCode::CREATED, Json(warehouse)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn deactivate_warehouse(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(res) = authorized(&tenant, &principal, Permission::WAREHOUSES_MANAGE) {
        return res;
    }
    let id: WarehouseId = match dto::parse_id(&id, "warehouse") {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.warehouses.deactivate(tenant.tenant_id(), id).await {
        Ok(warehouse) => Json(warehouse).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
