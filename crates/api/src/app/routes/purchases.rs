use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use stockledger_auth::Permission;
use stockledger_core::PurchaseOrderId;
use stockledger_inventory::NewPurchaseOrder;

use crate::app::routes::authorized;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext, ledger_context};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_purchase_order))
        .route("/:id", get(get_purchase_order))
        .route("/:id/receive", post(receive_purchase_order))
        .route("/:id/cancel", post(cancel_purchase_order))
}

pub async fn create_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    payload: Result<Json<dto::CreatePurchaseOrderRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(res) = authorized(&tenant, &principal, Permission::PURCHASES_CREATE) {
        return res;
    }
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(res) => return res,
    };

    match services
        .receiving
        .create_order(
            &ledger_context(&tenant, &principal),
            NewPurchaseOrder { lines: body.lines },
        )
        .await
    {
        Ok(order) => (StatusCode::CREATED, Json(order)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: PurchaseOrderId = match dto::parse_id(&id, "purchase order") {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services
        .receiving
        .get(&ledger_context(&tenant, &principal), id)
        .await
    {
        Ok(Some(order)) => Json(order).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "purchase order not found"),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// Receive every line of a pending order into one warehouse.
pub async fn receive_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    payload: Result<Json<dto::ReceivePurchaseOrderRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(res) = authorized(&tenant, &principal, Permission::PURCHASES_RECEIVE) {
        return res;
    }
    let id: PurchaseOrderId = match dto::parse_id(&id, "purchase order") {
        Ok(v) => v,
        Err(res) => return res,
    };
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(res) => return res,
    };

    match services
        .receiving
        .receive(&ledger_context(&tenant, &principal), id, body.warehouse_id)
        .await
    {
        Ok(order) => Json(order).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn cancel_purchase_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(res) = authorized(&tenant, &principal, Permission::PURCHASES_CREATE) {
        return res;
    }
    let id: PurchaseOrderId = match dto::parse_id(&id, "purchase order") {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services
        .receiving
        .cancel(&ledger_context(&tenant, &principal), id)
        .await
    {
        Ok(order) => Json(order).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
