use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use stockledger_auth::Permission;
use stockledger_core::InvoiceId;
use stockledger_inventory::NewInvoice;

use crate::app::routes::authorized;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext, ledger_context};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_invoice))
        .route("/:id", get(get_invoice))
}

pub async fn create_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    payload: Result<Json<dto::CreateInvoiceRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(res) = authorized(&tenant, &principal, Permission::INVOICES_CREATE) {
        return res;
    }
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(res) => return res,
    };

    let new = NewInvoice {
        customer_id: body.customer_id,
        warehouse_id: body.warehouse_id,
        lines: body.lines,
    };

    match services
        .invoices
        .create(&ledger_context(&tenant, &principal), new)
        .await
    {
        Ok(invoice) => (
            StatusCode::CREATED,
            Json(dto::InvoiceCreatedResponse::from(&invoice)),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: InvoiceId = match dto::parse_id(&id, "invoice") {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services
        .invoices
        .get(&ledger_context(&tenant, &principal), id)
        .await
    {
        Ok(Some(invoice)) => Json(invoice).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "invoice not found"),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
