use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};

use stockledger_auth::Permission;
use stockledger_inventory::NewProduct;

use crate::app::routes::authorized;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext, ledger_context};

pub fn router() -> Router {
    Router::new().route("/", post(create_product))
}

/// Create a product and seed its initial stock into the primary warehouse.
pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    payload: Result<Json<NewProduct>, JsonRejection>,
) -> axum::response::Response {
    if let Err(res) = authorized(&tenant, &principal, Permission::PRODUCTS_CREATE) {
        return res;
    }
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(res) => return res,
    };

    match services
        .products
        .seed(&ledger_context(&tenant, &principal), body)
        .await
    {
        Ok(record) => (
            StatusCode::CREATED,
            Json(dto::ProductCreatedResponse {
                product_id: record.id,
                seeded_warehouse_id: record.seeded_warehouse_id,
            }),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
