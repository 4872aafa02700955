use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use stockledger_auth::Permission;
use stockledger_core::{ProductId, WarehouseId};
use stockledger_inventory::{AdjustStock, TransferStock};

use crate::app::routes::authorized;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{PrincipalContext, TenantContext, ledger_context};

pub fn router() -> Router {
    Router::new()
        .route("/adjust", post(adjust_stock))
        .route("/transfer", post(transfer_stock))
        .route("/low", get(low_stock))
        .route("/:product_id", get(stock_for_product))
        .route("/:product_id/:warehouse_id", get(get_stock))
        .route("/:product_id/:warehouse_id/movements", get(list_movements))
        .route("/:product_id/:warehouse_id/audit", get(audit_stock))
}

pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    payload: Result<Json<dto::AdjustStockRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(res) = authorized(&tenant, &principal, Permission::STOCK_ADJUST) {
        return res;
    }
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(res) => return res,
    };

    let cmd = AdjustStock {
        product_id: body.product_id,
        warehouse_id: body.warehouse_id,
        delta: body.quantity_adjustment,
        reason: body.reason,
        occurred_at: Utc::now(),
    };

    match services.ledger.adjust(&ledger_context(&tenant, &principal), cmd).await {
        Ok(_) => Json(dto::MessageResponse::new("Stock adjusted successfully.")).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn transfer_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    payload: Result<Json<dto::TransferStockRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(res) = authorized(&tenant, &principal, Permission::STOCK_TRANSFER) {
        return res;
    }
    let body = match dto::body(payload) {
        Ok(b) => b,
        Err(res) => return res,
    };

    let cmd = TransferStock {
        product_id: body.product_id,
        from_warehouse_id: body.from_warehouse_id,
        to_warehouse_id: body.to_warehouse_id,
        quantity: body.quantity,
        reason: body.reason,
        occurred_at: Utc::now(),
    };

    match services.ledger.transfer(&ledger_context(&tenant, &principal), cmd).await {
        Ok(_) => Json(dto::MessageResponse::new("Stock transferred successfully.")).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn stock_for_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(product_id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match dto::parse_id(&product_id, "product") {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services
        .ledger
        .stock_for_product(&ledger_context(&tenant, &principal), product_id)
        .await
    {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path((product_id, warehouse_id)): Path<(String, String)>,
) -> axum::response::Response {
    let (product_id, warehouse_id) = match parse_pair(&product_id, &warehouse_id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services
        .ledger
        .stock(&ledger_context(&tenant, &principal), product_id, warehouse_id)
        .await
    {
        Ok(Some(row)) => Json(row).into_response(),
        Ok(None) => errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("no stock for product {product_id} in warehouse {warehouse_id}"),
        ),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn list_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path((product_id, warehouse_id)): Path<(String, String)>,
) -> axum::response::Response {
    let (product_id, warehouse_id) = match parse_pair(&product_id, &warehouse_id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services
        .ledger
        .movements(&ledger_context(&tenant, &principal), product_id, warehouse_id)
        .await
    {
        Ok(movements) => Json(movements).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn audit_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path((product_id, warehouse_id)): Path<(String, String)>,
) -> axum::response::Response {
    let (product_id, warehouse_id) = match parse_pair(&product_id, &warehouse_id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services
        .ledger
        .verify_replay(&ledger_context(&tenant, &principal), product_id, warehouse_id)
        .await
    {
        Ok(report) => Json(report).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn low_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::LowStockQuery>,
) -> axum::response::Response {
    let Some(threshold) = query.threshold else {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "threshold query parameter is required",
        );
    };

    match services
        .ledger
        .stock_below(&ledger_context(&tenant, &principal), threshold)
        .await
    {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

fn parse_pair(
    product_id: &str,
    warehouse_id: &str,
) -> Result<(ProductId, WarehouseId), axum::response::Response> {
    Ok((
        dto::parse_id(product_id, "product")?,
        dto::parse_id(warehouse_id, "warehouse")?,
    ))
}
