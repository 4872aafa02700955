use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

use stockledger_api::app::{AppServices, build_app};
use stockledger_auth::{JwtClaims, PrincipalId, Role};
use stockledger_core::TenantId;

const SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory storage, ephemeral port.
        let services = Arc::new(AppServices::in_memory(Duration::from_secs(5)));
        let app = build_app(SECRET.to_string(), services);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    async fn get(&self, token: &str, path: &str) -> (StatusCode, Value) {
        let res = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn post(&self, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn quantity(&self, token: &str, product: &str, warehouse: &str) -> i64 {
        let (status, row) = self.get(token, &format!("/stock/{product}/{warehouse}")).await;
        assert_eq!(status, StatusCode::OK, "no stock row: {row}");
        row["quantity"].as_i64().unwrap()
    }

    async fn warehouse(&self, token: &str, name: &str, is_primary: bool) -> String {
        let (status, body) = self
            .post(token, "/warehouses", json!({ "name": name, "is_primary": is_primary }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    async fn adjust(&self, token: &str, product: &str, warehouse: &str, delta: i64) -> (StatusCode, Value) {
        self.post(
            token,
            "/stock/adjust",
            json!({
                "product_id": product,
                "warehouse_id": warehouse,
                "quantity_adjustment": delta,
                "reason": "cycle count",
            }),
        )
        .await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(tenant_id: TenantId, roles: Vec<Role>) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub: PrincipalId::new(),
        tenant_id,
        roles,
        issued_at: now - ChronoDuration::seconds(5),
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn admin() -> String {
    mint_jwt(TenantId::new(), vec![Role::new("admin")])
}

fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

#[tokio::test]
async fn health_is_public_but_everything_else_needs_a_token() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(format!("{}/health", srv.base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv.client.get(format!("{}/whoami", srv.base_url)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv
        .client
        .get(format!("{}/whoami", srv.base_url))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tenant_context_is_derived_from_token() {
    let srv = TestServer::spawn().await;
    let tenant_id = TenantId::new();
    let token = mint_jwt(tenant_id, vec![Role::new("admin")]);

    let (status, body) = srv.get(&token, "/whoami").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tenant_id"].as_str().unwrap(), tenant_id.to_string());
    assert!(body["roles"].as_array().unwrap().iter().any(|r| r == "admin"));
}

#[tokio::test]
async fn adjust_transfer_and_audit() {
    let srv = TestServer::spawn().await;
    let token = admin();
    let (p, w1, w2) = (new_id(), new_id(), new_id());

    let (status, body) = srv.adjust(&token, &p, &w1, 20).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Stock adjusted successfully.");

    let (status, body) = srv
        .post(
            &token,
            "/stock/transfer",
            json!({ "product_id": p, "from_warehouse_id": w1, "to_warehouse_id": w2, "quantity": 8 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(srv.quantity(&token, &p, &w1).await, 12);
    assert_eq!(srv.quantity(&token, &p, &w2).await, 8);

    let (_, movements) = srv.get(&token, &format!("/stock/{p}/{w2}/movements")).await;
    let movements = movements.as_array().unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0]["movement_type"], "transfer");
    assert_eq!(movements[0]["reference_id"], format!("WH-{w1}"));

    let (_, rows) = srv.get(&token, &format!("/stock/{p}")).await;
    assert_eq!(rows.as_array().unwrap().len(), 2);

    let (status, audit) = srv.get(&token, &format!("/stock/{p}/{w1}/audit")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(audit["consistent"], true);
    assert_eq!(audit["movement_sum"], 12);
}

#[tokio::test]
async fn rejected_operations_map_to_client_errors() {
    let srv = TestServer::spawn().await;
    let token = admin();
    let (p, w1, w2) = (new_id(), new_id(), new_id());
    srv.adjust(&token, &p, &w1, 3).await;

    let transfer = |from: &str, to: &str, quantity: i64| {
        json!({ "product_id": p, "from_warehouse_id": from, "to_warehouse_id": to, "quantity": quantity })
    };

    let (status, body) = srv.post(&token, "/stock/transfer", transfer(&w1, &w2, 5)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "insufficient_stock");
    assert_eq!(srv.quantity(&token, &p, &w1).await, 3);
    let (status, _) = srv.get(&token, &format!("/stock/{p}/{w2}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = srv.post(&token, "/stock/transfer", transfer(&w1, &w1, 1)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");

    // A zero adjustment is still recorded; it changes nothing.
    let (status, body) = srv.adjust(&token, &p, &w1, 0).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(srv.quantity(&token, &p, &w1).await, 3);

    let (status, body) = srv.get(&token, "/stock/not-an-id").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn adjustments_may_go_negative() {
    let srv = TestServer::spawn().await;
    let token = admin();
    let (p, w) = (new_id(), new_id());

    let (status, _) = srv.adjust(&token, &p, &w, -4).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(srv.quantity(&token, &p, &w).await, -4);

    let (_, low) = srv.get(&token, "/stock/low?threshold=0").await;
    assert_eq!(low.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn product_onboarding_seeds_the_primary_warehouse() {
    let srv = TestServer::spawn().await;
    let token = admin();
    srv.warehouse(&token, "Overflow", false).await;
    let main = srv.warehouse(&token, "Main", true).await;

    let (status, body) = srv
        .post(&token, "/products", json!({ "name": "Widget", "initial_stock": 50 }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["seeded_warehouse_id"], main.as_str());

    let product = body["product_id"].as_str().unwrap();
    assert_eq!(srv.quantity(&token, product, &main).await, 50);
    let (_, movements) = srv.get(&token, &format!("/stock/{product}/{main}/movements")).await;
    assert_eq!(movements[0]["reason"], "Initial Stock");
}

#[tokio::test]
async fn invoices_deduct_atomically() {
    let srv = TestServer::spawn().await;
    let token = admin();
    let (p1, p2, w) = (new_id(), new_id(), new_id());
    srv.adjust(&token, &p1, &w, 10).await;
    srv.adjust(&token, &p2, &w, 1).await;

    let (status, invoice) = srv
        .post(
            &token,
            "/invoices",
            json!({ "warehouse_id": w, "lines": [{ "product_id": p1, "quantity": 4 }] }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{invoice}");
    assert!(invoice["number"].as_str().unwrap().starts_with("INV-"));
    assert_eq!(srv.quantity(&token, &p1, &w).await, 6);

    let (_, movements) = srv.get(&token, &format!("/stock/{p1}/{w}/movements")).await;
    let last = movements.as_array().unwrap().last().unwrap().clone();
    assert_eq!(last["quantity"], -4);
    assert_eq!(last["movement_type"], "out");
    assert_eq!(last["reference_id"], invoice["id"]);

    // Second line cannot be covered: nothing is deducted and no invoice is stored.
    let (status, body) = srv
        .post(
            &token,
            "/invoices",
            json!({
                "warehouse_id": w,
                "lines": [{ "product_id": p1, "quantity": 1 }, { "product_id": p2, "quantity": 2 }],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "insufficient_stock");
    assert_eq!(srv.quantity(&token, &p1, &w).await, 6);
    assert_eq!(srv.quantity(&token, &p2, &w).await, 1);

    let (status, stored) = srv
        .get(&token, &format!("/invoices/{}", invoice["id"].as_str().unwrap()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored["number"], invoice["number"]);
}

#[tokio::test]
async fn purchase_orders_are_received_once() {
    let srv = TestServer::spawn().await;
    let token = admin();
    let p = new_id();
    let w = srv.warehouse(&token, "Dock", false).await;

    let (status, order) = srv
        .post(&token, "/purchases", json!({ "lines": [{ "product_id": p, "quantity": 7 }] }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    assert_eq!(order["status"], "pending");
    let id = order["id"].as_str().unwrap();

    let unknown = new_id();
    let (status, body) = srv
        .post(&token, &format!("/purchases/{id}/receive"), json!({ "warehouse_id": unknown }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
    let (status, _) = srv.get(&token, &format!("/stock/{p}/{unknown}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, received) = srv
        .post(&token, &format!("/purchases/{id}/receive"), json!({ "warehouse_id": w }))
        .await;
    assert_eq!(status, StatusCode::OK, "{received}");
    assert_eq!(received["status"], "received");
    assert_eq!(srv.quantity(&token, &p, &w).await, 7);

    let (status, body) = srv
        .post(&token, &format!("/purchases/{id}/receive"), json!({ "warehouse_id": w }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");
    assert_eq!(srv.quantity(&token, &p, &w).await, 7);

    let (status, _) = srv.post(&token, &format!("/purchases/{id}/cancel"), json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = srv
        .post(&token, &format!("/purchases/{}/receive", new_id()), json!({ "warehouse_id": w }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deactivated_warehouses_stop_onboarding_and_receipts() {
    let srv = TestServer::spawn().await;
    let token = admin();
    let main = srv.warehouse(&token, "Main", true).await;

    let (status, body) = srv
        .post(&token, &format!("/warehouses/{main}/deactivate"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["is_active"], false);

    let (_, listed) = srv.get(&token, "/warehouses").await;
    assert_eq!(listed[0]["is_active"], false);

    let (status, body) = srv
        .post(&token, "/products", json!({ "name": "Widget", "initial_stock": 5 }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert!(body.get("seeded_warehouse_id").is_none());

    let (_, order) = srv
        .post(&token, "/purchases", json!({ "lines": [{ "product_id": new_id(), "quantity": 1 }] }))
        .await;
    let (status, body) = srv
        .post(
            &token,
            &format!("/purchases/{}/receive", order["id"].as_str().unwrap()),
            json!({ "warehouse_id": main }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");

    let (status, _) = srv
        .post(&token, &format!("/warehouses/{}/deactivate", new_id()), json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn permissions_follow_roles() {
    let srv = TestServer::spawn().await;
    let tenant = TenantId::new();
    let viewer = mint_jwt(tenant, vec![Role::new("viewer")]);
    let sales = mint_jwt(tenant, vec![Role::new("sales")]);
    let (p, w) = (new_id(), new_id());

    let (status, body) = srv.adjust(&viewer, &p, &w, 5).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, _) = srv.adjust(&sales, &p, &w, 5).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Reads need no permission.
    let (status, _) = srv.get(&viewer, &format!("/stock/{p}")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn tenants_do_not_see_each_other() {
    let srv = TestServer::spawn().await;
    let (token1, token2) = (admin(), admin());
    let (p, w) = (new_id(), new_id());
    srv.adjust(&token1, &p, &w, 9).await;

    let (status, _) = srv.get(&token2, &format!("/stock/{p}/{w}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = srv
        .post(
            &token2,
            "/stock/transfer",
            json!({ "product_id": p, "from_warehouse_id": w, "to_warehouse_id": new_id(), "quantity": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "insufficient_stock");
    assert_eq!(srv.quantity(&token1, &p, &w).await, 9);
}
