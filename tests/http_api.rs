//! End-to-end tests against the real router on an ephemeral port.
//!
//! Run with: cargo test --test http_api

use std::sync::Arc;

use pos_lv2::AppState;
use pos_lv2::config::{DbLocation, Settings};
use pos_lv2::pos_db::PosDb;
use pos_lv2::server::build_router;
use serde_json::{Value, json};

struct TestServer {
    base_url: String,
    db: Arc<PosDb>,
    client: reqwest::Client,
}

impl TestServer {
    async fn start() -> Self {
        Self::with_db(Arc::new(PosDb::open_in_memory().expect("open in-memory db"))).await
    }

    async fn with_db(db: Arc<PosDb>) -> Self {
        let state = AppState {
            db: db.clone(),
            settings: Arc::new(Settings::default()),
        };
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, build_router(state))
                .await
                .expect("server error");
        });
        Self {
            base_url: format!("http://{addr}"),
            db,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.expect("GET")
    }

    async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .expect("POST")
    }
}

#[tokio::test]
async fn health_returns_exact_body() {
    let server = TestServer::start().await;
    let resp = server.get("/api/health").await;
    assert_eq!(resp.status(), 200);
    assert!(resp.headers().contains_key("x-request-id"));
    assert_eq!(resp.text().await.unwrap(), r#"{"status":"ok"}"#);
}

#[tokio::test]
async fn health_stays_ok_when_schema_check_fails() {
    let dir = tempfile::tempdir().unwrap();
    let location = DbLocation::File(dir.path().join("pos.db"));
    let db = Arc::new(PosDb::open(&location).unwrap());

    // An index squatting on a table name makes CREATE TABLE IF NOT EXISTS fail.
    rusqlite::Connection::open(dir.path().join("pos.db"))
        .unwrap()
        .execute_batch("DROP TABLE trade_details; DROP TABLE trades; CREATE INDEX trades ON products(NAME);")
        .unwrap();
    assert!(db.ensure_schema().is_err());

    let server = TestServer::with_db(db).await;
    let resp = server.get("/api/health").await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), r#"{"status":"ok"}"#);
}

#[tokio::test]
async fn index_and_api_info() {
    let server = TestServer::start().await;
    let body: Value = server.get("/").await.json().await.unwrap();
    assert_eq!(body["message"], "Backend is running.");
    assert_eq!(body["api_health"], "/api/health");
    assert_eq!(body["name"], "POS Lv2 API");

    let body: Value = server.get("/api").await.json().await.unwrap();
    assert_eq!(body, json!({"name": "POS Lv2 API", "version": env!("CARGO_PKG_VERSION")}));

    let body: Value = server.get("/api/purchase/ping").await.json().await.unwrap();
    assert_eq!(body, json!({"ok": true}));
}

#[tokio::test]
async fn product_lookup_after_seed() {
    let server = TestServer::start().await;

    let body: Value = server.get("/api/products").await.json().await.unwrap();
    assert_eq!(body, json!({"items": []}));

    let body: Value = server
        .post("/api/products/dev-seed", json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"count": 2}));

    let body: Value = server
        .get("/api/products?code=4901234567894")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["items"][0]["name"], "サンプルA");
    assert_eq!(body["items"][0]["price"], 150);
    assert!(body["items"][0]["prdId"].is_i64());

    let body: Value = server.get("/api/products?code=0000").await.json().await.unwrap();
    assert_eq!(body, json!({"items": []}));
}

#[tokio::test]
async fn bulk_upsert_then_upc_lookup() {
    let server = TestServer::start().await;
    let resp = server
        .post(
            "/api/products/bulk",
            json!({"items": [
                {"code": "0012345678905", "name": "Cola", "price": 120},
                {"code": "", "name": "skipped"},
                {"code": 4900000000001u64, "price": "300"}
            ]}),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"inserted": 2, "updated": 0, "count": 2}));

    let body: Value = server
        .get("/api/products?code=012345678905")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["items"][0]["code"], "0012345678905");

    let resp = server
        .post("/api/products/bulk", json!({"items": [{"code": "X", "price": -1}]}))
        .await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("price"));
}

#[tokio::test]
async fn purchase_persists_trade_with_tax() {
    let server = TestServer::start().await;
    server.post("/api/products/dev-seed", json!({})).await;

    let resp = server
        .post(
            "/api/purchase",
            json!({
                "cashier_code": "",
                "items": [
                    {"product_code": "4901234567894", "quantity": 2},
                    {"product_code": "4900000000001", "quantity": 1, "unit_price": 280},
                    {"product_code": "UNKNOWN", "quantity": 1}
                ]
            }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "accepted");
    assert_eq!(body["success"], true);
    assert_eq!(body["subtotal"], 580);
    assert_eq!(body["total"], 638);

    let id = body["id"].as_i64().unwrap();
    let trade = server.db.get_trade(id).unwrap().unwrap();
    assert_eq!(trade.emp_cd.as_deref(), Some("9999999999"));
    assert_eq!(trade.store_cd.as_deref(), Some("30"));
    assert_eq!(trade.pos_no.as_deref(), Some("90"));
    assert_eq!(trade.details.len(), 3);
    assert_eq!(trade.details[2].line_no, 3);
    assert_eq!(trade.details[2].prd_id, None);
    assert_eq!(trade.details[2].prd_name, "UNKNOWN");
}

#[tokio::test]
async fn purchase_accepts_numeric_product_code() {
    let server = TestServer::start().await;
    server.post("/api/products/dev-seed", json!({})).await;

    let resp = server
        .post(
            "/api/purchase",
            json!({"items": [{"product_code": 4901234567894u64, "quantity": 1}]}),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["subtotal"], 150);

    let trade = server.db.get_trade(body["id"].as_i64().unwrap()).unwrap().unwrap();
    assert_eq!(trade.details[0].prd_code, "4901234567894");
    assert_eq!(trade.details[0].prd_name, "サンプルA");
}

#[tokio::test]
async fn empty_purchase_is_not_persisted() {
    let server = TestServer::start().await;
    let body: Value = server
        .post("/api/purchase", json!({"items": []}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(
        body,
        json!({"id": 0, "status": "empty", "success": false, "subtotal": 0, "total": 0})
    );
    assert!(server.db.get_trade(1).unwrap().is_none());
}

#[tokio::test]
async fn invalid_purchase_is_rejected() {
    let server = TestServer::start().await;
    let resp = server
        .post(
            "/api/purchase",
            json!({"items": [{"product_code": "4901234567894", "quantity": 0}]}),
        )
        .await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("quantity"));

    let resp = server
        .client
        .post(server.url("/api/purchase"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn cors_preflight_allows_configured_origin() {
    let server = TestServer::start().await;
    let resp = server
        .client
        .request(reqwest::Method::OPTIONS, server.url("/api/purchase"))
        .header("origin", "http://localhost:3000")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type")
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let headers = resp.headers();
    assert_eq!(headers["access-control-allow-origin"], "http://localhost:3000");
    assert_eq!(headers["access-control-allow-credentials"], "true");

    let resp = server
        .client
        .get(server.url("/api/health"))
        .header("origin", "http://evil.example")
        .send()
        .await
        .unwrap();
    assert!(!resp.headers().contains_key("access-control-allow-origin"));
}
