//! Black-box tests against the real router on an ephemeral port.
//!
//! The non-ignored tests only exercise paths that reject before touching
//! the database (health, webhook signature checks, shared-secret auth), so
//! they run with a lazily-connected pool and no live Postgres. The full
//! checkout flow needs `DATABASE_URL` and is `#[ignore]`d.

use hmac::{Hmac, Mac};
use reqwest::StatusCode;
use serde_json::json;
use sha2::Sha256;
use sqlx::postgres::PgPoolOptions;

use storefront_api::config::Config;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(database_url: &str) -> Self {
        let config = Config {
            database_url: database_url.to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            stripe_webhook_secret: "whsec_test123secret456".to_string(),
            outbox_shared_secret: "outbox-secret".to_string(),
            admin_shared_secret: "admin-secret".to_string(),
            klarna_base_url: "http://127.0.0.1:1".to_string(),
            klarna_username: "user".to_string(),
            klarna_password: "pass".to_string(),
            vies_base_url: "http://127.0.0.1:1".to_string(),
            validate_vat_ids: false,
            home_country: "SE".parse().unwrap(),
            home_vat_rate: "0.25".parse().unwrap(),
            shipping_tiers: json!([
                {"max_grams": 1000, "amount": 4900, "code": "S"},
                {"max_grams": 5000, "amount": 9900, "code": "M"}
            ])
            .to_string(),
        };

        let pool = PgPoolOptions::new()
            .connect_lazy(database_url)
            .expect("pool options must parse");
        let app = storefront_api::app::build_app(config, pool).expect("router must build");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{addr}");

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn sign_stripe(body: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key size");
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

#[tokio::test]
async fn health_is_open() {
    let server = TestServer::spawn("postgres://unused@127.0.0.1:1/x").await;
    let response = reqwest::get(format!("{}/health", server.base_url))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn webhook_without_signature_is_rejected() {
    let server = TestServer::spawn("postgres://unused@127.0.0.1:1/x").await;
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/webhooks/stripe", server.base_url))
        .body(r#"{"id":"evt_1","type":"payment_intent.succeeded"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn webhook_with_wrong_secret_is_rejected() {
    let server = TestServer::spawn("postgres://unused@127.0.0.1:1/x").await;
    let body = r#"{"id":"evt_1","type":"payment_intent.succeeded"}"#;
    let ts = chrono::Utc::now().timestamp();
    let signature = sign_stripe(body.as_bytes(), "some-other-secret", ts);

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/webhooks/stripe", server.base_url))
        .header("stripe-signature", format!("t={ts},v1={signature}"))
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn webhook_with_stale_timestamp_is_rejected() {
    let server = TestServer::spawn("postgres://unused@127.0.0.1:1/x").await;
    let body = r#"{"id":"evt_1","type":"payment_intent.succeeded"}"#;
    let ts = chrono::Utc::now().timestamp() - 600;
    let signature = sign_stripe(body.as_bytes(), "whsec_test123secret456", ts);

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/webhooks/stripe", server.base_url))
        .header("stripe-signature", format!("t={ts},v1={signature}"))
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn outbox_requires_shared_secret() {
    let server = TestServer::spawn("postgres://unused@127.0.0.1:1/x").await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/outbox/pull?limit=5", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = client
        .get(format!("{}/outbox/pull?limit=5", server.base_url))
        .header("x-shared-secret", "wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_requires_shared_secret() {
    let server = TestServer::spawn("postgres://unused@127.0.0.1:1/x").await;
    let client = reqwest::Client::new();
    let response = client
        .post(format!(
            "{}/admin/orders/01890a5d-ac96-774b-bcce-b302099a8057/mark-paid",
            server.base_url
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// End-to-end checkout against a live database; run with
/// `DATABASE_URL=... cargo test -- --ignored`.
#[tokio::test]
#[ignore]
async fn checkout_places_pending_order() {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new().connect(&database_url).await.unwrap();
    storefront_infra::ensure_schema(&pool).await.unwrap();
    let server = TestServer::spawn(&database_url).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/orders", server.base_url))
        .json(&json!({
            "order_number": format!("T-{}", uuid::Uuid::now_v7()),
            "currency": "SEK",
            "customer_country": "SE",
            "lines": [
                {"product_ref": "SKU-1", "quantity": 2, "unit_price_ex_vat": 19900}
            ],
            "delivery_method": "ship",
            "weight_grams": 800
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "pending_payment");
    assert_eq!(body["tax_mode"], "domestic");
    // 2 x 19900 = 39800; 25% VAT 9950; shipping 4900 + 1225 VAT.
    assert_eq!(body["totals"]["subtotal_ex_vat"], 39800);
    assert_eq!(body["totals"]["vat_total"], 9950);
    assert_eq!(body["totals"]["shipping_ex_vat"], 4900);
    assert_eq!(body["totals"]["shipping_vat"], 1225);
    assert_eq!(body["totals"]["total_inc_vat"], 55875);
    assert_eq!(body["access_token"].as_str().unwrap().len(), 64);
}
