#![allow(dead_code)]

pub use axum::Router;
pub use axum::body::Body;
pub use axum::http::{Request, StatusCode};
pub use rusqlite::Connection;
pub use serde_json::{Value, json};
pub use tower::ServiceExt;

use std::sync::Arc;

use tempfile::TempDir;

pub use appmart::config::PaymentConfig;
pub use appmart::db::{AppState, create_pool, init_db, queries};
pub use appmart::email::EmailService;
pub use appmart::handlers;
pub use appmart::jwt::SessionKeys;
pub use appmart::models::*;
pub use appmart::payments::{PaymentGateway, PaymentProvider};

use appmart::crypto::hash_password;

pub const TEST_PASSWORD: &str = "correct-horse";
pub const TEST_MAX_BODY: usize = 10 * 1024 * 1024;
pub const TEST_AD_CENTS: i64 = 10;
pub const TEST_TOKEN_TTL_SECS: i64 = 3600;
pub const PAGBANK_TEST_TOKEN: &str = "pagbank-test-token";

/// Test state plus the temp directory holding its database file and uploads.
/// The directory is removed when this is dropped.
pub struct TestApp {
    pub state: AppState,
    _dir: TempDir,
}

impl TestApp {
    pub fn router(&self) -> Router {
        handlers::router(self.state.clone(), TEST_MAX_BODY)
    }

    pub fn conn(&self) -> r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager> {
        self.state.db.get().unwrap()
    }
}

/// PagBank with no token; every checkout is refused with 503.
pub fn create_test_app_state() -> TestApp {
    create_test_app_state_with(PaymentConfig::unconfigured(PaymentProvider::PagBank))
}

/// A file-backed database in a temp dir so every pooled connection sees the same data.
pub fn create_test_app_state_with(payments: PaymentConfig) -> TestApp {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("test.db");
    let pool = create_pool(db_path.to_str().unwrap()).unwrap();
    {
        let conn = pool.get().unwrap();
        init_db(&conn).unwrap();
    }

    let upload_dir = dir.path().join("uploads");
    std::fs::create_dir_all(&upload_dir).unwrap();

    let state = AppState {
        db: pool,
        site_url: "http://localhost:3000".to_string(),
        session_keys: SessionKeys::new("test-secret"),
        payments: Arc::new(PaymentGateway::from_config(&payments).unwrap()),
        email_service: Arc::new(EmailService::disabled()),
        upload_dir,
        free_download_ad_cents: TEST_AD_CENTS,
        download_token_ttl_secs: TEST_TOKEN_TTL_SECS,
    };

    TestApp { state, _dir: dir }
}

pub fn pagbank_config(base_url: &str) -> PaymentConfig {
    let mut config = PaymentConfig::unconfigured(PaymentProvider::PagBank);
    config.pagbank_token = Some(PAGBANK_TEST_TOKEN.to_string());
    config.pagbank_base_url = base_url.to_string();
    config.timeout_secs = 5;
    config
}

pub fn sumup_config(base_url: &str) -> PaymentConfig {
    let mut config = PaymentConfig::unconfigured(PaymentProvider::SumUp);
    config.sumup_api_key = Some("sup_sk_test".to_string());
    config.sumup_merchant_code = Some("MTEST01".to_string());
    config.sumup_base_url = base_url.to_string();
    config.timeout_secs = 5;
    config
}

// ============ Fixtures ============

pub fn create_test_user(conn: &Connection, name: &str, email: &str) -> User {
    let input = CreateUser {
        name: name.to_string(),
        email: email.to_string(),
        password: TEST_PASSWORD.to_string(),
    };
    let hash = hash_password(TEST_PASSWORD).expect("Failed to hash password");
    queries::create_user(conn, &input, &hash, UserRole::User).expect("Failed to create test user")
}

pub fn create_test_admin(conn: &Connection, email: &str) -> User {
    let input = CreateUser {
        name: "Admin".to_string(),
        email: email.to_string(),
        password: TEST_PASSWORD.to_string(),
    };
    let hash = hash_password(TEST_PASSWORD).expect("Failed to hash password");
    queries::create_user(conn, &input, &hash, UserRole::Admin).expect("Failed to create test admin")
}

/// Create an app owned by `owner_email`, approved unless stated otherwise.
pub fn create_test_app(
    conn: &Connection,
    owner_email: &str,
    title: &str,
    price_cents: i64,
    approved: bool,
) -> App {
    let filename = format!("{}.apk", uuid::Uuid::new_v4().simple());
    let input = CreateApp {
        title: title.to_string(),
        description: format!("{} description", title),
        price_cents,
        platform: "android".to_string(),
        filename,
        original_name: format!("{}.apk", title),
        size: 4,
        owner_email: owner_email.to_string(),
        screenshots: vec!["s1.png".into(), "s2.png".into(), "s3.png".into()],
        icon: None,
    };
    let app = queries::create_app(conn, &input).expect("Failed to create test app");
    if approved {
        queries::approve_app(conn, &app.id).expect("Failed to approve test app");
    }
    queries::get_app_by_id(conn, &app.id).unwrap().unwrap()
}

/// Put the app's file in the upload directory so downloads can serve it.
pub fn write_upload(state: &AppState, filename: &str, contents: &[u8]) {
    std::fs::write(state.upload_dir.join(filename), contents).unwrap();
}

pub fn create_test_checkout(conn: &Connection, id: &str, app: &App, buyer: &User) -> Checkout {
    queries::create_checkout(
        conn,
        &CreateCheckout {
            id: id.to_string(),
            app_id: app.id.clone(),
            user_id: buyer.id.clone(),
            amount_cents: app.price_cents,
            provider: "pagbank".to_string(),
        },
    )
    .expect("Failed to create test checkout")
}

// ============ Requests ============

pub fn bearer(state: &AppState, user: &User) -> String {
    format!("Bearer {}", state.session_keys.issue(user).unwrap())
}

/// Build a request with an optional bearer token and JSON body.
pub fn json_request(method: &str, uri: &str, auth: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
