#![allow(dead_code)]

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use jobtrail_api::auth::password::hash_password;
use jobtrail_api::auth::tokens::JwtConfig;
use jobtrail_api::config::{RetrySettings, ServerConfig};
use jobtrail_api::router::build_app_router;
use jobtrail_api::state::AppState;
use jobtrail_core::environment::AppEnvironment;
use jobtrail_core::types::DbId;
use jobtrail_db::memory::MemoryExecutor;
use jobtrail_db::models::identity::Identity;
use jobtrail_db::DataStore;
use jobtrail_storage::memory::MemoryObjectStore;
use jobtrail_storage::BlobStore;

pub const PASSWORD: &str = "correct-horse-battery-staple";
pub const ADMIN_ID: DbId = 1;
pub const MEMBER_ID: DbId = 2;

/// A router over in-memory stores, plus handles to those stores.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub executor: Arc<MemoryExecutor>,
    pub objects: Arc<MemoryObjectStore>,
}

/// Test `ServerConfig`: test environment, fast retries, fixed secret.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        environment: AppEnvironment::Test,
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        jwt: JwtConfig::with_secret("integration-test-secret-long-enough"),
        retry: RetrySettings {
            max_attempts: 3,
            delay: Duration::from_millis(1),
        },
    }
}

/// Argon2 hash of [`PASSWORD`], computed once per test binary.
pub fn password_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password(PASSWORD).unwrap())
}

/// Build the full application router over seeded in-memory stores.
///
/// Users: `admin` (id 1, admin) and `member` (id 2), both with [`PASSWORD`].
pub fn build_test_app() -> TestApp {
    let config = test_config();
    let policy = config.retry.policy().unwrap();

    let executor = Arc::new(MemoryExecutor::new());
    for (id, username, is_admin) in [(ADMIN_ID, "admin", true), (MEMBER_ID, "member", false)] {
        executor.insert_identity(Identity {
            id,
            username: username.to_string(),
            password_hash: password_hash().to_string(),
            is_admin,
        });
    }
    let objects = Arc::new(MemoryObjectStore::new());

    let db = DataStore::new(executor.clone(), policy.clone());
    let blobs = BlobStore::new(objects.clone(), policy, config.environment);
    let state = AppState::new(db, blobs, config.clone());
    let router = build_app_router(state.clone(), &config);

    TestApp {
        router,
        state,
        executor,
        objects,
    }
}

pub async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response {
    let request = Request::builder()
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
