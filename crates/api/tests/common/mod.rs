#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use examdesk_core::config::ImportConfig;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use examdesk_api::config::{ServerConfig, UserStoreKind};
use examdesk_api::credentials::CredentialOutbox;
use examdesk_api::router::build_app_router;
use examdesk_api::state::AppState;
use examdesk_api::user_store::InMemoryUserStore;

pub const EXISTING_EMAIL: &str = "existing@example.com";

const BOUNDARY: &str = "examdesk-test-boundary";

/// Build a test `ServerConfig`: memory store, no per-row delay.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        import: ImportConfig {
            row_delay: Duration::ZERO,
            ..ImportConfig::default()
        },
        user_store: UserStoreKind::Memory,
        seed_existing_emails: vec![EXISTING_EMAIL.to_string()],
    }
}

/// A memory store holding [`EXISTING_EMAIL`].
pub fn test_store() -> Arc<InMemoryUserStore> {
    Arc::new(InMemoryUserStore::with_existing([EXISTING_EMAIL]))
}

/// Build the full application router with the production middleware stack.
pub fn build_test_app(store: Arc<InMemoryUserStore>) -> Router {
    build_test_app_with(test_config(), store)
}

pub fn build_test_app_with(config: ServerConfig, store: Arc<InMemoryUserStore>) -> Router {
    build_test_app_full(config, store, Arc::new(CredentialOutbox::new()))
}

/// Like [`build_test_app_with`], delivering temporary passwords to `outbox`.
pub fn build_test_app_full(
    config: ServerConfig,
    store: Arc<InMemoryUserStore>,
    outbox: Arc<CredentialOutbox>,
) -> Router {
    build_app_router(AppState::new(config, store, outbox))
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

/// Send a request without a body (POST / DELETE actions).
pub async fn call(app: &Router, method: Method, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn send_json(app: &Router, method: Method, uri: &str, body: Value) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

/// POST a single multipart field.
pub async fn upload_field(
    app: &Router,
    uri: &str,
    field: &str,
    file_name: &str,
    content_type: &str,
    bytes: &[u8],
) -> Response<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
         Content-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let request = Request::post(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    send(app, request).await
}

/// Upload CSV text as `users.csv`.
pub async fn upload_csv(app: &Router, session: &str, csv: &str) -> Response<Body> {
    upload_field(
        app,
        &session_uri(session, "upload"),
        "file",
        "users.csv",
        "text/csv",
        csv.as_bytes(),
    )
    .await
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn session_uri(session: &str, action: &str) -> String {
    if action.is_empty() {
        format!("/api/v1/admin/user-imports/sessions/{session}")
    } else {
        format!("/api/v1/admin/user-imports/sessions/{session}/{action}")
    }
}

/// Open a session and return its id.
pub async fn create_session(app: &Router) -> String {
    let response = call(app, Method::POST, "/api/v1/admin/user-imports/sessions").await;
    let json = body_json(response).await;
    json["data"]["session_id"].as_str().unwrap().to_string()
}

/// Poll the session until it reaches `complete`; returns the final snapshot.
pub async fn wait_for_completion(app: &Router, session: &str) -> Value {
    for _ in 0..500 {
        let json = body_json(get(app, &session_uri(session, "")).await).await;
        if json["data"]["step"] == "complete" {
            return json["data"].clone();
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("import in session {session} did not complete");
}
