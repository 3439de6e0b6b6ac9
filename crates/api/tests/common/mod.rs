#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use calibra_api::auth::jwt::JwtConfig;
use calibra_api::auth::password::hash_password;
use calibra_api::config::ServerConfig;
use calibra_api::router::build_app_router;
use calibra_api::state::AppState;
use calibra_api::ws::WsManager;
use calibra_db::models::user::{CreateUser, User};
use calibra_db::repositories::{RoleRepo, UserRepo};
use calibra_events::EventBus;

/// Password given to every user created by [`create_user`].
pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin and a fixed JWT secret.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        max_upload_bytes: 5 * 1024 * 1024,
        status_refresh_interval_secs: 3600,
        ws_heartbeat_interval_secs: 30,
        jwt: JwtConfig {
            secret: "integration-test-secret".to_string(),
            access_token_expiry_mins: 15,
            refresh_token_expiry_days: 7,
        },
    }
}

/// Build the application state on `pool` with a fresh event bus.
pub fn test_state(pool: PgPool) -> AppState {
    AppState {
        pool,
        config: Arc::new(test_config()),
        ws_manager: Arc::new(WsManager::new()),
        event_bus: Arc::new(EventBus::default()),
    }
}

/// Build the full application router, with the same middleware stack
/// production uses.
pub fn build_test_app(pool: PgPool) -> Router {
    build_app_router(test_state(pool), &test_config())
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.unwrap()
}

fn request(method: Method, uri: &str, token: Option<&str>) -> axum::http::request::Builder {
    let builder = Request::builder().method(method).uri(uri);
    match token {
        Some(t) => builder.header(AUTHORIZATION, format!("Bearer {t}")),
        None => builder,
    }
}

pub async fn get(app: Router, uri: &str) -> Response {
    send(app, request(Method::GET, uri, None).body(Body::empty()).unwrap()).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response {
    send(
        app,
        request(Method::GET, uri, Some(token))
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    send(
        app,
        request(Method::POST, uri, None)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response {
    send(
        app,
        request(Method::POST, uri, Some(token))
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

pub async fn post_auth(app: Router, uri: &str, token: &str) -> Response {
    send(
        app,
        request(Method::POST, uri, Some(token))
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

pub async fn put_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response {
    send(
        app,
        request(Method::PUT, uri, Some(token))
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response {
    send(
        app,
        request(Method::DELETE, uri, Some(token))
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

const MULTIPART_BOUNDARY: &str = "calibra-test-boundary";

/// POST a multipart form with one `file` part and extra text fields.
pub async fn post_multipart_auth(
    app: Router,
    uri: &str,
    file: &[u8],
    fields: &[(&str, &str)],
    token: &str,
) -> Response {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{MULTIPART_BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; \
             filename=\"gauges.xlsx\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(file);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());

    send(
        app,
        request(Method::POST, uri, Some(token))
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap(),
    )
    .await
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Collect a response body as raw bytes.
pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Insert a user with [`TEST_PASSWORD`] and the given role name.
pub async fn create_user(pool: &PgPool, username: &str, role: &str) -> User {
    let role = RoleRepo::find_by_name(pool, role)
        .await
        .unwrap()
        .expect("seeded role should exist");
    let input = CreateUser {
        username: username.to_string(),
        email: format!("{username}@test.com"),
        password_hash: hash_password(TEST_PASSWORD).unwrap(),
        role_id: role.id,
    };
    UserRepo::create(pool, &input).await.unwrap()
}

/// Log in through the API and return the access token.
pub async fn login_token(app: Router, username: &str) -> String {
    let body = serde_json::json!({ "username": username, "password": TEST_PASSWORD });
    let response = post_json(app, "/api/v1/auth/login", body).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["access_token"]
        .as_str()
        .unwrap()
        .to_string()
}

/// Create a user with `role` and return an access token for it.
pub async fn token_for(pool: &PgPool, username: &str, role: &str) -> String {
    create_user(pool, username, role).await;
    login_token(build_test_app(pool.clone()), username).await
}

/// Today in UTC, the date the pipeline evaluates against.
pub fn today() -> chrono::NaiveDate {
    chrono::Utc::now().date_naive()
}
