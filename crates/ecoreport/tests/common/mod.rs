//! Test utilities and common setup.

#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use ecoreport::api;
use ecoreport::auth::AuthConfig;
use ecoreport::db::Database;
use serde_json::{Value, json};
use tower::ServiceExt;

pub const PASSWORD: &str = "correct-horse-battery";

/// AuthConfig with fixed secrets and the cheapest bcrypt cost.
pub fn test_auth_config() -> AuthConfig {
    let mut config = AuthConfig::with_secrets(
        "test-access-secret-for-integration-tests-0123456789",
        "test-refresh-secret-for-integration-tests-0123456789",
    );
    config.bcrypt_cost = 4;
    config
}

/// Router over a fresh in-memory database.
pub async fn test_app() -> Router {
    let db = Database::in_memory().await.unwrap();
    let state = api::AppState::new(&db, &test_auth_config()).unwrap();
    api::create_router(state)
}

/// Send one request and decode the JSON body (`Null` when empty).
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().uri(uri).method(method);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Send a raw body with an optional content type and decode the JSON reply.
pub async fn send_raw(
    app: &Router,
    method: Method,
    uri: &str,
    content_type: Option<&str>,
    body: &'static str,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().uri(uri).method(method);
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    let response = app
        .clone()
        .oneshot(builder.body(Body::from(body)).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

pub async fn signup(app: &Router, email: &str, role: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/auth/signup",
        None,
        Some(json!({
            "name": "Test User",
            "email": email,
            "password": PASSWORD,
            "location": "Valparaiso",
            "role": role,
        })),
    )
    .await
}

pub async fn login(app: &Router, email: &str, password: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await
}

/// Sign up and log in; returns `(user_id, access_token, refresh_token)`.
pub async fn register_user(app: &Router, email: &str, role: &str) -> (String, String, String) {
    let (status, _) = signup(app, email, role).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, tokens) = login(app, email, PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    let access = tokens["accessToken"].as_str().unwrap().to_string();
    let refresh = tokens["refreshToken"].as_str().unwrap().to_string();

    let (status, body) = send(app, Method::GET, "/auth/verify", Some(&access), None).await;
    assert_eq!(status, StatusCode::OK);
    let id = body["identity"]["id"].as_str().unwrap().to_string();

    (id, access, refresh)
}
