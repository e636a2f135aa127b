//! Router construction shared by the API integration tests.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use pulse_api::{create_router, AppState, Config};
use pulse_testing::TestEnv;
use serde_json::Value;
use tower::ServiceExt;

pub fn config_for(env: &TestEnv) -> Config {
    Config {
        github_api_url: env.upstream.github_api_url(),
        github_repository: env.repository_slug(),
        deployments_api_url: env.upstream.deployments_url(),
        upstream_timeout_seconds: 5,
        ..Config::default()
    }
}

pub fn app_with(env: &TestEnv, config: &Config) -> Router {
    let state = AppState::from_config(config, env.store_handle()).expect("failed to build state");
    create_router(state)
}

pub fn app(env: &TestEnv) -> Router {
    app_with(env, &config_for(env))
}

pub fn webhook_request(event: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/github-webhook")
        .header("content-type", "application/json")
        .header("x-github-event", event)
        .header("x-github-delivery", "72d3162e-cc78-11e3-81ab-4c9367dc0958")
        .body(body.into())
        .unwrap()
}

pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("failed to make request");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}
