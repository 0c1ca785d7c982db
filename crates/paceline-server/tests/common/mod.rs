#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use paceline_core::RegressionPolicy;
use paceline_server::store::FileStore;
use paceline_server::{app, AppState};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// Build a router over a file store in a fresh temp directory.
/// Returns the TempDir so callers keep it alive for the test's duration.
pub fn test_app(policy: RegressionPolicy) -> (Router, Arc<FileStore>, TempDir) {
    let tmp = TempDir::new().expect("tempdir");
    let store = Arc::new(FileStore::new(tmp.path()));
    let state = AppState::new(store.clone(), policy);
    (app(state), store, tmp)
}

/// A minimal well-formed submission body. `n` seeds the commit hash.
pub fn submission(n: usize, bench: &str, value: f64, unit: &str) -> serde_json::Value {
    serde_json::json!({
        "commit": {
            "id": format!("{n:040x}"),
            "author": { "name": "Ada" },
            "committer": { "name": "CI Bot", "email": "ci@acme.dev" },
            "timestamp": "2026-01-05T10:00:00Z",
            "url": format!("https://github.com/acme/chain/commit/{n:040x}"),
        },
        "tool": "cargo",
        "benches": [
            { "name": bench, "value": value, "unit": unit }
        ]
    })
}

pub async fn post_json(
    app: &Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();
    send(app, request).await
}

pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.expect("infallible");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}
