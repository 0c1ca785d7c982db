//! Paceline Server
//!
//! Benchmark-history service built with Axum: CI jobs POST runs, the
//! coordinator appends them to versioned per-repository history documents,
//! and chart tooling reads series back out.

pub mod coordinator;
pub mod events;
pub mod handlers;
pub mod ingest;
pub mod store;

use axum::{
    routing::{get, post},
    Json, Router,
};
use paceline_core::RegressionPolicy;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use events::EventManager;
use ingest::IngestService;
use store::HistoryStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn HistoryStore>,
    pub ingest: Arc<IngestService>,
    pub events: Arc<EventManager>,
}

impl AppState {
    pub fn new(store: Arc<dyn HistoryStore>, policy: RegressionPolicy) -> Self {
        let events = Arc::new(EventManager::new());
        let ingest = Arc::new(IngestService::new(
            Arc::clone(&store),
            Arc::clone(&events),
            policy,
        ));
        Self {
            store,
            ingest,
            events,
        }
    }
}

/// Assemble the full router. Kept out of `main` so integration tests can
/// drive the service in-process.
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .route("/events/{repo_id}", get(events::events_handler))
        .route("/health", get(health_check))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/repos/{repo_id}/suites",
            get(handlers::suites::list_suites),
        )
        .route(
            "/repos/{repo_id}/suites/{suite}/runs",
            post(handlers::runs::submit_run),
        )
        .route(
            "/repos/{repo_id}/suites/{suite}/series",
            get(handlers::series::get_series),
        )
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}
