// Library crate for the deferq work queue
// Stores, the worker loop and the optional read-only admin router

pub mod clock;
pub mod config;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod queue;
pub mod services;
pub mod state;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::handlers::{get_queue_stats, list_failures, list_jobs};
use crate::state::AppState;

/// Build the admin router with the given state
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "Hello, deferq!" }))
        // Queue inspection routes (read-only)
        .route("/api/queue/stats", get(get_queue_stats))
        .route("/api/queue/jobs", get(list_jobs))
        .route("/api/queue/failures", get(list_failures))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
