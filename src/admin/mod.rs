//! Admin HTTP surface (C6, spec §6): status, recent runs, trigger, posting
//! search, career-page listing. Framing is `axum` + `tower-http`, the way
//! every HTTP-exposing teacher crate wires its router.

pub mod envelope;
pub mod extract;
pub mod handlers;

use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub use handlers::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/admin/health", get(handlers::health))
        .route("/admin/stats", get(handlers::stats))
        .route("/admin/runs", get(handlers::runs))
        .route("/admin/scrape/trigger", post(handlers::trigger))
        .route("/admin/jobs", get(handlers::jobs))
        .route("/admin/jobs/:id", get(handlers::job_detail))
        .route("/admin/career-pages", get(handlers::career_pages))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
