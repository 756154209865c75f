use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{codecs, handlers, jobs, metadata, middleware};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Encoder capabilities
        .route("/codecs", get(codecs::get_codecs))
        .route("/codecs/refresh", post(codecs::refresh_codecs))
        // Probing
        .route("/metadata", post(metadata::get_metadata))
        // Jobs
        .route("/jobs", get(jobs::list_jobs).post(jobs::create_job))
        .route("/jobs/{id}", get(jobs::get_job).delete(jobs::cancel_job));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(from_fn(middleware::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
