pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::state::AppState;
use crate::triage::handlers;

pub fn build_router(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    Router::new()
        .route("/health", get(health::health_handler))
        // Triage API
        .route("/api/v1/analyze", post(handlers::handle_analyze))
        .route(
            "/api/v1/analyze/upload",
            post(handlers::handle_analyze_upload),
        )
        .layer(body_limit)
        .with_state(state)
}
