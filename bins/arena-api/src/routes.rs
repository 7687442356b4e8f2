use crate::handlers;
use crate::AppState;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/problems/:id/run", post(handlers::run_code))
        .route("/problems/:id/submit", post(handlers::submit_code))
        .route("/submissions/:id", get(handlers::get_submission))
        .route("/users/:id/stats", get(handlers::get_user_stats))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
}
