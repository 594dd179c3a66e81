pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::evaluation::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Triggers
        .route("/api/v1/roles/:role/evaluate", post(handlers::handle_evaluate))
        .route(
            "/api/v1/roles/:role/reevaluate",
            post(handlers::handle_reevaluate),
        )
        // Reads
        .route("/api/v1/roles/:role/ranking", get(handlers::handle_ranking))
        .route(
            "/api/v1/roles/:role/candidates/:candidate_id/scoring",
            get(handlers::handle_candidate_scoring),
        )
        .with_state(state)
}
