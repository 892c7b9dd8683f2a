pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::dna::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Decision DNA sessions
        .route("/api/v1/dna/sessions", post(handlers::handle_start_session))
        .route("/api/v1/dna/sessions/:id", get(handlers::handle_get_session))
        .route(
            "/api/v1/dna/sessions/:id/choices",
            post(handlers::handle_submit_choice),
        )
        .route(
            "/api/v1/dna/sessions/:id/resume",
            post(handlers::handle_resume_session),
        )
        .route(
            "/api/v1/dna/sessions/:id/persist",
            post(handlers::handle_persist_session),
        )
        // Stand-alone scoring
        .route(
            "/api/v1/dna/compatibility",
            post(handlers::handle_compatibility),
        )
        .with_state(state)
}
