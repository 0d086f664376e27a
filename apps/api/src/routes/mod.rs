pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::compatibility::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/v1/compatibility/analyze",
            post(handlers::handle_analyze),
        )
        .with_state(state)
}
