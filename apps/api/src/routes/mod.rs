pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::notes::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/rpc", post(handlers::handle_rpc))
        .with_state(state)
}
