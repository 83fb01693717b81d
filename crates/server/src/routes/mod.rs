// crates/server/src/routes/mod.rs
//! API route handlers.

pub mod health;
pub mod jobs;
pub mod token;
pub mod tools;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Assemble all API routes under `/api` with shared state.
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(health::router())
                .merge(token::router())
                .merge(tools::router())
                .merge(jobs::router()),
        )
        .with_state(state)
}
