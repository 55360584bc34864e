use std::sync::Arc;

use axum::{routing::post, Router};

use shared_utils::AppState;

use crate::handlers;

/// Public routes; nothing here requires a bearer token.
pub fn auth_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/login", post(handlers::login))
        .route("/refresh", post(handlers::refresh))
        .route("/accept-invite", post(handlers::accept_invite))
        .with_state(state)
}
