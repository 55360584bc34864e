use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::{auth_middleware, superadmin_only};
use shared_utils::AppState;

use crate::handlers;

pub fn admin_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/clinics", post(handlers::create_clinic).get(handlers::list_clinics))
        .route(
            "/clinics/{id}",
            get(handlers::get_clinic)
                .put(handlers::update_clinic)
                .delete(handlers::delete_clinic),
        )
        .route("/clinics/{id}/invite", post(handlers::invite_boss))
        .layer(middleware::from_fn(superadmin_only))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
