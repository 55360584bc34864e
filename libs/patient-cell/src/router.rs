use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::{auth_middleware, boss_or_receptionist, tenant_isolation};
use shared_utils::AppState;

use crate::handlers;

/// Mounted under `/patients`.
pub fn patient_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(handlers::create_patient).get(handlers::list_patients))
        .route("/import", post(handlers::import_patients))
        .route(
            "/{id}",
            get(handlers::get_patient)
                .put(handlers::update_patient)
                .delete(handlers::delete_patient),
        )
        .layer(middleware::from_fn(boss_or_receptionist))
        .layer(middleware::from_fn(tenant_isolation))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
