use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_utils::extractor::{auth_middleware, doctor_only, tenant_isolation};
use shared_utils::AppState;

use crate::handlers;
use crate::services::upload::MAX_IMAGE_BYTES;

/// Multipart framing on top of the image itself.
const UPLOAD_BODY_LIMIT: usize = MAX_IMAGE_BYTES + 64 * 1024;

/// Mounted under `/doctor`.
pub fn doctor_visit_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/visits", post(handlers::start_visit).get(handlers::list_visits))
        .route("/visits/{id}", get(handlers::get_visit))
        .route("/visits/{id}/draft", put(handlers::save_draft))
        .route("/visits/{id}/complete", put(handlers::complete_visit))
        .route("/treatment-plans", post(handlers::create_plan).get(handlers::list_plans))
        .route(
            "/treatment-plans/{id}",
            get(handlers::get_plan).delete(handlers::delete_plan),
        )
        .route("/treatment-plans/{id}/steps/{step}", put(handlers::update_plan_step))
        .route(
            "/uploads/image",
            post(handlers::upload_image)
                .delete(handlers::delete_image)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .layer(middleware::from_fn(doctor_only))
        .layer(middleware::from_fn(tenant_isolation))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
