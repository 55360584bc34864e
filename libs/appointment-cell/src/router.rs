use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_utils::extractor::{auth_middleware, boss_or_receptionist, doctor_only, tenant_isolation};
use shared_utils::AppState;

use crate::handlers;

/// Mounted under `/appointments`.
pub fn appointment_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(handlers::create_appointment).get(handlers::list_appointments))
        .route("/{id}", get(handlers::get_appointment))
        .route("/{id}/reschedule", put(handlers::reschedule_appointment))
        .route("/{id}/cancel", put(handlers::cancel_appointment))
        .layer(middleware::from_fn(boss_or_receptionist))
        .layer(middleware::from_fn(tenant_isolation))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

/// Doctor-facing routes, merged into `/doctor`.
pub fn doctor_schedule_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/schedule", get(handlers::get_schedule))
        .route("/appointments/{id}/status", put(handlers::update_own_status))
        .layer(middleware::from_fn(doctor_only))
        .layer(middleware::from_fn(tenant_isolation))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
