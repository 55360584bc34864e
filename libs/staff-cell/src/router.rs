use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use shared_utils::extractor::{auth_middleware, boss_only, clinic_staff, tenant_isolation};
use shared_utils::AppState;

use crate::handlers;

/// Mounted under `/boss`.
pub fn boss_staff_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/users", post(handlers::create_user).get(handlers::list_users))
        .route("/users/{id}", delete(handlers::deactivate_user))
        .route("/doctors", get(handlers::list_doctors))
        .route("/contracts", post(handlers::create_contract).get(handlers::list_contracts))
        .route(
            "/contracts/{id}",
            get(handlers::get_contract)
                .put(handlers::update_contract)
                .delete(handlers::delete_contract),
        )
        .route("/salaries", post(handlers::create_salary).get(handlers::list_salaries))
        .route(
            "/salaries/{id}",
            get(handlers::get_salary)
                .put(handlers::update_salary)
                .delete(handlers::delete_salary),
        )
        .layer(middleware::from_fn(boss_only))
        .layer(middleware::from_fn(tenant_isolation))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

/// Mounted under `/doctors`, readable by every clinic role.
pub fn doctor_directory_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::list_doctors))
        .layer(middleware::from_fn(clinic_staff))
        .layer(middleware::from_fn(tenant_isolation))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
