use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use shared_utils::extractor::{auth_middleware, boss_only, doctor_only, tenant_isolation};
use shared_utils::AppState;

use crate::handlers;

/// Mounted under `/boss` next to the staff routes.
pub fn boss_finance_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/services", post(handlers::create_service).get(handlers::list_services))
        .route("/services/import", post(handlers::import_services))
        .route(
            "/services/{id}",
            get(handlers::get_service)
                .put(handlers::update_service)
                .delete(handlers::delete_service),
        )
        .route("/expenses", post(handlers::create_expense).get(handlers::list_expenses))
        .route("/expenses/{id}", delete(handlers::delete_expense))
        .route("/reports/daily", get(handlers::daily_report))
        .route("/reports/monthly", get(handlers::monthly_report))
        .route("/audit-logs", get(handlers::list_audit_logs))
        .layer(middleware::from_fn(boss_only))
        .layer(middleware::from_fn(tenant_isolation))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

/// Mounted under `/doctor`.
pub fn doctor_catalog_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/services", get(handlers::list_active_services))
        .layer(middleware::from_fn(doctor_only))
        .layer(middleware::from_fn(tenant_isolation))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
