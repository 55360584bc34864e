use std::sync::Arc;

use axum::{middleware, Router};
use tower_http::services::ServeDir;

use appointment_cell::router::{appointment_routes, doctor_schedule_routes};
use auth_cell::router::auth_routes;
use clinic_cell::router::admin_routes;
use finance_cell::router::{boss_finance_routes, doctor_catalog_routes};
use monitoring_cell::{monitoring_routes, track_metrics, MetricsCollectorService};
use patient_cell::router::patient_routes;
use shared_utils::request_id::request_context;
use shared_utils::AppState;
use staff_cell::router::{boss_staff_routes, doctor_directory_routes};
use visit_cell::router::doctor_visit_routes;

pub fn create_router(state: Arc<AppState>, metrics: Arc<MetricsCollectorService>) -> Router {
    let api = Router::new()
        .nest("/auth", auth_routes(state.clone()))
        .nest("/admin", admin_routes(state.clone()))
        .nest(
            "/boss",
            boss_staff_routes(state.clone()).merge(boss_finance_routes(state.clone())),
        )
        .nest("/patients", patient_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/doctors", doctor_directory_routes(state.clone()))
        .nest(
            "/doctor",
            doctor_schedule_routes(state.clone())
                .merge(doctor_visit_routes(state.clone()))
                .merge(doctor_catalog_routes(state.clone())),
        );

    Router::new()
        .nest("/api/v1", api)
        .nest_service("/uploads", ServeDir::new(&state.config.upload_dir))
        .merge(monitoring_routes(state, metrics.clone()))
        .layer(middleware::from_fn_with_state(metrics, track_metrics))
        .layer(middleware::from_fn(request_context))
}
