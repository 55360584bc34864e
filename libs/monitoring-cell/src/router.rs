use std::sync::Arc;

use axum::{routing::get, Router};

use shared_utils::AppState;

use crate::handlers::{self, MonitoringState};
use crate::services::MetricsCollectorService;

/// Unauthenticated probes, mounted at the root rather than under `/api/v1`.
pub fn monitoring_routes(state: Arc<AppState>, metrics: Arc<MetricsCollectorService>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .route("/metrics", get(handlers::metrics))
        .with_state(MonitoringState { app: state, metrics })
}
