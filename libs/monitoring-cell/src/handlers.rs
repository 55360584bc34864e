use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use shared_utils::AppState;

use crate::models::{HealthStatus, LivenessReport, ReadinessReport};
use crate::services::{HealthMonitorService, MetricsCollectorService};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Clone)]
pub struct MonitoringState {
    pub app: Arc<AppState>,
    pub metrics: Arc<MetricsCollectorService>,
}

impl MonitoringState {
    fn health(&self) -> HealthMonitorService {
        HealthMonitorService::new(self.app.config.clone(), self.app.db.clone())
    }
}

#[axum::debug_handler]
pub async fn health(State(state): State<MonitoringState>) -> Json<LivenessReport> {
    Json(state.health().liveness(state.metrics.uptime_seconds()))
}

/// 503 while any dependency is unhealthy; degraded still serves traffic.
#[axum::debug_handler]
pub async fn ready(State(state): State<MonitoringState>) -> (StatusCode, Json<ReadinessReport>) {
    let report = state.health().readiness().await;
    let status = match report.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    };
    (status, Json(report))
}

#[axum::debug_handler]
pub async fn metrics(State(state): State<MonitoringState>) -> Response {
    (
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        state.metrics.render_prometheus().await,
    )
        .into_response()
}
