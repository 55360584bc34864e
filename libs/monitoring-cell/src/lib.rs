// =====================================================================================
// MONITORING CELL - PROBES AND REQUEST METRICS
// =====================================================================================
//
// Liveness and readiness probes for the orchestrator, plus request counters and
// latency exposed in Prometheus text format.
//
// =====================================================================================

pub mod handlers;
pub mod middleware;
pub mod models;
pub mod router;
pub mod services;

pub use models::{HealthCheck, HealthStatus, LivenessReport, MetricsSnapshot, ReadinessReport};
pub use services::{HealthMonitorService, MetricsCollectorService};

pub use middleware::track_metrics;
pub use router::monitoring_routes;
