pub mod health;
pub mod metrics;

pub use health::HealthMonitorService;
pub use metrics::MetricsCollectorService;
