// =====================================================================================
// HEALTH MONITOR SERVICE
// =====================================================================================

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::warn;

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{HealthCheck, HealthStatus, LivenessReport, ReadinessReport};

/// A store ping slower than this still passes, but reports as degraded.
const SLOW_STORE_MS: u64 = 1000;

pub struct HealthMonitorService {
    config: Arc<AppConfig>,
    db: Arc<SupabaseClient>,
}

impl HealthMonitorService {
    pub fn new(config: Arc<AppConfig>, db: Arc<SupabaseClient>) -> Self {
        Self { config, db }
    }

    pub fn liveness(&self, uptime_seconds: u64) -> LivenessReport {
        LivenessReport {
            status: HealthStatus::Healthy,
            service: self.config.service_name.clone(),
            environment: self.config.environment.clone(),
            version: env!("CARGO_PKG_VERSION"),
            uptime_seconds,
            timestamp: Utc::now(),
        }
    }

    pub async fn readiness(&self) -> ReadinessReport {
        let checks = vec![self.check_store().await];
        let status = checks
            .iter()
            .map(|check| check.status)
            .max()
            .unwrap_or(HealthStatus::Healthy);

        ReadinessReport {
            status,
            checks,
            timestamp: Utc::now(),
        }
    }

    async fn check_store(&self) -> HealthCheck {
        if !self.config.is_configured() {
            return HealthCheck {
                component: "store".to_string(),
                status: HealthStatus::Unhealthy,
                response_time_ms: 0,
                error_message: Some("Store is not configured".to_string()),
            };
        }

        let started = Instant::now();
        let result = self.db.ping().await;
        let response_time_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(()) => HealthCheck {
                component: "store".to_string(),
                status: if response_time_ms > SLOW_STORE_MS {
                    HealthStatus::Degraded
                } else {
                    HealthStatus::Healthy
                },
                response_time_ms,
                error_message: None,
            },
            Err(e) => {
                warn!(error = %e, response_time_ms, "Store readiness check failed");
                HealthCheck {
                    component: "store".to_string(),
                    status: HealthStatus::Unhealthy,
                    response_time_ms,
                    error_message: Some("Store unreachable".to_string()),
                }
            }
        }
    }
}
