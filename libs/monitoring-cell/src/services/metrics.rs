// =====================================================================================
// METRICS COLLECTOR SERVICE
// =====================================================================================

use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tokio::sync::RwLock;
use tracing::debug;

use crate::models::MetricsSnapshot;

const LATENCY_WINDOW: usize = 1000;
const METRIC_PREFIX: &str = "clinic";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct RouteKey {
    method: String,
    route: String,
    status: u16,
}

#[derive(Debug)]
pub struct MetricsCollectorService {
    request_count: AtomicU64,
    error_count: AtomicU64,
    total_response_time_ms: AtomicU64,
    response_times: RwLock<Vec<u64>>,
    by_route: RwLock<BTreeMap<RouteKey, u64>>,
    start_time: Instant,
}

impl Default for MetricsCollectorService {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollectorService {
    pub fn new() -> Self {
        Self {
            request_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            total_response_time_ms: AtomicU64::new(0),
            response_times: RwLock::new(Vec::new()),
            by_route: RwLock::new(BTreeMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Counts one finished request. Only 5xx responses count as errors.
    pub async fn record_request(&self, method: &str, route: &str, status: u16, response_time_ms: u64) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_ms.fetch_add(response_time_ms, Ordering::Relaxed);
        if status >= 500 {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }

        {
            let mut times = self.response_times.write().await;
            times.push(response_time_ms);
            if times.len() > LATENCY_WINDOW {
                times.drain(0..LATENCY_WINDOW / 2);
            }
        }

        let key = RouteKey {
            method: method.to_string(),
            route: route.to_string(),
            status,
        };
        *self.by_route.write().await.entry(key).or_insert(0) += 1;

        debug!(method, route, status, response_time_ms, "Request recorded");
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub async fn get_current_stats(&self) -> MetricsSnapshot {
        let total_requests = self.request_count.load(Ordering::Relaxed);
        let total_errors = self.error_count.load(Ordering::Relaxed);
        let total_response_time = self.total_response_time_ms.load(Ordering::Relaxed);
        let uptime = self.uptime_seconds();

        let requests_per_second = if uptime > 0 {
            total_requests as f64 / uptime as f64
        } else {
            0.0
        };

        let (average_response_time_ms, error_rate_percentage) = if total_requests > 0 {
            (
                total_response_time as f64 / total_requests as f64,
                (total_errors as f64 / total_requests as f64) * 100.0,
            )
        } else {
            (0.0, 0.0)
        };

        let p95_response_time_ms = percentile(&self.response_times.read().await, 0.95);

        MetricsSnapshot {
            requests_per_second,
            average_response_time_ms,
            p95_response_time_ms,
            error_rate_percentage,
            total_requests,
            total_errors,
            uptime_seconds: uptime,
        }
    }

    /// Prometheus text exposition (format 0.0.4).
    pub async fn render_prometheus(&self) -> String {
        let stats = self.get_current_stats().await;
        let mut out = String::new();

        let _ = writeln!(out, "# HELP {}_http_requests_total HTTP requests by method, route and status.", METRIC_PREFIX);
        let _ = writeln!(out, "# TYPE {}_http_requests_total counter", METRIC_PREFIX);
        for (key, count) in self.by_route.read().await.iter() {
            let _ = writeln!(
                out,
                "{}_http_requests_total{{method=\"{}\",route=\"{}\",status=\"{}\"}} {}",
                METRIC_PREFIX,
                escape_label(&key.method),
                escape_label(&key.route),
                key.status,
                count
            );
        }

        write_metric(&mut out, "http_server_errors_total", "counter", "Responses with a 5xx status.", stats.total_errors as f64);
        write_metric(&mut out, "http_response_time_ms_avg", "gauge", "Mean response time in milliseconds.", stats.average_response_time_ms);
        write_metric(&mut out, "http_response_time_ms_p95", "gauge", "95th percentile response time over recent requests.", stats.p95_response_time_ms);
        write_metric(&mut out, "uptime_seconds", "gauge", "Seconds since the process started.", stats.uptime_seconds as f64);

        out
    }
}

fn write_metric(out: &mut String, name: &str, kind: &str, help: &str, value: f64) {
    let _ = writeln!(out, "# HELP {}_{} {}", METRIC_PREFIX, name, help);
    let _ = writeln!(out, "# TYPE {}_{} {}", METRIC_PREFIX, name, kind);
    let _ = writeln!(out, "{}_{} {}", METRIC_PREFIX, name, value);
}

fn percentile(times: &[u64], quantile: f64) -> f64 {
    if times.is_empty() {
        return 0.0;
    }
    let mut sorted = times.to_vec();
    sorted.sort_unstable();
    let index = ((sorted.len() as f64 * quantile) as usize).min(sorted.len() - 1);
    sorted[index] as f64
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
