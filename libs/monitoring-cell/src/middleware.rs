use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};

use crate::services::MetricsCollectorService;

/// Label for requests no route matched, so random paths cannot grow the series set.
const UNMATCHED_ROUTE: &str = "unmatched";

/// Records method, route template, status and latency of every request.
pub async fn track_metrics(
    State(metrics): State<Arc<MetricsCollectorService>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string());

    let started = Instant::now();
    let response = next.run(request).await;

    metrics
        .record_request(
            &method,
            &route,
            response.status().as_u16(),
            started.elapsed().as_millis() as u64,
        )
        .await;
    response
}
