use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{error, info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod router;

use monitoring_cell::MetricsCollectorService;
use shared_config::AppConfig;
use shared_models::error::error_body;
use shared_utils::request_id::REQUEST_ID_HEADER;
use shared_utils::AppState;
use staff_cell::services::UserService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env();
    if let Err(e) = config.validate() {
        error!(error = %e, "Refusing to start with an unsafe configuration");
        std::process::exit(1);
    }

    info!(
        service = %config.service_name,
        environment = %config.environment,
        "Starting clinic API server"
    );

    let port = config.server_port;
    let cors = cors_layer(&config.allowed_origins);
    let (state, audit_worker) = AppState::new(config);
    let metrics = Arc::new(MetricsCollectorService::new());

    seed_superadmin(&state).await;

    let app = router::create_router(state, metrics)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(CatchPanicLayer::custom(handle_panic));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router held the last queue senders; the worker drains what is left and exits.
    if let Err(e) = audit_worker.await {
        warn!(error = %e, "Audit worker ended abnormally");
    }
    info!("Server stopped");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Skipping invalid CORS origin");
                None
            }
        })
        .collect();

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, request_id.clone()])
        .expose_headers([request_id])
        .allow_credentials(true)
}

/// Idempotent; a failure is logged and the server still starts.
async fn seed_superadmin(state: &AppState) {
    if !state.config.seed_enabled() {
        return;
    }

    match UserService::new(state)
        .seed_superadmin(&state.config.superadmin_email, &state.config.superadmin_password)
        .await
    {
        Ok(true) => info!(email = %state.config.superadmin_email, "Superadmin seeded"),
        Ok(false) => info!("Superadmin already present"),
        Err(e) => warn!(error = %e, "Superadmin seed failed"),
    }
}

fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");

    error!(
        panic = %detail,
        backtrace = %std::backtrace::Backtrace::force_capture(),
        "Request handler panicked"
    );

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(error_body("INTERNAL_ERROR", "Internal server error", "")),
    )
        .into_response()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
