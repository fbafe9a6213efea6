//! Upward API
//!
//! JSON over HTTP for the six gateway operations:
//! - ingest a batch
//! - add a validation rule
//! - validate samples without writing
//! - write timeseries to the backend
//! - instant and range queries against the backend

pub mod handlers;
mod service;
mod telemetry;

pub use service::{
    GatewayService, IngestResponse, NewValidationRequest, NewValidationResponse, ReadResponse,
    ValidateRequest, ValidateResponse, WriteRequest, WriteResponse, WRITE_SUCCESS_STATUS,
};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// HTTP API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub http_port: u16,
    /// Maximum request body size
    pub max_body_size: usize,
    pub enable_cors: bool,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            http_port: 9400,
            max_body_size: 16 * 1024 * 1024, // 16MB
            enable_cors: true,
        }
    }
}

/// Shared API state
#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<GatewayService>,
}

/// Build the HTTP API router
pub fn build_http_router(service: Arc<GatewayService>, config: &ApiServerConfig) -> Router {
    router(service, None, config)
}

/// Build the HTTP API router with a `/metrics` endpoint rendering `metrics`
pub fn build_http_router_with_metrics(
    service: Arc<GatewayService>,
    metrics: PrometheusHandle,
    config: &ApiServerConfig,
) -> Router {
    router(service, Some(metrics), config)
}

fn router(
    service: Arc<GatewayService>,
    metrics: Option<PrometheusHandle>,
    config: &ApiServerConfig,
) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};
    use tower_http::cors::{Any, CorsLayer};

    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .route("/api/v1/ingest", post(handlers::ingest))
        .route("/api/v1/validation-rules", post(handlers::add_validation_rule))
        .route("/api/v1/validate", post(handlers::validate))
        .route("/api/v1/timeseries/write", post(handlers::write_timeseries))
        .route("/api/v1/timeseries/query", get(handlers::query_instant))
        .route("/api/v1/timeseries/query_range", get(handlers::query_range));

    if let Some(handle) = metrics {
        router = router.route(
            "/metrics",
            get(move || {
                let handle = handle.clone();
                async move { handle.render() }
            }),
        );
    }

    let router = router
        .with_state(ApiState { service })
        .layer(DefaultBodyLimit::max(config.max_body_size))
        .layer(middleware::from_fn(telemetry::http_observability_middleware));

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router.layer(cors)
    } else {
        router
    }
}

async fn health_check() -> &'static str {
    "OK"
}

async fn ready_check() -> &'static str {
    "READY"
}
