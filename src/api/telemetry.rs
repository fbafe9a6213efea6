//! HTTP request telemetry.

use axum::extract::MatchedPath;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use metrics::{counter, histogram, Label};
use std::time::Instant;
use tracing::{info_span, Instrument};

/// Route label for requests no route matched, keeps label cardinality bounded
const UNMATCHED_ROUTE: &str = "unmatched";

/// Middleware recording request count, duration, and 4xx/5xx responses per route.
pub async fn http_observability_middleware(req: Request<axum::body::Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().as_str().to_string();
    let route = route_label(req.extensions().get::<MatchedPath>());

    let span = info_span!("http.request", method = %method, route = %route);
    let response = next.run(req).instrument(span).await;

    let status = response.status();
    let labels = vec![
        Label::new("method", method),
        Label::new("route", route),
        Label::new("status", status.as_u16().to_string()),
    ];

    histogram!("pulse_http_request_duration_seconds", labels.clone())
        .record(start.elapsed().as_secs_f64());
    if status.is_client_error() || status.is_server_error() {
        counter!("pulse_http_request_errors_total", labels.clone()).increment(1);
    }
    counter!("pulse_http_requests_total", labels).increment(1);

    response
}

fn route_label(matched: Option<&MatchedPath>) -> String {
    matched
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string())
}
