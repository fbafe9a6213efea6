//! Logging and metrics bootstrap for Pulse binaries.

use crate::{Error, Result};

use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::str::FromStr;
use tracing::level_filters::LevelFilter;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" | "pretty" => Ok(LogFormat::Text),
            other => Err(Error::Config(format!(
                "invalid log format '{other}', expected one of [json, text]"
            ))),
        }
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `log_level` when set.
pub fn init_logging(log_level: &str, format: LogFormat) -> Result<()> {
    let level = parse_log_level(log_level)?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::from_level(level).into()));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);

    let installed = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    installed.map_err(|e| Error::Config(format!("failed to initialize log subscriber: {e}")))?;

    info!(level = %level, format = ?format, "Logging initialized");
    Ok(())
}

/// Install the global Prometheus recorder.
///
/// The returned handle renders the exposition text served on `/metrics`.
pub fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::Config(format!("failed to install metrics recorder: {e}")))?;
    describe_metrics();
    info!("Metrics recorder installed");
    Ok(handle)
}

/// Register descriptions for every metric the gateway emits.
pub fn describe_metrics() {
    describe_counter!("pulse_ingest_batches_total", "Ingest batches by outcome");
    describe_counter!("pulse_ingest_records_total", "Metric records written");
    describe_histogram!(
        "pulse_ingest_duration_seconds",
        Unit::Seconds,
        "Time to validate and persist one ingest batch"
    );
    describe_counter!("pulse_validation_rules_added_total", "Validation rules added by outcome");
    describe_counter!("pulse_validation_requests_total", "Validate-only requests by outcome");
    describe_counter!("pulse_broker_messages_total", "Broker messages handled by outcome");
    describe_counter!("pulse_broker_source_errors_total", "Errors polling the message source");
    describe_counter!("pulse_broker_ack_errors_total", "Failed broker acknowledgements");
    describe_histogram!(
        "pulse_backend_request_duration_seconds",
        Unit::Seconds,
        "Time-series backend request latency by endpoint"
    );
    describe_histogram!(
        "pulse_store_write_seconds",
        Unit::Seconds,
        "Object store write latency"
    );
    describe_counter!("pulse_http_requests_total", "HTTP requests by route and status");
    describe_counter!("pulse_http_request_errors_total", "HTTP 4xx and 5xx responses");
    describe_histogram!(
        "pulse_http_request_duration_seconds",
        Unit::Seconds,
        "HTTP request latency by route"
    );
}

pub fn parse_log_level(raw: &str) -> Result<Level> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(Error::Config(format!(
            "invalid log level '{other}', expected one of [trace, debug, info, warn, error]"
        ))),
    }
}
