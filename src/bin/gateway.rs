//! Pulse Gateway Binary
//!
//! Serves the ingestion and query API and, when built with the `kafka`
//! feature, consumes ingest batches from the broker topic.

use pulse::api::{self, ApiServerConfig, GatewayService};
use pulse::config::ComponentFactory;
use pulse::ingestion::IngestionPipeline;
use pulse::telemetry::{self, LogFormat};
use pulse::timeseries::TimeseriesClient;

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;

/// Pulse metrics gateway
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// HTTP API port
    #[arg(long, env = "HTTP_PORT", default_value = "9400")]
    http_port: u16,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log format: json or text
    #[arg(long, env = "LOG_FORMAT", default_value = "json")]
    log_format: String,

    /// Do not start the broker consumer
    #[arg(long, env = "DISABLE_CONSUMER")]
    disable_consumer: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_format: LogFormat = args.log_format.parse()?;
    telemetry::init_logging(&args.log_level, log_format)?;
    let metrics = telemetry::init_metrics()?;

    info!("Starting Pulse gateway");

    let stores = ComponentFactory::create_stores().context("failed to create stores")?;
    let pipeline = Arc::new(IngestionPipeline::new(stores.rules, stores.records));

    let backend = ComponentFactory::backend_config()?;
    info!(base_url = %backend.base_url, timeout_secs = backend.timeout.as_secs(), "Time-series backend");
    let timeseries = TimeseriesClient::new(backend)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let consumer = if args.disable_consumer {
        info!("Broker consumer disabled");
        None
    } else {
        spawn_consumer(pipeline.clone(), shutdown_rx.clone())?
    };

    let service = Arc::new(GatewayService::new(pipeline, timeseries));
    let config = ApiServerConfig {
        http_port: args.http_port,
        ..Default::default()
    };
    let router = api::build_http_router_with_metrics(service, metrics, &config);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(http_port = config.http_port, "Gateway ready");

    axum::serve(listener, router)
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx))
        .await
        .context("HTTP server error")?;

    if let Some(handle) = consumer {
        handle.await.context("broker consumer task panicked")?;
    }

    info!("Gateway shut down");
    Ok(())
}

#[cfg(feature = "kafka")]
fn spawn_consumer(
    pipeline: Arc<IngestionPipeline>,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<Option<tokio::task::JoinHandle<()>>> {
    use pulse::broker::{BrokerConsumer, KafkaSource};

    let broker = ComponentFactory::broker_config();
    let source = KafkaSource::new(&broker)?;
    let consumer = BrokerConsumer::new(source, pipeline);

    let token = consumer.shutdown_token();
    tokio::spawn(async move {
        wait_for_shutdown(shutdown).await;
        token.cancel();
    });

    Ok(Some(tokio::spawn(async move {
        consumer.run().await;
    })))
}

#[cfg(not(feature = "kafka"))]
fn spawn_consumer(
    _pipeline: Arc<IngestionPipeline>,
    _shutdown: watch::Receiver<bool>,
) -> anyhow::Result<Option<tokio::task::JoinHandle<()>>> {
    info!("Built without the kafka feature, broker consumer not available");
    Ok(None)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    if *shutdown.borrow() {
        return;
    }
    let _ = shutdown.changed().await;
}
