//! # Pulse
//!
//! A metrics ingestion and query gateway.
//!
//! Producers send batches of named, labeled, timestamped samples either
//! directly over the API or through a message broker. Pulse persists every
//! sample as an immutable record, checks samples against stored per-metric
//! ranges on request, and proxies time series to and from a
//! VictoriaMetrics-compatible backend.
//!
//! ## Components
//!
//! - **Stores**: validation rules and metric records, in memory or on object storage
//! - **Ingestion pipeline**: ordered, fail-fast batch writes and validate-only checks
//! - **Broker consumer**: at-least-once hand-off from a topic into the pipeline
//! - **Time-series adapter**: bulk-import writes, instant and range reads

pub mod api;
pub mod broker;
pub mod config;
pub mod ingestion;
pub mod schema;
pub mod store;
pub mod telemetry;
pub mod timeseries;

mod error;

pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::api::GatewayService;
    pub use crate::broker::{BrokerConfig, BrokerConsumer, MessageSource};
    pub use crate::ingestion::{IngestReport, IngestionPipeline, ValidationOutcome};
    pub use crate::schema::{IngestBatch, MetricSample, TimeseriesData, ValidationSample};
    pub use crate::store::{LocalStore, MetricRecordStore, ObjectStoreBackend, ValidationRuleStore};
    pub use crate::timeseries::{BackendConfig, RangeQuery, TimeseriesClient};
    pub use crate::{Error, Result};
}
