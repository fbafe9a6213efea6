//! Data model for Pulse
//!
//! Samples arrive grouped in an [`IngestBatch`] attributed to one source, are
//! persisted one [`MetricRecord`] per sample, and are checked against
//! [`ValidationRule`] ranges keyed by (metric name, source id). The
//! [`TimeseriesData`] shape is shared by the backend protocol adapter.

mod labels;
mod metrics;

pub use labels::{decode_labels, encode_labels, Labels, METRIC_NAME_LABEL};
pub use metrics::{
    IngestBatch, MetricRecord, MetricSample, RuleRange, Sample, TimeseriesData, ValidationRule,
    ValidationSample, METRICS_TABLE, VALIDATION_TABLE,
};
