//! Sample, record, and rule definitions

use super::labels::{encode_labels, decode_labels, Labels, METRIC_NAME_LABEL};
use crate::{Error, Result};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Logical table holding accepted samples
pub const METRICS_TABLE: &str = "metrics";
/// Logical table holding validation rules
pub const VALIDATION_TABLE: &str = "metric_validation";

/// One named, labeled, timestamped observation as sent by a producer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub name: String,
    pub value: f64,
    /// Unix milliseconds
    pub timestamp: i64,
    #[serde(default)]
    pub labels: Labels,
}

impl MetricSample {
    pub fn new(name: impl Into<String>, value: f64, timestamp: i64) -> Self {
        Self {
            name: name.into(),
            value,
            timestamp,
            labels: Labels::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// Samples from a single (source id, source type) producer
///
/// This is also the broker message payload shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestBatch {
    pub source_id: String,
    pub source_type: String,
    #[serde(default)]
    pub metrics: Vec<MetricSample>,
}

impl IngestBatch {
    pub fn new(source_id: impl Into<String>, source_type: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            source_type: source_type.into(),
            metrics: Vec::new(),
        }
    }

    pub fn with_sample(mut self, sample: MetricSample) -> Self {
        self.metrics.push(sample);
        self
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

/// (metric name, value) pair submitted to the validate-only path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSample {
    pub name: String,
    pub value: f64,
}

impl ValidationSample {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Persisted form of one accepted sample. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub id: Uuid,
    pub source_id: String,
    pub source_type: String,
    pub metric_name: String,
    pub metric_value: f64,
    /// Encoded label set, see [`encode_labels`]
    pub labels: String,
    pub timestamp: i64,
}

impl MetricRecord {
    /// Build a record for `sample` with a freshly generated time-ordered id.
    pub fn from_sample(source_id: &str, source_type: &str, sample: &MetricSample) -> Result<Self> {
        Ok(Self {
            id: Uuid::now_v7(),
            source_id: source_id.to_string(),
            source_type: source_type.to_string(),
            metric_name: sample.name.clone(),
            metric_value: sample.value,
            labels: encode_labels(&sample.labels)?,
            timestamp: sample.timestamp,
        })
    }

    /// Decode the stored label string.
    pub fn decoded_labels(&self) -> Result<Labels> {
        decode_labels(&self.labels)
    }
}

/// Stored acceptable range for a (metric name, source id) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    pub id: Uuid,
    pub metric_name: String,
    pub source_id: String,
    pub min_value: f64,
    pub max_value: f64,
}

impl ValidationRule {
    /// Create a rule with a fresh id, rejecting empty keys and inverted or NaN bounds.
    pub fn new(metric_name: &str, source_id: &str, min: f64, max: f64) -> Result<Self> {
        if metric_name.is_empty() || source_id.is_empty() {
            return Err(Error::InvalidRequest(
                "validation rules need a metric name and a source id".to_string(),
            ));
        }
        if min.is_nan() || max.is_nan() {
            return Err(Error::InvalidRequest(format!(
                "validation bounds for {metric_name} must be numbers"
            )));
        }
        if min > max {
            return Err(Error::InvalidRequest(format!(
                "validation range for {metric_name} is inverted: min {min} > max {max}"
            )));
        }
        Ok(Self {
            id: Uuid::now_v7(),
            metric_name: metric_name.to_string(),
            source_id: source_id.to_string(),
            min_value: min,
            max_value: max,
        })
    }

    pub fn range(&self) -> RuleRange {
        RuleRange {
            min: self.min_value,
            max: self.max_value,
        }
    }
}

/// Inclusive [min, max] range returned by rule lookups
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleRange {
    pub min: f64,
    pub max: f64,
}

impl RuleRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Inclusive on both ends. NaN is never contained.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// One (value, timestamp) observation inside a [`TimeseriesData`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub value: f64,
    /// Unix milliseconds
    pub timestamp: i64,
}

impl Sample {
    pub fn new(value: f64, timestamp: i64) -> Self {
        Self { value, timestamp }
    }
}

/// A label set plus the ordered samples sharing it
///
/// Callers group samples by label set before constructing one.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TimeseriesData {
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub samples: Vec<Sample>,
}

impl TimeseriesData {
    pub fn new(labels: Labels) -> Self {
        Self {
            labels,
            samples: Vec::new(),
        }
    }

    pub fn with_sample(mut self, value: f64, timestamp: i64) -> Self {
        self.samples.push(Sample::new(value, timestamp));
        self
    }

    pub fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    /// Value of the reserved `__name__` label, if present.
    pub fn metric_name(&self) -> Option<&str> {
        self.labels.get(METRIC_NAME_LABEL).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_from_sample_keeps_fields() {
        let sample = MetricSample::new("cpu_usage", 0.75, 1_700_000_000_000).with_label("host", "a");
        let record = MetricRecord::from_sample("src-1", "agent", &sample).unwrap();

        assert_eq!(record.source_id, "src-1");
        assert_eq!(record.source_type, "agent");
        assert_eq!(record.metric_name, "cpu_usage");
        assert_eq!(record.metric_value, 0.75);
        assert_eq!(record.timestamp, 1_700_000_000_000);
        assert_eq!(record.decoded_labels().unwrap(), sample.labels);
    }

    #[test]
    fn test_record_ids_are_unique_and_time_ordered() {
        let sample = MetricSample::new("cpu_usage", 1.0, 0);
        let first = MetricRecord::from_sample("s", "t", &sample).unwrap();
        let second = MetricRecord::from_sample("s", "t", &sample).unwrap();

        assert_ne!(first.id, second.id);
        assert!(first.id < second.id);
    }

    #[test]
    fn test_rule_rejects_inverted_bounds() {
        let err = ValidationRule::new("cpu", "s", 10.0, 1.0).unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));

        let err = ValidationRule::new("cpu", "s", f64::NAN, 1.0).unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));

        let err = ValidationRule::new("", "s", 0.0, 1.0).unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));

        assert!(ValidationRule::new("cpu", "s", 5.0, 5.0).is_ok());
    }

    #[test]
    fn test_range_is_inclusive() {
        let range = RuleRange::new(0.0, 100.0);
        assert!(range.contains(0.0));
        assert!(range.contains(100.0));
        assert!(range.contains(42.5));
        assert!(!range.contains(-0.001));
        assert!(!range.contains(100.001));
        assert!(!range.contains(f64::NAN));
    }

    #[test]
    fn test_batch_payload_decodes_without_labels() {
        let payload = r#"{"source_id":"s1","source_type":"sensor","metrics":[{"name":"temp","value":21.5,"timestamp":1000}]}"#;
        let batch: IngestBatch = serde_json::from_str(payload).unwrap();

        assert_eq!(batch.len(), 1);
        assert!(batch.metrics[0].labels.is_empty());
    }
}
