//! Ingestion pipeline for Pulse
//!
//! The pipeline is responsible for:
//! - Writing every sample of a batch as one immutable record, in order
//! - Registering validation rules
//! - Checking samples against stored rules without writing anything
//!
//! Batches are not transactional. `ingest` stops at the first failed write and
//! keeps everything committed before it; the returned [`IngestReport`] says
//! how long the committed prefix is.

mod telemetry;

use crate::schema::{IngestBatch, RuleRange, ValidationSample};
use crate::store::{MetricRecordStore, ValidationRuleStore};
use crate::{Error, Result};

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const INGEST_SUCCESS_STATUS: &str = "Data ingested successfully";
pub const INGEST_FAILURE_STATUS: &str = "Failed to write metric record";
pub const ALL_VALID_MESSAGE: &str = "All metrics are valid";

/// Result of ingesting one batch
#[derive(Debug)]
pub struct IngestReport {
    /// Samples in the batch
    pub total: usize,
    /// Records committed, always a prefix of the batch
    pub written: usize,
    /// Ids of the committed records, in batch order
    pub record_ids: Vec<Uuid>,
    /// Error that stopped the batch, if any
    pub error: Option<Error>,
}

impl IngestReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Index of the sample whose write failed
    pub fn failed_at(&self) -> Option<usize> {
        self.error.as_ref().map(|_| self.written)
    }

    pub fn status(&self) -> &'static str {
        if self.is_success() {
            INGEST_SUCCESS_STATUS
        } else {
            INGEST_FAILURE_STATUS
        }
    }

    /// Collapse into a plain result, dropping the partial-write count on failure
    pub fn into_result(self) -> Result<usize> {
        match self.error {
            None => Ok(self.written),
            Some(e) => Err(e),
        }
    }
}

/// A sample that fell outside its stored range
#[derive(Debug, Clone, PartialEq)]
pub struct RangeViolation {
    /// Position of the sample in the request
    pub index: usize,
    pub metric_name: String,
    pub value: f64,
    pub range: RuleRange,
}

impl RangeViolation {
    pub fn message(&self) -> String {
        format!(
            "Metric {} value {} is out of the allowed range [{}, {}]",
            self.metric_name, self.value, self.range.min, self.range.max
        )
    }
}

/// Result of a validate-only call
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub message: String,
    /// Samples whose rule was looked up; evaluation stops at the first violation
    pub checked: usize,
    pub violation: Option<RangeViolation>,
}

/// Orchestrates rule lookups and record writes
pub struct IngestionPipeline {
    rules: Arc<dyn ValidationRuleStore>,
    records: Arc<dyn MetricRecordStore>,
}

impl IngestionPipeline {
    /// Create a new pipeline over the given stores
    pub fn new(rules: Arc<dyn ValidationRuleStore>, records: Arc<dyn MetricRecordStore>) -> Self {
        Self { rules, records }
    }

    /// Write every sample of `batch`, in order, stopping at the first failure.
    pub async fn ingest(&self, batch: &IngestBatch) -> IngestReport {
        let start = Instant::now();
        let total = batch.len();
        let mut record_ids = Vec::with_capacity(total);

        info!(
            source_id = %batch.source_id,
            source_type = %batch.source_type,
            samples = total,
            "Ingesting batch"
        );

        for (index, sample) in batch.metrics.iter().enumerate() {
            match self
                .records
                .write(&batch.source_id, &batch.source_type, sample)
                .await
            {
                Ok(id) => record_ids.push(id),
                Err(e) => {
                    warn!(
                        source_id = %batch.source_id,
                        metric_name = %sample.name,
                        index,
                        committed = record_ids.len(),
                        error = %e,
                        "Failed to write metric record, abandoning rest of batch"
                    );
                    telemetry::record_ingest(record_ids.len(), false, start.elapsed().as_secs_f64());
                    return IngestReport {
                        total,
                        written: record_ids.len(),
                        record_ids,
                        error: Some(e),
                    };
                }
            }
        }

        telemetry::record_ingest(record_ids.len(), true, start.elapsed().as_secs_f64());
        debug!(source_id = %batch.source_id, written = record_ids.len(), "Batch ingested");

        IngestReport {
            total,
            written: record_ids.len(),
            record_ids,
            error: None,
        }
    }

    /// Register a new validation rule.
    pub async fn add_validation(
        &self,
        metric_name: &str,
        source_id: &str,
        min: f64,
        max: f64,
    ) -> Result<Uuid> {
        let result = self.rules.add_rule(metric_name, source_id, min, max).await;
        telemetry::record_rule_added(result.is_ok());

        match &result {
            Ok(id) => info!(%id, metric_name, source_id, min, max, "Added validation rule"),
            Err(e) => warn!(metric_name, source_id, error = %e, "Failed to add validation rule"),
        }
        result
    }

    /// Check samples against their stored ranges without writing anything.
    ///
    /// Samples with no rule are unconstrained. Evaluation stops at the first
    /// out-of-range sample. Storage failures are returned as errors.
    pub async fn validate(
        &self,
        source_id: &str,
        samples: &[ValidationSample],
    ) -> Result<ValidationOutcome> {
        for (index, sample) in samples.iter().enumerate() {
            let Some(range) = self.rules.lookup_range(&sample.name, source_id).await? else {
                continue;
            };

            if !range.contains(sample.value) {
                let violation = RangeViolation {
                    index,
                    metric_name: sample.name.clone(),
                    value: sample.value,
                    range,
                };
                telemetry::record_validation("out_of_range");
                debug!(source_id, metric_name = %sample.name, value = sample.value, "Validation failed");

                return Ok(ValidationOutcome {
                    valid: false,
                    message: violation.message(),
                    checked: index + 1,
                    violation: Some(violation),
                });
            }
        }

        telemetry::record_validation("valid");
        Ok(ValidationOutcome {
            valid: true,
            message: ALL_VALID_MESSAGE.to_string(),
            checked: samples.len(),
            violation: None,
        })
    }
}
