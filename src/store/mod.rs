//! Storage for validation rules and metric records
//!
//! Two logical tables back the ingestion pipeline:
//! - `metrics(id, source_id, source_type, metric_name, metric_value, labels, timestamp)`
//! - `metric_validation(id, metric_name, source_id, min_value, max_value)`
//!
//! Records are immutable and independently keyed, so implementations need no
//! cross-record locking. When several rules exist for one (metric name,
//! source id) pair, lookups return the most recently added rule.

mod local;
mod object;

pub use local::LocalStore;
pub use object::{ObjectStoreBackend, ObjectStoreBackendConfig};

use crate::schema::{MetricSample, RuleRange};
use crate::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Validation rule store interface
#[async_trait]
pub trait ValidationRuleStore: Send + Sync {
    /// Persist a new rule and return its id.
    ///
    /// Duplicate (metric name, source id) pairs are accepted; each call adds a
    /// new rule.
    async fn add_rule(&self, metric_name: &str, source_id: &str, min: f64, max: f64)
        -> Result<Uuid>;

    /// Look up the acceptable range for a pair.
    ///
    /// `Ok(None)` means no rule exists, which callers treat as unconstrained.
    async fn lookup_range(&self, metric_name: &str, source_id: &str) -> Result<Option<RuleRange>>;
}

/// Metric record store interface
#[async_trait]
pub trait MetricRecordStore: Send + Sync {
    /// Persist one sample as a new immutable record and return the generated id.
    ///
    /// The record is visible to subsequent reads once this returns `Ok`.
    async fn write(&self, source_id: &str, source_type: &str, sample: &MetricSample)
        -> Result<Uuid>;
}
