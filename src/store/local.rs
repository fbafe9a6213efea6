//! Local in-memory store for development and testing

use super::{MetricRecordStore, ValidationRuleStore};
use crate::schema::{MetricRecord, MetricSample, RuleRange, ValidationRule};
use crate::Result;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

/// Local in-memory store
///
/// Holds both logical tables in memory and is suitable for development,
/// testing, and single-node deployments that do not need durability.
#[derive(Debug, Default)]
pub struct LocalStore {
    /// Records keyed by id
    records: DashMap<Uuid, MetricRecord>,
    /// Rules per (metric name, source id), in insertion order
    rules: DashMap<(String, String), Vec<ValidationRule>>,
}

impl LocalStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records written so far
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Snapshot of all records ordered by id (write order)
    pub fn records(&self) -> Vec<MetricRecord> {
        let mut records: Vec<MetricRecord> =
            self.records.iter().map(|entry| entry.value().clone()).collect();
        records.sort_by_key(|record| record.id);
        records
    }

    /// Fetch a single record by id
    pub fn get_record(&self, id: &Uuid) -> Option<MetricRecord> {
        self.records.get(id).map(|entry| entry.value().clone())
    }

    /// All rules stored for a pair, oldest first
    pub fn rules_for(&self, metric_name: &str, source_id: &str) -> Vec<ValidationRule> {
        self.rules
            .get(&(metric_name.to_string(), source_id.to_string()))
            .map(|rules| rules.value().clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ValidationRuleStore for LocalStore {
    async fn add_rule(
        &self,
        metric_name: &str,
        source_id: &str,
        min: f64,
        max: f64,
    ) -> Result<Uuid> {
        let rule = ValidationRule::new(metric_name, source_id, min, max)?;
        let id = rule.id;

        self.rules
            .entry((metric_name.to_string(), source_id.to_string()))
            .or_default()
            .push(rule);

        debug!(%id, metric_name, source_id, min, max, "Added validation rule");
        Ok(id)
    }

    async fn lookup_range(&self, metric_name: &str, source_id: &str) -> Result<Option<RuleRange>> {
        let key = (metric_name.to_string(), source_id.to_string());
        Ok(self
            .rules
            .get(&key)
            .and_then(|rules| rules.value().last().map(ValidationRule::range)))
    }
}

#[async_trait]
impl MetricRecordStore for LocalStore {
    async fn write(
        &self,
        source_id: &str,
        source_type: &str,
        sample: &MetricSample,
    ) -> Result<Uuid> {
        let record = MetricRecord::from_sample(source_id, source_type, sample)?;
        let id = record.id;
        self.records.insert(id, record);
        Ok(id)
    }
}
