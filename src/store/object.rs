//! Object-store backed durable store
//!
//! Every record and every rule is one JSON object. Records live under
//! `{prefix}/metrics/{id}.json`; rules live under
//! `{prefix}/metric_validation/{metric_name}/{source_id}/{id}.json` so a
//! lookup is a single prefix listing. Ids are UUIDv7, so the greatest id under
//! a rule prefix is the most recently added rule.

use super::{MetricRecordStore, ValidationRuleStore};
use crate::schema::{
    MetricRecord, MetricSample, RuleRange, ValidationRule, METRICS_TABLE, VALIDATION_TABLE,
};
use crate::{Error, Result};

use async_trait::async_trait;
use futures::TryStreamExt;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;
use uuid::Uuid;

const OBJECT_SUFFIX: &str = ".json";

/// Object store backend configuration
#[derive(Debug, Clone)]
pub struct ObjectStoreBackendConfig {
    /// Prefix under which both tables are written
    pub prefix: String,
}

impl Default for ObjectStoreBackendConfig {
    fn default() -> Self {
        Self {
            prefix: "pulse/".to_string(),
        }
    }
}

/// Durable store on top of any `object_store` implementation (S3, local disk, memory)
pub struct ObjectStoreBackend {
    object_store: Arc<dyn ObjectStore>,
    root: Path,
}

impl ObjectStoreBackend {
    /// Create a new backend rooted at `config.prefix`
    pub fn new(object_store: Arc<dyn ObjectStore>, config: ObjectStoreBackendConfig) -> Self {
        Self {
            object_store,
            root: Path::from(config.prefix.as_str()),
        }
    }

    fn record_path(&self, id: &Uuid) -> Path {
        self.root
            .child(METRICS_TABLE)
            .child(format!("{id}{OBJECT_SUFFIX}"))
    }

    fn rule_prefix(&self, metric_name: &str, source_id: &str) -> Path {
        self.root
            .child(VALIDATION_TABLE)
            .child(metric_name)
            .child(source_id)
    }

    /// Write one object. Paths embed a fresh UUID, so a put never replaces data.
    async fn put_json<T: serde::Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let body = serde_json::to_vec(value)
            .map_err(|e| Error::Serialization(format!("failed to encode {path}: {e}")))?;

        self.object_store
            .put(path, PutPayload::from(body))
            .await
            .map_err(|e| Error::Storage(format!("failed to commit {path}: {e}")))?;
        Ok(())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let bytes = self.object_store.get(path).await?.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::Decode(format!("corrupt object {path}: {e}")))
    }

    /// Read a record back by id
    pub async fn read_record(&self, id: &Uuid) -> Result<Option<MetricRecord>> {
        match self.get_json(&self.record_path(id)).await {
            Ok(record) => Ok(Some(record)),
            Err(Error::ObjectStore(object_store::Error::NotFound { .. })) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// All rule ids stored for a pair, oldest first
    pub async fn rule_ids(&self, metric_name: &str, source_id: &str) -> Result<Vec<Uuid>> {
        let prefix = self.rule_prefix(metric_name, source_id);
        let objects: Vec<_> = self
            .object_store
            .list(Some(&prefix))
            .try_collect()
            .await
            .map_err(|e| Error::Storage(format!("failed to list {prefix}: {e}")))?;

        let mut ids: Vec<Uuid> = objects
            .iter()
            .filter(|meta| {
                // Only direct children; "s1" must not match "s10/..."
                meta.location
                    .prefix_match(&prefix)
                    .map(|rest| rest.count() == 1)
                    .unwrap_or(false)
            })
            .filter_map(|meta| {
                meta.location
                    .filename()
                    .and_then(|name| name.strip_suffix(OBJECT_SUFFIX))
                    .and_then(|stem| Uuid::parse_str(stem).ok())
            })
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl ValidationRuleStore for ObjectStoreBackend {
    async fn add_rule(
        &self,
        metric_name: &str,
        source_id: &str,
        min: f64,
        max: f64,
    ) -> Result<Uuid> {
        let rule = ValidationRule::new(metric_name, source_id, min, max)?;
        let path = self
            .rule_prefix(metric_name, source_id)
            .child(format!("{}{OBJECT_SUFFIX}", rule.id));

        self.put_json(&path, &rule).await?;
        debug!(id = %rule.id, %path, "Committed validation rule");
        Ok(rule.id)
    }

    async fn lookup_range(&self, metric_name: &str, source_id: &str) -> Result<Option<RuleRange>> {
        if metric_name.is_empty() || source_id.is_empty() {
            return Ok(None);
        }
        let Some(latest) = self.rule_ids(metric_name, source_id).await?.pop() else {
            return Ok(None);
        };

        let path = self
            .rule_prefix(metric_name, source_id)
            .child(format!("{latest}{OBJECT_SUFFIX}"));
        let rule: ValidationRule = self.get_json(&path).await?;
        Ok(Some(rule.range()))
    }
}

#[async_trait]
impl MetricRecordStore for ObjectStoreBackend {
    async fn write(
        &self,
        source_id: &str,
        source_type: &str,
        sample: &MetricSample,
    ) -> Result<Uuid> {
        let start = Instant::now();
        let record = MetricRecord::from_sample(source_id, source_type, sample)?;
        let path = self.record_path(&record.id);

        self.put_json(&path, &record).await?;

        metrics::histogram!("pulse_store_write_seconds").record(start.elapsed().as_secs_f64());
        Ok(record.id)
    }
}
