//! Component factory for environment-based configuration
//!
//! Builds the stores, the backend client settings and the broker settings
//! from environment variables, so the same binary runs in development
//! (in-memory everything) and production (S3, VictoriaMetrics, Kafka).

use crate::broker::BrokerConfig;
use crate::store::{
    LocalStore, MetricRecordStore, ObjectStoreBackend, ObjectStoreBackendConfig,
    ValidationRuleStore,
};
use crate::timeseries::BackendConfig;
use crate::{Error, Result};

use object_store::{aws::AmazonS3Builder, local::LocalFileSystem, memory::InMemory, ObjectStore};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Where rules and records are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// Process-local maps, lost on restart
    Memory,
    /// Local filesystem under `LOCAL_STORAGE_DIR`
    Local,
    S3,
}

impl FromStr for StorageBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "local" => Ok(StorageBackend::Local),
            "s3" => Ok(StorageBackend::S3),
            other => Err(Error::Config(format!(
                "Unknown STORAGE_BACKEND: {}. Use 'memory', 'local' or 's3'",
                other
            ))),
        }
    }
}

/// Rule and record stores, usually backed by the same storage
#[derive(Clone)]
pub struct Stores {
    pub rules: Arc<dyn ValidationRuleStore>,
    pub records: Arc<dyn MetricRecordStore>,
}

pub struct ComponentFactory;

impl ComponentFactory {
    /// Storage backend selected by `STORAGE_BACKEND` (default: memory)
    pub fn storage_backend() -> Result<StorageBackend> {
        env("STORAGE_BACKEND")
            .map(|v| v.parse())
            .unwrap_or(Ok(StorageBackend::Memory))
    }

    /// Create the object store for a durable backend
    ///
    /// Environment variables:
    /// - LOCAL_STORAGE_DIR: root directory (local, default: ./data)
    /// - S3_BUCKET: S3 bucket name (required for s3)
    /// - S3_REGION: S3 region (default: us-east-1)
    /// - S3_ENDPOINT: Custom S3 endpoint (optional, for MinIO)
    /// - AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY: optional, IAM role otherwise
    pub fn create_object_store(backend: StorageBackend) -> Result<Arc<dyn ObjectStore>> {
        match backend {
            StorageBackend::Memory => {
                info!("Using in-memory object store (development mode)");
                Ok(Arc::new(InMemory::new()))
            }
            StorageBackend::Local => {
                let dir = env("LOCAL_STORAGE_DIR").unwrap_or_else(|| "./data".to_string());
                std::fs::create_dir_all(&dir)?;
                info!(dir = %dir, "Using local filesystem object store");
                Ok(Arc::new(LocalFileSystem::new_with_prefix(&dir)?))
            }
            StorageBackend::S3 => {
                let bucket = env("S3_BUCKET").ok_or_else(|| {
                    Error::Config("S3_BUCKET required when STORAGE_BACKEND=s3".to_string())
                })?;
                let region = env("S3_REGION").unwrap_or_else(|| "us-east-1".to_string());

                info!(bucket = %bucket, region = %region, "Using S3 object store");

                let mut builder = AmazonS3Builder::new()
                    .with_bucket_name(&bucket)
                    .with_region(&region);

                if let Some(endpoint) = env("S3_ENDPOINT") {
                    info!(endpoint = %endpoint, "Using custom S3 endpoint");
                    builder = builder.with_endpoint(&endpoint).with_allow_http(true);
                }
                if let Some(key) = env("AWS_ACCESS_KEY_ID") {
                    builder = builder.with_access_key_id(&key);
                }
                if let Some(secret) = env("AWS_SECRET_ACCESS_KEY") {
                    builder = builder.with_secret_access_key(&secret);
                }

                Ok(Arc::new(builder.build()?))
            }
        }
    }

    /// Create the rule and record stores
    ///
    /// `memory` uses [`LocalStore`]; `local` and `s3` use an
    /// [`ObjectStoreBackend`] rooted at `STORAGE_PREFIX` (default: pulse/).
    pub fn create_stores() -> Result<Stores> {
        let backend = Self::storage_backend()?;
        if backend == StorageBackend::Memory {
            info!("Using LocalStore for rules and records (development mode)");
            let store = Arc::new(LocalStore::new());
            return Ok(Stores {
                rules: store.clone(),
                records: store,
            });
        }

        let object_store = Self::create_object_store(backend)?;
        let config = ObjectStoreBackendConfig {
            prefix: env("STORAGE_PREFIX").unwrap_or_else(|| ObjectStoreBackendConfig::default().prefix),
        };
        info!(prefix = %config.prefix, "Using object store backend for rules and records");

        let store = Arc::new(ObjectStoreBackend::new(object_store, config));
        Ok(Stores {
            rules: store.clone(),
            records: store,
        })
    }

    /// Time-series backend settings
    ///
    /// - VICTORIA_METRICS_URL: base URL (default: http://localhost:8428)
    /// - BACKEND_TIMEOUT_SECS: request timeout (default: 30)
    pub fn backend_config() -> Result<BackendConfig> {
        backend_config_from(env)
    }

    /// Broker settings: KAFKA_BROKERS, KAFKA_TOPIC, KAFKA_GROUP_ID
    pub fn broker_config() -> BrokerConfig {
        broker_config_from(env)
    }
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn backend_config_from(lookup: impl Fn(&str) -> Option<String>) -> Result<BackendConfig> {
    let defaults = BackendConfig::default();
    let timeout = match lookup("BACKEND_TIMEOUT_SECS") {
        Some(raw) => {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                Error::Config(format!("Invalid BACKEND_TIMEOUT_SECS '{}'", raw))
            })?;
            Duration::from_secs(secs)
        }
        None => defaults.timeout,
    };

    let base_url = lookup("VICTORIA_METRICS_URL").unwrap_or(defaults.base_url);
    url::Url::parse(&base_url)
        .map_err(|e| Error::Config(format!("Invalid VICTORIA_METRICS_URL '{}': {}", base_url, e)))?;

    Ok(BackendConfig { base_url, timeout })
}

fn broker_config_from(lookup: impl Fn(&str) -> Option<String>) -> BrokerConfig {
    let defaults = BrokerConfig::default();
    BrokerConfig {
        brokers: lookup("KAFKA_BROKERS").unwrap_or(defaults.brokers),
        topic: lookup("KAFKA_TOPIC").unwrap_or(defaults.topic),
        group_id: lookup("KAFKA_GROUP_ID").unwrap_or(defaults.group_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_storage_backend_parse() {
        assert_eq!("memory".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert_eq!(" S3 ".parse::<StorageBackend>().unwrap(), StorageBackend::S3);
        assert_eq!("local".parse::<StorageBackend>().unwrap(), StorageBackend::Local);
        assert!(matches!("cassandra".parse::<StorageBackend>(), Err(Error::Config(_))));
    }

    #[test]
    fn test_backend_config_defaults() {
        let config = backend_config_from(lookup(&[])).unwrap();
        assert_eq!(config.base_url, "http://localhost:8428");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_backend_config_overrides_and_rejects_bad_values() {
        let config = backend_config_from(lookup(&[
            ("VICTORIA_METRICS_URL", "http://vm:8428"),
            ("BACKEND_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "http://vm:8428");
        assert_eq!(config.timeout, Duration::from_secs(5));

        assert!(backend_config_from(lookup(&[("BACKEND_TIMEOUT_SECS", "soon")])).is_err());
        assert!(backend_config_from(lookup(&[("VICTORIA_METRICS_URL", "not a url")])).is_err());
    }

    #[test]
    fn test_broker_config_defaults() {
        let config = broker_config_from(lookup(&[("KAFKA_TOPIC", "custom")]));
        assert_eq!(config.brokers, "kafka:9092");
        assert_eq!(config.topic, "custom");
        assert_eq!(config.group_id, "pulse");
    }
}
