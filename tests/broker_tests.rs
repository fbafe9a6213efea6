//! Broker consumer loop tests against an in-memory message source

use pulse::broker::{BrokerConsumer, ConsumedMessage, MemorySource, MessageOutcome, SessionState};
use pulse::ingestion::IngestionPipeline;
use pulse::schema::{IngestBatch, MetricSample};
use pulse::store::{LocalStore, MetricRecordStore};
use pulse::{Error, Result};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

struct RejectingRecordStore;

#[async_trait]
impl MetricRecordStore for RejectingRecordStore {
    async fn write(&self, _: &str, _: &str, _: &MetricSample) -> Result<Uuid> {
        Err(Error::Storage("records unavailable".to_string()))
    }
}

fn payload(source_id: &str, names: &[&str]) -> Vec<u8> {
    let batch = names.iter().fold(IngestBatch::new(source_id, "sensor"), |batch, name| {
        batch.with_sample(MetricSample::new(*name, 1.0, 1000))
    });
    serde_json::to_vec(&batch).unwrap()
}

fn local_consumer(source: MemorySource) -> (Arc<LocalStore>, Arc<BrokerConsumer<MemorySource>>) {
    let store = Arc::new(LocalStore::new());
    let pipeline = Arc::new(IngestionPipeline::new(store.clone(), store.clone()));
    (store, Arc::new(BrokerConsumer::new(source, pipeline)))
}

#[tokio::test]
async fn test_malformed_message_is_skipped_and_consumption_continues() {
    let source = MemorySource::new("metrics-topic");
    source.push(b"{\"source_id\": 42".to_vec());
    source.push(payload("s1", &["temp", "humidity"]));
    source.push_message(None);
    source.push(payload("s2", &["temp"]));

    let (store, consumer) = local_consumer(source);
    let stats = consumer.run().await;

    assert_eq!(stats.decode_failed, 1);
    assert_eq!(stats.empty_payload, 1);
    assert_eq!(stats.ingested, 2);
    assert_eq!(store.record_count(), 3);
    assert_eq!(consumer.source().acknowledged(), vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn test_ingest_failure_is_acknowledged_not_retried() {
    let source = MemorySource::new("metrics-topic");
    source.push(payload("s1", &["temp"]));
    source.push(payload("s1", &["temp"]));

    let store = Arc::new(LocalStore::new());
    let pipeline = Arc::new(IngestionPipeline::new(store, Arc::new(RejectingRecordStore)));
    let consumer = BrokerConsumer::new(source, pipeline);

    let stats = consumer.run().await;

    assert_eq!(stats.ingest_failed, 2);
    assert_eq!(consumer.source().acknowledged(), vec![0, 1]);
    assert_eq!(consumer.source().pending(), 0);
}

#[tokio::test]
async fn test_handle_message_reports_outcome() {
    let (_store, consumer) = local_consumer(MemorySource::new("t"));
    let message = |payload: &[u8]| ConsumedMessage {
        topic: "t".to_string(),
        partition: 3,
        offset: 11,
        payload: Some(payload.to_vec()),
    };

    assert_eq!(
        consumer.handle_message(&message(payload("s", &["a"]).as_slice())).await,
        MessageOutcome::Ingested
    );
    assert_eq!(
        consumer.handle_message(&message(&b"[]"[..])).await,
        MessageOutcome::DecodeFailed
    );
    // Handling alone never acknowledges
    assert!(consumer.source().acknowledged().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_source_error_backs_off_and_resumes() {
    let source = MemorySource::new("metrics-topic");
    source.push_error("broker transport failure");
    source.push(payload("s1", &["temp"]));

    let (store, consumer) = local_consumer(source);
    let stats = consumer.run().await;

    assert_eq!(stats.ingested, 1);
    assert_eq!(store.record_count(), 1);
}

#[tokio::test]
async fn test_shutdown_releases_live_session() {
    let (store, consumer) = local_consumer(MemorySource::streaming("metrics-topic"));

    let runner = {
        let consumer = consumer.clone();
        tokio::spawn(async move { consumer.run().await })
    };

    consumer.source().push(payload("s1", &["temp"]));
    tokio::time::timeout(Duration::from_secs(5), async {
        while consumer.stats().handled() < 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(consumer.state(), SessionState::Claimed);

    consumer.shutdown_token().cancel();
    let stats = tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(stats.ingested, 1);
    assert_eq!(store.record_count(), 1);
    assert_eq!(consumer.state(), SessionState::Released);
}
