//! Broker consumer adapter
//!
//! Pulls [`IngestBatch`] payloads off a message source and hands each one to
//! the [`IngestionPipeline`]. Every message is acknowledged once it has been
//! handled, whatever the outcome:
//! - payloads that do not decode are logged and dropped
//! - ingest failures are logged and not retried
//!
//! Delivery is therefore at-least-once: a crash between hand-off and
//! acknowledgement redelivers the message, and the record writes it triggers
//! are not idempotent.

#[cfg(feature = "kafka")]
mod kafka;
mod memory;

#[cfg(feature = "kafka")]
pub use kafka::{client_config, KafkaSource};
pub use memory::MemorySource;

use crate::ingestion::IngestionPipeline;
use crate::schema::IngestBatch;
use crate::{Error, Result};

use async_trait::async_trait;
use metrics::counter;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Broker connection settings
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Comma separated bootstrap servers
    pub brokers: String,
    pub topic: String,
    pub group_id: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            brokers: "kafka:9092".to_string(),
            topic: "metrics-topic".to_string(),
            group_id: "pulse".to_string(),
        }
    }
}

/// A message handed out by a [`MessageSource`]
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumedMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Option<Vec<u8>>,
}

/// Where consumed messages come from
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Wait for the next message. `Ok(None)` means the source is exhausted.
    async fn next_message(&self) -> Result<Option<ConsumedMessage>>;

    /// Mark a message as handled so it is not redelivered to the group.
    async fn acknowledge(&self, message: &ConsumedMessage) -> Result<()>;

    /// Flush acknowledgements before the session ends.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Consumer-group session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Claimed,
    Released,
}

/// What happened to one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    Ingested,
    IngestFailed,
    DecodeFailed,
    EmptyPayload,
}

impl MessageOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageOutcome::Ingested => "ingested",
            MessageOutcome::IngestFailed => "ingest_failed",
            MessageOutcome::DecodeFailed => "decode_failed",
            MessageOutcome::EmptyPayload => "empty_payload",
        }
    }
}

/// Per-outcome message counts for one consumer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub ingested: u64,
    pub ingest_failed: u64,
    pub decode_failed: u64,
    pub empty_payload: u64,
    pub ack_failed: u64,
}

impl ConsumerStats {
    pub fn handled(&self) -> u64 {
        self.ingested + self.ingest_failed + self.decode_failed + self.empty_payload
    }
}

#[derive(Default)]
struct StatCounters {
    ingested: AtomicU64,
    ingest_failed: AtomicU64,
    decode_failed: AtomicU64,
    empty_payload: AtomicU64,
    ack_failed: AtomicU64,
}

impl StatCounters {
    fn count(&self, outcome: MessageOutcome) {
        let counter = match outcome {
            MessageOutcome::Ingested => &self.ingested,
            MessageOutcome::IngestFailed => &self.ingest_failed,
            MessageOutcome::DecodeFailed => &self.decode_failed,
            MessageOutcome::EmptyPayload => &self.empty_payload,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ConsumerStats {
        ConsumerStats {
            ingested: self.ingested.load(Ordering::Relaxed),
            ingest_failed: self.ingest_failed.load(Ordering::Relaxed),
            decode_failed: self.decode_failed.load(Ordering::Relaxed),
            empty_payload: self.empty_payload.load(Ordering::Relaxed),
            ack_failed: self.ack_failed.load(Ordering::Relaxed),
        }
    }
}

/// Decode a broker payload into a batch.
pub fn decode_payload(payload: &[u8]) -> Result<IngestBatch> {
    serde_json::from_slice(payload)
        .map_err(|e| Error::Decode(format!("malformed ingest payload: {e}")))
}

/// Delay before polling again after the source reports an error
const SOURCE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Feeds messages from a [`MessageSource`] into the ingestion pipeline
pub struct BrokerConsumer<S> {
    source: S,
    pipeline: Arc<IngestionPipeline>,
    state: Mutex<SessionState>,
    stats: StatCounters,
    shutdown: CancellationToken,
}

impl<S: MessageSource> BrokerConsumer<S> {
    pub fn new(source: S, pipeline: Arc<IngestionPipeline>) -> Self {
        Self {
            source,
            pipeline,
            state: Mutex::new(SessionState::Idle),
            stats: StatCounters::default(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops [`run`](Self::run) when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn stats(&self) -> ConsumerStats {
        self.stats.snapshot()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Consume until shutdown or until the source is exhausted.
    pub async fn run(&self) -> ConsumerStats {
        *self.state.lock() = SessionState::Claimed;
        info!("Broker consumer session started");

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown signal received, stopping broker consumer");
                    break;
                }
                next = self.source.next_message() => {
                    match next {
                        Ok(Some(message)) => {
                            self.handle_message(&message).await;
                            self.acknowledge(&message).await;
                        }
                        Ok(None) => {
                            info!("Message source exhausted");
                            break;
                        }
                        Err(e) => {
                            counter!("pulse_broker_source_errors_total").increment(1);
                            error!(error = %e, "Message source error");
                            tokio::select! {
                                _ = self.shutdown.cancelled() => {
                                    info!("Shutdown signal received during backoff, stopping broker consumer");
                                    break;
                                }
                                _ = tokio::time::sleep(SOURCE_ERROR_BACKOFF) => {}
                            }
                        }
                    }
                }
            }
        }

        if let Err(e) = self.source.close().await {
            error!(error = %e, "Failed to commit consumer state on shutdown");
        }
        *self.state.lock() = SessionState::Released;

        let stats = self.stats();
        info!(
            ingested = stats.ingested,
            ingest_failed = stats.ingest_failed,
            decode_failed = stats.decode_failed,
            empty_payload = stats.empty_payload,
            "Broker consumer session released"
        );
        stats
    }

    /// Decode one message and dispatch it to the pipeline. Never acknowledges.
    pub async fn handle_message(&self, message: &ConsumedMessage) -> MessageOutcome {
        let outcome = match message.payload.as_deref() {
            None | Some([]) => {
                warn!(
                    partition = message.partition,
                    offset = message.offset,
                    "Broker message has no payload, skipping"
                );
                MessageOutcome::EmptyPayload
            }
            Some(payload) => match decode_payload(payload) {
                Err(e) => {
                    warn!(
                        partition = message.partition,
                        offset = message.offset,
                        error = %e,
                        "Dropping undecodable broker message"
                    );
                    MessageOutcome::DecodeFailed
                }
                Ok(batch) => {
                    let report = self.pipeline.ingest(&batch).await;
                    match &report.error {
                        None => {
                            debug!(
                                partition = message.partition,
                                offset = message.offset,
                                written = report.written,
                                "Broker message ingested"
                            );
                            MessageOutcome::Ingested
                        }
                        Some(e) => {
                            error!(
                                partition = message.partition,
                                offset = message.offset,
                                source_id = %batch.source_id,
                                written = report.written,
                                total = report.total,
                                error = %e,
                                "Ingest failed for broker message, not retrying"
                            );
                            MessageOutcome::IngestFailed
                        }
                    }
                }
            },
        };

        self.stats.count(outcome);
        counter!("pulse_broker_messages_total", "outcome" => outcome.as_str()).increment(1);
        outcome
    }

    async fn acknowledge(&self, message: &ConsumedMessage) {
        if let Err(e) = self.source.acknowledge(message).await {
            self.stats.ack_failed.fetch_add(1, Ordering::Relaxed);
            counter!("pulse_broker_ack_errors_total").increment(1);
            error!(
                partition = message.partition,
                offset = message.offset,
                error = %e,
                "Failed to acknowledge broker message"
            );
        }
    }
}
