//! Kafka message source

use super::{BrokerConfig, ConsumedMessage, MessageSource};
use crate::{Error, Result};

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::{Message, Offset, TopicPartitionList};
use tracing::info;

/// Consumer-group member reading one topic
///
/// Offsets are stored only after a message has been handled and are
/// committed in the background, so unhandled messages are redelivered after
/// a restart.
pub struct KafkaSource {
    consumer: StreamConsumer,
}

/// Consumer-group settings for `config`.
///
/// Partitions are spread round-robin across members, a new group starts from
/// the earliest offset, and offsets are stored by [`acknowledge`] only.
///
/// [`acknowledge`]: MessageSource::acknowledge
pub fn client_config(config: &BrokerConfig) -> ClientConfig {
    let mut client = ClientConfig::new();
    client
        .set("bootstrap.servers", &config.brokers)
        .set("group.id", &config.group_id)
        .set("enable.auto.commit", "true")
        .set("enable.auto.offset.store", "false")
        .set("auto.offset.reset", "earliest")
        .set("partition.assignment.strategy", "roundrobin")
        .set("enable.partition.eof", "false");
    client
}

impl KafkaSource {
    pub fn new(config: &BrokerConfig) -> Result<Self> {
        let consumer: StreamConsumer = client_config(config)
            .create()
            .map_err(|e| Error::Broker(format!("failed to create Kafka consumer: {e}")))?;

        consumer
            .subscribe(&[config.topic.as_str()])
            .map_err(|e| Error::Broker(format!("failed to subscribe to {}: {e}", config.topic)))?;

        info!(
            brokers = %config.brokers,
            topic = %config.topic,
            group_id = %config.group_id,
            "Kafka consumer subscribed"
        );
        Ok(Self { consumer })
    }
}

#[async_trait]
impl MessageSource for KafkaSource {
    async fn next_message(&self) -> Result<Option<ConsumedMessage>> {
        let message = self.consumer.recv().await?;
        Ok(Some(ConsumedMessage {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            payload: message.payload().map(<[u8]>::to_vec),
        }))
    }

    async fn acknowledge(&self, message: &ConsumedMessage) -> Result<()> {
        // Stored offsets name the next message to read
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(
            &message.topic,
            message.partition,
            Offset::Offset(message.offset + 1),
        )?;
        self.consumer.store_offsets(&tpl)?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        match self.consumer.commit_consumer_state(CommitMode::Sync) {
            Ok(()) => Ok(()),
            // Nothing stored since the last commit
            Err(rdkafka::error::KafkaError::ConsumerCommit(
                rdkafka::types::RDKafkaErrorCode::NoOffset,
            )) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
