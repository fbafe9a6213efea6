//! In-process message source for development and tests

use super::{ConsumedMessage, MessageSource};
use crate::{Error, Result};

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::Notify;

enum Entry {
    Message(ConsumedMessage),
    Error(String),
}

/// Single-partition queue of payloads with offset tracking
pub struct MemorySource {
    topic: String,
    queue: Mutex<VecDeque<Entry>>,
    next_offset: Mutex<i64>,
    acknowledged: Mutex<Vec<i64>>,
    /// When false, an empty queue waits for more input instead of ending
    end_when_drained: bool,
    notify: Notify,
}

impl MemorySource {
    /// A source that reports exhaustion once its queue is empty.
    pub fn new(topic: impl Into<String>) -> Self {
        Self::build(topic.into(), true)
    }

    /// A source that waits for more messages when empty, like a live topic.
    pub fn streaming(topic: impl Into<String>) -> Self {
        Self::build(topic.into(), false)
    }

    fn build(topic: String, end_when_drained: bool) -> Self {
        Self {
            topic,
            queue: Mutex::new(VecDeque::new()),
            next_offset: Mutex::new(0),
            acknowledged: Mutex::new(Vec::new()),
            end_when_drained,
            notify: Notify::new(),
        }
    }

    /// Append a payload at the next offset and return that offset.
    pub fn push(&self, payload: Vec<u8>) -> i64 {
        self.push_message(Some(payload))
    }

    /// Append a message, which may have no payload at all.
    pub fn push_message(&self, payload: Option<Vec<u8>>) -> i64 {
        let offset = {
            let mut next = self.next_offset.lock();
            let offset = *next;
            *next += 1;
            offset
        };
        self.queue.lock().push_back(Entry::Message(ConsumedMessage {
            topic: self.topic.clone(),
            partition: 0,
            offset,
            payload,
        }));
        self.notify.notify_one();
        offset
    }

    /// Make the next poll fail with a broker error.
    pub fn push_error(&self, message: impl Into<String>) {
        self.queue.lock().push_back(Entry::Error(message.into()));
        self.notify.notify_one();
    }

    /// Offsets acknowledged so far, in acknowledgement order
    pub fn acknowledged(&self) -> Vec<i64> {
        self.acknowledged.lock().clone()
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}

#[async_trait]
impl MessageSource for MemorySource {
    async fn next_message(&self) -> Result<Option<ConsumedMessage>> {
        loop {
            let notified = self.notify.notified();
            let entry = self.queue.lock().pop_front();
            match entry {
                Some(Entry::Message(message)) => return Ok(Some(message)),
                Some(Entry::Error(e)) => return Err(Error::Broker(e)),
                None if self.end_when_drained => return Ok(None),
                None => {}
            }
            notified.await;
        }
    }

    async fn acknowledge(&self, message: &ConsumedMessage) -> Result<()> {
        self.acknowledged.lock().push(message.offset);
        Ok(())
    }
}
