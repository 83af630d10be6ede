// Copyright (c) 2026 Remediator Contributors
// SPDX-License-Identifier: AGPL-3.0

// In-Memory Message Bus
//
// One tokio broadcast channel per topic. Each topic behaves like a single
// partition: subscribers see messages in publish order. Nothing is retained,
// so a consumer only receives messages published after it subscribed.
//
// Used when every stage runs in one process, and by the tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{StreamExt, StreamMap};
use tracing::{debug, warn};

use crate::domain::messaging::{BusConsumer, BusError, BusMessage, MessageBus};

#[derive(Clone)]
pub struct InMemoryMessageBus {
    topics: Arc<Mutex<HashMap<String, broadcast::Sender<BusMessage>>>>,
    capacity: usize,
}

impl InMemoryMessageBus {
    /// Capacity is per topic; slow consumers past it lose the oldest messages.
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<BusMessage> {
        let mut topics = self.topics.lock();
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Number of live consumers on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .get(topic)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for InMemoryMessageBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[async_trait]
impl MessageBus for InMemoryMessageBus {
    async fn publish(&self, topic: &str, key: Option<&str>, payload: Vec<u8>) -> Result<(), BusError> {
        let message = BusMessage {
            topic: topic.to_string(),
            key: key.map(str::to_string),
            payload,
        };

        // send() only fails when there are no receivers
        let receiver_count = self.sender(topic).send(message).unwrap_or(0);
        if receiver_count == 0 {
            debug!(topic, "No subscribers listening on topic");
        }
        Ok(())
    }

    async fn subscribe(&self, topics: &[String], group_id: &str) -> Result<Box<dyn BusConsumer>, BusError> {
        let mut streams = StreamMap::new();
        for topic in topics {
            let receiver = self.sender(topic).subscribe();
            streams.insert(topic.clone(), BroadcastStream::new(receiver));
        }
        debug!(group_id, ?topics, "Subscribed to in-memory topics");
        Ok(Box::new(InMemoryConsumer { streams }))
    }
}

pub struct InMemoryConsumer {
    streams: StreamMap<String, BroadcastStream<BusMessage>>,
}

#[async_trait]
impl BusConsumer for InMemoryConsumer {
    async fn poll(&mut self, timeout: Duration) -> Result<Option<BusMessage>, BusError> {
        match tokio::time::timeout(timeout, self.streams.next()).await {
            Err(_) => Ok(None),
            Ok(None) => Err(BusError::Closed),
            Ok(Some((_, Ok(message)))) => Ok(Some(message)),
            Ok(Some((topic, Err(err)))) => {
                warn!(topic = %topic, "In-memory consumer fell behind: {}", err);
                Err(BusError::Receive(format!("'{}': {}", topic, err)))
            }
        }
    }
}
