// Copyright (c) 2026 Remediator Contributors
// SPDX-License-Identifier: AGPL-3.0

// Kafka Message Bus
//
// Partitioned-log transport for running each stage as its own process.
// Consumers join `<group_prefix>-<stage>` and start from the earliest offset
// when the group has no committed position. Offsets are auto-committed, so a
// crash mid-dispatch can replay or skip an action (no exactly-once).

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::info;

use crate::domain::messaging::{BusConsumer, BusError, BusMessage, MessageBus};

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

pub struct KafkaMessageBus {
    bootstrap_servers: String,
    producer: FutureProducer,
}

impl KafkaMessageBus {
    pub fn connect(bootstrap_servers: &str) -> Result<Self, BusError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| BusError::Connect(format!("producer for {}: {}", bootstrap_servers, e)))?;

        info!(bootstrap_servers, "Kafka producer created");
        Ok(Self {
            bootstrap_servers: bootstrap_servers.to_string(),
            producer,
        })
    }
}

#[async_trait]
impl MessageBus for KafkaMessageBus {
    async fn publish(&self, topic: &str, key: Option<&str>, payload: Vec<u8>) -> Result<(), BusError> {
        let mut record = FutureRecord::<str, [u8]>::to(topic).payload(payload.as_slice());
        if let Some(key) = key {
            record = record.key(key);
        }

        self.producer
            .send(record, Timeout::After(PUBLISH_TIMEOUT))
            .await
            .map(|_| ())
            .map_err(|(e, _)| BusError::Publish {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    async fn subscribe(&self, topics: &[String], group_id: &str) -> Result<Box<dyn BusConsumer>, BusError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.bootstrap_servers)
            .set("group.id", group_id)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "true")
            .create()
            .map_err(|e| BusError::Connect(format!("consumer group {}: {}", group_id, e)))?;

        let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
        consumer
            .subscribe(&topic_refs)
            .map_err(|e| BusError::Connect(format!("subscribe {:?}: {}", topics, e)))?;

        info!(group_id, ?topics, "Kafka consumer subscribed");
        Ok(Box::new(KafkaConsumer { consumer }))
    }
}

pub struct KafkaConsumer {
    consumer: StreamConsumer,
}

#[async_trait]
impl BusConsumer for KafkaConsumer {
    async fn poll(&mut self, timeout: Duration) -> Result<Option<BusMessage>, BusError> {
        match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Err(_) => Ok(None),
            Ok(Err(e)) => Err(BusError::Receive(e.to_string())),
            Ok(Ok(message)) => Ok(Some(BusMessage {
                topic: message.topic().to_string(),
                key: message.key().map(|k| String::from_utf8_lossy(k).into_owned()),
                payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
            })),
        }
    }
}
