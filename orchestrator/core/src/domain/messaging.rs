// Copyright (c) 2026 Remediator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Message Bus Port
//!
//! Topic-oriented publish/subscribe contract between pipeline stages.
//! Ordering is only guaranteed within a single partition of a topic.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::domain::events::Domain;

pub mod topics {
    use super::Domain;

    pub const EVENTS_NORMALIZED: &str = "events.normalized";
    pub const ACTIONS_APPROVED: &str = "actions.approved";
    pub const ACTIONS_STATUS: &str = "actions.status";

    pub const DECISIONS: [&str; 3] = ["decisions.k8s", "decisions.infra", "decisions.db"];

    pub fn domain_events(domain: Domain) -> String {
        format!("events.{}", domain)
    }

    pub fn decisions(domain: Domain) -> String {
        format!("decisions.{}", domain)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub topic: String,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum BusError {
    #[error("failed to connect to message bus: {0}")]
    Connect(String),
    #[error("failed to publish to '{topic}': {reason}")]
    Publish { topic: String, reason: String },
    #[error("failed to receive: {0}")]
    Receive(String),
    #[error("message bus is closed")]
    Closed,
}

#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, topic: &str, key: Option<&str>, payload: Vec<u8>) -> Result<(), BusError>;

    /// Join `group_id` and consume `topics`. Construction failures are fatal to the caller.
    async fn subscribe(&self, topics: &[String], group_id: &str) -> Result<Box<dyn BusConsumer>, BusError>;
}

#[async_trait]
pub trait BusConsumer: Send {
    /// Next message, or `Ok(None)` when nothing arrived within `timeout`.
    async fn poll(&mut self, timeout: Duration) -> Result<Option<BusMessage>, BusError>;
}
