// Copyright (c) 2026 Remediator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Stage Runtime
//!
//! Every pipeline component runs as a [`Stage`]: a sequential consumer of its
//! input topics that turns each message into zero or more outbound messages.
//! [`run_stage`] owns the loop; stages only decode, process and encode.
//!
//! | Stage | Consumes | Produces |
//! |-------|----------|----------|
//! | [`EnricherStage`] | `events.normalized` | `events.<domain>` |
//! | [`PolicyStage`] | `decisions.{k8s,infra,db}` | `actions.approved` |
//! | [`ExecutorStage`] | `actions.approved` | `actions.status` |
//!
//! Malformed payloads are logged and dropped. Publish failures are logged and
//! the message is not re-queued. Shutdown is observed between messages; a
//! dispatch in flight always completes.

use anyhow::Context;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::application::enricher::EnrichmentService;
use crate::application::executor::ActionExecutor;
use crate::application::policy_gate::{PolicyGate, Verdict};
use crate::domain::events::{Action, Decision, NormalizedEvent};
use crate::domain::messaging::{topics, BusError, BusMessage, MessageBus};
use crate::infrastructure::metrics;

/// Upper bound on a single consumer poll; also bounds shutdown latency.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Enricher,
    Policy,
    Executor,
}

impl StageKind {
    pub const ALL: [StageKind; 3] = [StageKind::Enricher, StageKind::Policy, StageKind::Executor];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Enricher => "enricher",
            StageKind::Policy => "policy",
            StageKind::Executor => "executor",
        }
    }

    /// Consumer group for this stage: `<prefix>-<stage>`.
    pub fn group_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.as_str())
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message a stage wants published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub topic: String,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

impl Outbound {
    pub fn json<T: serde::Serialize>(topic: impl Into<String>, key: Option<String>, value: &T) -> anyhow::Result<Self> {
        let topic = topic.into();
        let payload = serde_json::to_vec(value).with_context(|| format!("Failed to encode message for {}", topic))?;
        Ok(Self { topic, key, payload })
    }
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn kind(&self) -> StageKind;

    fn input_topics(&self) -> Vec<String>;

    /// Process one payload. An `Err` means the message is dropped.
    async fn handle(&self, payload: &[u8]) -> anyhow::Result<Vec<Outbound>>;
}

/// Consume until `shutdown` is cancelled or the bus closes.
///
/// Fails only when the subscription cannot be created.
pub async fn run_stage(
    stage: Arc<dyn Stage>,
    bus: Arc<dyn MessageBus>,
    group_id: &str,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let name = stage.kind().as_str();
    let input_topics = stage.input_topics();
    let mut consumer = bus
        .subscribe(&input_topics, group_id)
        .await
        .with_context(|| format!("Failed to create {} consumer", name))?;

    info!(stage = name, group_id, topics = ?input_topics, "Stage started");

    while !shutdown.is_cancelled() {
        let message = match consumer.poll(POLL_TIMEOUT).await {
            Ok(Some(message)) => message,
            Ok(None) => continue,
            Err(BusError::Closed) => {
                warn!(stage = name, "Message bus closed, stopping stage");
                break;
            }
            Err(e) => {
                warn!(stage = name, error = %e, "Consumer error");
                continue;
            }
        };

        process_message(stage.as_ref(), bus.as_ref(), &message).await;
    }

    info!(stage = name, "Stage stopped");
    Ok(())
}

/// Handle one consumed message and publish its outputs. Returns how many
/// outbound messages were published.
pub async fn process_message(stage: &dyn Stage, bus: &dyn MessageBus, message: &BusMessage) -> usize {
    let name = stage.kind().as_str();
    let started = Instant::now();

    let outputs = match stage.handle(&message.payload).await {
        Ok(outputs) => outputs,
        Err(e) => {
            let reason = format!("{:#}", e);
            error!(stage = name, topic = %message.topic, error = %reason, "Dropping message");
            metrics::record_event_processed(name, "error", started.elapsed());
            return 0;
        }
    };

    let mut published = 0;
    for outbound in outputs {
        match bus
            .publish(&outbound.topic, outbound.key.as_deref(), outbound.payload)
            .await
        {
            Ok(()) => {
                metrics::record_message_published(&outbound.topic);
                debug!(stage = name, topic = %outbound.topic, "Published");
                published += 1;
            }
            Err(e) => error!(stage = name, topic = %outbound.topic, error = %e, "Publish failed, message not re-queued"),
        }
    }

    metrics::record_event_processed(name, "success", started.elapsed());
    published
}

fn decode<T: serde::de::DeserializeOwned>(payload: &[u8], what: &str) -> anyhow::Result<T> {
    serde_json::from_slice(payload).with_context(|| format!("Malformed {} payload", what))
}

pub struct EnricherStage {
    service: EnrichmentService,
}

impl EnricherStage {
    pub fn new(service: EnrichmentService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Stage for EnricherStage {
    fn kind(&self) -> StageKind {
        StageKind::Enricher
    }

    fn input_topics(&self) -> Vec<String> {
        vec![topics::EVENTS_NORMALIZED.to_string()]
    }

    async fn handle(&self, payload: &[u8]) -> anyhow::Result<Vec<Outbound>> {
        let event: NormalizedEvent = decode(payload, "NormalizedEvent")?;
        metrics::record_event_received(self.kind().as_str(), &event.severity);

        let enriched = self.service.enrich(event).await;
        let topic = topics::domain_events(enriched.domain);
        info!(
            event_id = %enriched.event_id,
            domain = %enriched.domain,
            service = %enriched.service_name,
            topic = %topic,
            "Routing enriched event"
        );

        let key = Some(enriched.event_id.to_string());
        Ok(vec![Outbound::json(topic, key, &enriched)?])
    }
}

pub struct PolicyStage {
    gate: PolicyGate,
}

impl PolicyStage {
    pub fn new(gate: PolicyGate) -> Self {
        Self { gate }
    }
}

#[async_trait]
impl Stage for PolicyStage {
    fn kind(&self) -> StageKind {
        StageKind::Policy
    }

    fn input_topics(&self) -> Vec<String> {
        topics::DECISIONS.iter().map(|t| t.to_string()).collect()
    }

    async fn handle(&self, payload: &[u8]) -> anyhow::Result<Vec<Outbound>> {
        let decision: Decision = decode(payload, "Decision")?;
        metrics::record_event_received(self.kind().as_str(), "none");

        let mut outputs = Vec::new();
        for verdict in self.gate.process_decision(decision).await {
            match verdict {
                Verdict::Approved(action) => {
                    metrics::record_policy_decision("approved");
                    outputs.push(Outbound::json(
                        topics::ACTIONS_APPROVED,
                        Some(action.target.clone()),
                        &action,
                    )?);
                }
                Verdict::Rejected { violation, .. } => metrics::record_policy_decision(violation.rule()),
            }
        }
        Ok(outputs)
    }
}

pub struct ExecutorStage {
    executor: ActionExecutor,
}

impl ExecutorStage {
    pub fn new(executor: ActionExecutor) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl Stage for ExecutorStage {
    fn kind(&self) -> StageKind {
        StageKind::Executor
    }

    fn input_topics(&self) -> Vec<String> {
        vec![topics::ACTIONS_APPROVED.to_string()]
    }

    async fn handle(&self, payload: &[u8]) -> anyhow::Result<Vec<Outbound>> {
        let action: Action = decode(payload, "Action")?;
        metrics::record_event_received(self.kind().as_str(), "none");

        let status = self.executor.execute(&action).await;
        metrics::record_action_executed(&action.action_type, status.is_success());

        let key = Some(status.action_id.to_string());
        Ok(vec![Outbound::json(topics::ACTIONS_STATUS, key, &status)?])
    }
}
