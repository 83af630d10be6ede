// Copyright (c) 2026 Remediator Contributors
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end tests for the remediation pipeline.
//!
//! All three stages run as real consumer loops over the in-memory bus. The
//! analysis collaborator is played by the test: it reads the enriched event and
//! publishes a Decision. The cluster is an in-memory fake that tracks replica
//! counts and restart stamps.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use remediator_core::application::backend_factory::{ClusterHandles, StageFactory};
use remediator_core::application::pipeline::{run_stage, StageKind};
use remediator_core::domain::action::ScaleRequest;
use remediator_core::domain::cluster::{
    ClusterBackend, ClusterError, ClusterInventory, RollbackOutcome, ScaleOutcome,
};
use remediator_core::domain::events::{
    Action, ActionId, ActionStatus, Decision, Domain, DomainEvent, EventId, ExecutionOutcome,
    NormalizedEvent,
};
use remediator_core::domain::messaging::{topics, BusConsumer, MessageBus};
use remediator_core::domain::pipeline_config::PipelineConfigSpec;
use remediator_core::infrastructure::event_bus::InMemoryMessageBus;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Fake cluster: `kafka-ingest` runs 2 replicas with two pods.
struct FakeCluster {
    replicas: Mutex<HashMap<String, i32>>,
    restarts: Mutex<Vec<String>>,
}

impl FakeCluster {
    fn new() -> Self {
        Self {
            replicas: Mutex::new(HashMap::from([("kafka-ingest".to_string(), 2)])),
            restarts: Mutex::new(Vec::new()),
        }
    }

    fn replicas(&self, name: &str) -> i32 {
        self.replicas.lock()[name]
    }

    fn not_found(kind: &'static str, namespace: &str, name: &str) -> ClusterError {
        ClusterError::NotFound {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl ClusterInventory for FakeCluster {
    async fn find_deployment(&self, _namespace: &str, name: &str) -> Result<Option<String>, ClusterError> {
        Ok(self.replicas.lock().contains_key(name).then(|| name.to_string()))
    }

    async fn list_pods(&self, _namespace: &str, label_selector: &str) -> Result<Vec<String>, ClusterError> {
        Ok(match label_selector {
            "app=kafka-ingest" => vec!["kafka-ingest-0".to_string(), "kafka-ingest-1".to_string()],
            _ => Vec::new(),
        })
    }
}

#[async_trait]
impl ClusterBackend for FakeCluster {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        Err(Self::not_found("pod", namespace, name))
    }

    async fn scale_deployment(
        &self,
        namespace: &str,
        name: &str,
        request: ScaleRequest,
    ) -> Result<ScaleOutcome, ClusterError> {
        let mut replicas = self.replicas.lock();
        let previous = *replicas
            .get(name)
            .ok_or_else(|| Self::not_found("deployment", namespace, name))?;
        let current = request.apply(previous)?;
        replicas.insert(name.to_string(), current);
        Ok(ScaleOutcome { previous, current })
    }

    async fn restart_deployment(
        &self,
        namespace: &str,
        name: &str,
        _restarted_at: DateTime<Utc>,
    ) -> Result<(), ClusterError> {
        if !self.replicas.lock().contains_key(name) {
            return Err(Self::not_found("deployment", namespace, name));
        }
        self.restarts.lock().push(name.to_string());
        Ok(())
    }

    async fn rollback_deployment(&self, _namespace: &str, name: &str) -> Result<RollbackOutcome, ClusterError> {
        Err(ClusterError::NoRolloutHistory(name.to_string()))
    }

    async fn pod_logs(&self, _namespace: &str, _name: &str, _tail_lines: i64) -> Result<String, ClusterError> {
        Ok(String::new())
    }

    async fn deployment_pods(&self, _namespace: &str, _name: &str) -> Result<Vec<String>, ClusterError> {
        Ok(Vec::new())
    }
}

struct Harness {
    bus: Arc<InMemoryMessageBus>,
    cluster: Arc<FakeCluster>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<anyhow::Result<()>>>,
}

impl Harness {
    async fn start() -> Self {
        let bus = Arc::new(InMemoryMessageBus::new(64));
        let cluster = Arc::new(FakeCluster::new());
        let handles = ClusterHandles {
            backend: cluster.clone(),
            inventory: Some(cluster.clone()),
        };
        let factory = StageFactory::new(PipelineConfigSpec::default(), handles);
        let shutdown = CancellationToken::new();

        let mut tasks = Vec::new();
        for kind in StageKind::ALL {
            let stage = factory.build(kind);
            let bus: Arc<dyn MessageBus> = bus.clone();
            let group_id = kind.group_id("test");
            let token = shutdown.clone();
            tasks.push(tokio::spawn(async move { run_stage(stage, bus, &group_id, token).await }));
        }

        // Wait until every stage has subscribed
        for topic in [topics::EVENTS_NORMALIZED, "decisions.infra", topics::ACTIONS_APPROVED] {
            tokio::time::timeout(Duration::from_secs(2), async {
                while bus.subscriber_count(topic) == 0 {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            })
            .await
            .expect("stage did not subscribe in time");
        }

        Self {
            bus,
            cluster,
            shutdown,
            tasks,
        }
    }

    async fn subscribe(&self, topic: &str) -> Box<dyn BusConsumer> {
        self.bus.subscribe(&[topic.to_string()], "observer").await.unwrap()
    }

    async fn publish<T: serde::Serialize>(&self, topic: &str, value: &T) {
        self.bus
            .publish(topic, None, serde_json::to_vec(value).unwrap())
            .await
            .unwrap();
    }

    async fn stop(self) {
        self.shutdown.cancel();
        for task in self.tasks {
            tokio::time::timeout(Duration::from_secs(2), task)
                .await
                .expect("stage did not stop")
                .unwrap()
                .unwrap();
        }
    }
}

async fn next<T: serde::de::DeserializeOwned>(consumer: &mut Box<dyn BusConsumer>) -> T {
    let message = consumer
        .poll(Duration::from_secs(5))
        .await
        .unwrap()
        .expect("no message within timeout");
    serde_json::from_slice(&message.payload).unwrap()
}

fn scale_action(id: &str) -> Action {
    Action {
        action_id: ActionId::new(id),
        decision_id: String::new(),
        action_type: "scale_deployment".to_string(),
        target: "deployment/kafka-ingest".to_string(),
        params: HashMap::from([
            ("namespace".to_string(), "default".to_string()),
            ("replicas_increment".to_string(), "1".to_string()),
        ]),
        reasoning: Some("consumer lag growing".to_string()),
        approver: None,
    }
}

#[tokio::test]
async fn test_kafka_ingest_scale_end_to_end() {
    let harness = Harness::start().await;
    let mut enriched_events = harness.subscribe("events.infra").await;
    let mut statuses = harness.subscribe(topics::ACTIONS_STATUS).await;

    let alert: NormalizedEvent = serde_json::from_value(json!({
        "event_id": "evt-kafka-1",
        "source": "alertmanager",
        "timestamp": "2026-03-01T12:00:00Z",
        "severity": "critical",
        "raw_payload": {
            "alert": "KafkaConsumerLagHigh: Consumer group behind",
            "labels": {"service": "kafka-ingest"}
        }
    }))
    .unwrap();
    harness.publish(topics::EVENTS_NORMALIZED, &alert).await;

    let enriched: DomainEvent = next(&mut enriched_events).await;
    assert_eq!(enriched.event_id, EventId::new("evt-kafka-1"));
    assert_eq!(enriched.domain, Domain::Infra);
    assert_eq!(enriched.cluster_id, "default-cluster");
    assert_eq!(enriched.service_name, "kafka-ingest");
    assert_eq!(
        enriched.related_resources,
        vec!["deployment/kafka-ingest", "pod/kafka-ingest-0", "pod/kafka-ingest-1"]
    );

    let decision = Decision {
        decision_id: "dec-kafka-1".to_string(),
        incident_id: enriched.event_id.to_string(),
        analysis: "Consumer lag; scale out".to_string(),
        proposed_actions: vec![scale_action("act-scale-1")],
        confidence_score: 0.92,
    };
    harness.publish(&topics::decisions(enriched.domain), &decision).await;

    let status: ActionStatus = next(&mut statuses).await;
    assert_eq!(status.action_id, ActionId::new("act-scale-1"));
    assert_eq!(status.status, ExecutionOutcome::Success);
    assert!(status.error.is_empty());
    assert_eq!(harness.cluster.replicas("kafka-ingest"), 3);

    harness.stop().await;
}

#[tokio::test]
async fn test_only_approved_actions_reach_executor() {
    let harness = Harness::start().await;
    let mut approved = harness.subscribe(topics::ACTIONS_APPROVED).await;
    let mut statuses = harness.subscribe(topics::ACTIONS_STATUS).await;

    let mut blocked = scale_action("act-blocked");
    blocked.params.insert("namespace".to_string(), "kube-system".to_string());
    let mut deletion = scale_action("act-delete");
    deletion.action_type = "delete_deployment".to_string();
    let mut restart = scale_action("act-restart");
    restart.action_type = "restart_pod".to_string();
    restart.target = "pod/kafka-ingest".to_string();

    let decision = Decision {
        decision_id: "dec-mixed".to_string(),
        incident_id: "evt-mixed".to_string(),
        analysis: String::new(),
        proposed_actions: vec![blocked, deletion, restart],
        confidence_score: 0.5,
    };
    harness.publish("decisions.infra", &decision).await;

    let forwarded: Action = next(&mut approved).await;
    assert_eq!(forwarded.action_id, ActionId::new("act-restart"));
    assert_eq!(forwarded.approver.as_deref(), Some("policy_engine_auto"));

    // Pod is gone, so the executor falls back to a rolling restart
    let status: ActionStatus = next(&mut statuses).await;
    assert_eq!(status.action_id, ActionId::new("act-restart"));
    assert!(status.is_success());
    assert_eq!(*harness.cluster.restarts.lock(), vec!["kafka-ingest".to_string()]);

    assert!(approved.poll(Duration::from_millis(100)).await.unwrap().is_none());
    assert_eq!(harness.cluster.replicas("kafka-ingest"), 2);

    harness.stop().await;
}

#[tokio::test]
async fn test_rate_limit_across_decisions() {
    let harness = Harness::start().await;
    let mut statuses = harness.subscribe(topics::ACTIONS_STATUS).await;

    for i in 0..4 {
        let decision = Decision {
            decision_id: format!("dec-{}", i),
            incident_id: format!("evt-{}", i),
            analysis: String::new(),
            proposed_actions: vec![scale_action(&format!("act-{}", i))],
            confidence_score: 0.9,
        };
        harness.publish("decisions.infra", &decision).await;
    }

    for i in 0..3 {
        let status: ActionStatus = next(&mut statuses).await;
        assert_eq!(status.action_id, ActionId::new(format!("act-{}", i)));
        assert!(status.is_success());
    }
    assert!(statuses.poll(Duration::from_millis(200)).await.unwrap().is_none());
    assert_eq!(harness.cluster.replicas("kafka-ingest"), 5);

    harness.stop().await;
}

#[tokio::test]
async fn test_malformed_messages_do_not_stop_stages() {
    let harness = Harness::start().await;
    let mut statuses = harness.subscribe(topics::ACTIONS_STATUS).await;

    harness
        .bus
        .publish(topics::ACTIONS_APPROVED, None, b"not json".to_vec())
        .await
        .unwrap();
    harness
        .publish(topics::ACTIONS_APPROVED, &scale_action("act-after-garbage").approve())
        .await;

    let status: ActionStatus = next(&mut statuses).await;
    assert_eq!(status.action_id, ActionId::new("act-after-garbage"));
    assert!(status.is_success());

    harness.stop().await;
}
