// Copyright (c) 2026 Remediator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Enrichment Service
//!
//! Turns a [`NormalizedEvent`] into exactly one [`DomainEvent`]. Classification
//! and service-name resolution are pure (see
//! [`crate::domain::classification`]); related-resource discovery asks the
//! cluster inventory when one is available.
//!
//! Enrichment never fails. A missing inventory, an unresolved service name or
//! an inventory error all yield an empty `related_resources`.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::classification::{classify_with_rule, resolve_service_name, UNKNOWN_SERVICE};
use crate::domain::cluster::ClusterInventory;
use crate::domain::events::{DomainEvent, NormalizedEvent};

pub struct EnrichmentService {
    inventory: Option<Arc<dyn ClusterInventory>>,
    cluster_id: String,
    namespace: String,
}

impl EnrichmentService {
    pub fn new(
        inventory: Option<Arc<dyn ClusterInventory>>,
        cluster_id: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            inventory,
            cluster_id: cluster_id.into(),
            namespace: namespace.into(),
        }
    }

    pub async fn enrich(&self, event: NormalizedEvent) -> DomainEvent {
        let (domain, rule) = classify_with_rule(&event.raw_payload);
        let service_name = resolve_service_name(&event.raw_payload);
        let related_resources = self.related_resources(&service_name).await;

        debug!(
            event_id = %event.event_id,
            %domain,
            rule = rule.unwrap_or("default"),
            service = %service_name,
            related = related_resources.len(),
            "Event enriched"
        );

        DomainEvent {
            event_id: event.event_id.clone(),
            domain,
            cluster_id: self.cluster_id.clone(),
            service_name,
            related_resources,
            metrics: None,
            original_event: event,
        }
    }

    /// `deployment/<name>` followed by `pod/<pod>` for each pod labelled
    /// `app=<name>`, when a deployment with exactly that name exists.
    async fn related_resources(&self, service_name: &str) -> Vec<String> {
        let Some(inventory) = &self.inventory else {
            return Vec::new();
        };
        if service_name == UNKNOWN_SERVICE {
            return Vec::new();
        }

        let deployment = match inventory.find_deployment(&self.namespace, service_name).await {
            Ok(Some(deployment)) => deployment,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(service = service_name, error = %e, "Deployment lookup failed, skipping enrichment");
                return Vec::new();
            }
        };

        let mut resources = vec![format!("deployment/{}", deployment)];
        match inventory
            .list_pods(&self.namespace, &format!("app={}", service_name))
            .await
        {
            Ok(pods) => resources.extend(pods.into_iter().map(|pod| format!("pod/{}", pod))),
            Err(e) => warn!(service = service_name, error = %e, "Pod listing failed"),
        }
        resources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cluster::ClusterError;
    use crate::domain::events::{Domain, EventId};
    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;
    use serde_json::{json, Map, Value};
    use std::collections::HashMap;

    struct MockInventory {
        deployments: Vec<&'static str>,
        pods: Vec<&'static str>,
        fail: bool,
        queries: Mutex<Vec<String>>,
    }

    impl MockInventory {
        fn new(deployments: Vec<&'static str>, pods: Vec<&'static str>) -> Self {
            Self {
                deployments,
                pods,
                fail: false,
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ClusterInventory for MockInventory {
        async fn find_deployment(&self, namespace: &str, name: &str) -> Result<Option<String>, ClusterError> {
            self.queries.lock().push(format!("{}/{}", namespace, name));
            if self.fail {
                return Err(ClusterError::Api("connection refused".into()));
            }
            Ok(self.deployments.contains(&name).then(|| name.to_string()))
        }

        async fn list_pods(&self, _namespace: &str, label_selector: &str) -> Result<Vec<String>, ClusterError> {
            self.queries.lock().push(label_selector.to_string());
            Ok(self.pods.iter().map(|p| p.to_string()).collect())
        }
    }

    fn event(payload: Value) -> NormalizedEvent {
        let raw_payload: Map<String, Value> = serde_json::from_value(payload).unwrap();
        NormalizedEvent {
            event_id: EventId::new("evt-1"),
            source: "alertmanager".into(),
            timestamp: Utc::now(),
            severity: "critical".into(),
            raw_payload,
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_enrich_discovers_deployment_and_pods() {
        let inventory = Arc::new(MockInventory::new(vec!["kafka-ingest"], vec!["kafka-ingest-7f9-a", "kafka-ingest-7f9-b"]));
        let service = EnrichmentService::new(Some(inventory.clone()), "prod-eu", "default");

        let enriched = service
            .enrich(event(json!({"alert": "Consumer lag high", "service": "kafka-ingest"})))
            .await;

        assert_eq!(enriched.event_id.as_str(), "evt-1");
        assert_eq!(enriched.domain, Domain::Infra);
        assert_eq!(enriched.cluster_id, "prod-eu");
        assert_eq!(enriched.service_name, "kafka-ingest");
        assert_eq!(
            enriched.related_resources,
            vec![
                "deployment/kafka-ingest",
                "pod/kafka-ingest-7f9-a",
                "pod/kafka-ingest-7f9-b"
            ]
        );
        assert_eq!(
            *inventory.queries.lock(),
            vec!["default/kafka-ingest".to_string(), "app=kafka-ingest".to_string()]
        );
    }

    #[tokio::test]
    async fn test_no_matching_deployment_yields_empty_resources() {
        let inventory = Arc::new(MockInventory::new(vec![], vec!["stray"]));
        let service = EnrichmentService::new(Some(inventory), "c", "default");
        let enriched = service.enrich(event(json!({"service_name": "web"}))).await;
        assert!(enriched.related_resources.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_service_skips_discovery() {
        let inventory = Arc::new(MockInventory::new(vec!["unknown-service"], vec![]));
        let service = EnrichmentService::new(Some(inventory.clone()), "c", "default");

        let enriched = service.enrich(event(json!({"alert": "Node NotReady"}))).await;

        assert_eq!(enriched.service_name, UNKNOWN_SERVICE);
        assert_eq!(enriched.domain, Domain::K8s);
        assert!(enriched.related_resources.is_empty());
        assert!(inventory.queries.lock().is_empty());
    }

    #[tokio::test]
    async fn test_inventory_errors_degrade_instead_of_failing() {
        let mut inventory = MockInventory::new(vec!["web"], vec![]);
        inventory.fail = true;
        let service = EnrichmentService::new(Some(Arc::new(inventory)), "c", "default");

        let enriched = service.enrich(event(json!({"service": "web"}))).await;
        assert_eq!(enriched.service_name, "web");
        assert!(enriched.related_resources.is_empty());
    }

    #[tokio::test]
    async fn test_enrich_without_inventory() {
        let service = EnrichmentService::new(None, "default-cluster", "default");
        let original = event(json!({"source": "kubernetes", "alert": "Kafka consumer lag", "labels": {"pod": "web-0"}}));

        let enriched = service.enrich(original.clone()).await;

        assert_eq!(enriched.domain, Domain::K8s);
        assert_eq!(enriched.service_name, "web-0");
        assert!(enriched.related_resources.is_empty());
        assert_eq!(enriched.original_event, original);
    }
}
