// Copyright (c) 2026 Remediator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Alert Classification
//!
//! Pure functions over an alert's raw payload:
//!
//! - [`classify`] walks [`DOMAIN_RULES`], an ordered `predicate -> domain`
//!   table, and returns the domain of the first matching rule
//!   ([`Domain::Infra`] when none match).
//! - [`resolve_service_name`] checks [`SERVICE_NAME_PATHS`] in order and returns
//!   the first non-empty string, or [`UNKNOWN_SERVICE`].

use serde_json::{Map, Value};

use crate::domain::events::Domain;

/// Sentinel service name when nothing in the payload identifies the service.
pub const UNKNOWN_SERVICE: &str = "unknown-service";

/// One entry of the classification table.
pub struct DomainRule {
    pub name: &'static str,
    pub matches: fn(&Map<String, Value>) -> bool,
    pub domain: Domain,
}

/// Evaluated top to bottom; first match wins.
pub static DOMAIN_RULES: &[DomainRule] = &[
    DomainRule {
        name: "source-cluster-native",
        matches: source_is_cluster_native,
        domain: Domain::K8s,
    },
    DomainRule {
        name: "source-datastore",
        matches: source_is_datastore,
        domain: Domain::Db,
    },
    DomainRule {
        name: "alert-message-bus-terms",
        matches: alert_mentions_message_bus,
        domain: Domain::Infra,
    },
    DomainRule {
        name: "alert-workload-terms",
        matches: alert_mentions_workload,
        domain: Domain::K8s,
    },
];

pub const DEFAULT_DOMAIN: Domain = Domain::Infra;

const CLUSTER_NATIVE_SOURCES: &[&str] = &["kubernetes", "k8s"];
const DATASTORE_SOURCES: &[&str] = &["postgres", "mysql", "mongodb"];
const MESSAGE_BUS_TERMS: &[&str] = &["Kafka", "Consumer", "Topic"];
const WORKLOAD_TERMS: &[&str] = &["Pod", "Node", "Deployment"];

/// Payload paths checked for the service name, in priority order.
pub const SERVICE_NAME_PATHS: &[&[&str]] = &[
    &["service_name"],
    &["service"],
    &["commonLabels", "pod"],
    &["labels", "pod"],
    &["labels", "service"],
    &["metadata", "service"],
    &["metadata", "pod"],
];

/// Returns the matching rule too, so callers can log why.
pub fn classify_with_rule(payload: &Map<String, Value>) -> (Domain, Option<&'static str>) {
    DOMAIN_RULES
        .iter()
        .find(|rule| (rule.matches)(payload))
        .map(|rule| (rule.domain, Some(rule.name)))
        .unwrap_or((DEFAULT_DOMAIN, None))
}

pub fn classify(payload: &Map<String, Value>) -> Domain {
    classify_with_rule(payload).0
}

pub fn resolve_service_name(payload: &Map<String, Value>) -> String {
    SERVICE_NAME_PATHS
        .iter()
        .find_map(|path| lookup_str(payload, path).filter(|s| !s.is_empty()))
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN_SERVICE.to_string())
}

fn lookup_str<'a>(payload: &'a Map<String, Value>, path: &[&str]) -> Option<&'a str> {
    let (last, parents) = path.split_last()?;
    let mut current = payload;
    for key in parents {
        current = current.get(*key)?.as_object()?;
    }
    current.get(*last)?.as_str()
}

fn field<'a>(payload: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(Value::as_str)
}

fn source_is_cluster_native(payload: &Map<String, Value>) -> bool {
    field(payload, "source").is_some_and(|s| CLUSTER_NATIVE_SOURCES.contains(&s))
}

fn source_is_datastore(payload: &Map<String, Value>) -> bool {
    field(payload, "source").is_some_and(|s| DATASTORE_SOURCES.contains(&s))
}

fn alert_mentions_message_bus(payload: &Map<String, Value>) -> bool {
    field(payload, "alert").is_some_and(|a| MESSAGE_BUS_TERMS.iter().any(|t| a.contains(t)))
}

fn alert_mentions_workload(payload: &Map<String, Value>) -> bool {
    field(payload, "alert").is_some_and(|a| WORKLOAD_TERMS.iter().any(|t| a.contains(t)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_kubernetes_source_wins_over_alert_text() {
        let p = payload(json!({"source": "kubernetes", "alert": "KafkaConsumerLag"}));
        assert_eq!(classify(&p), Domain::K8s);
        assert_eq!(classify_with_rule(&p).1, Some("source-cluster-native"));
    }

    #[test]
    fn test_datastore_sources_classify_as_db() {
        for source in ["postgres", "mysql", "mongodb"] {
            let p = payload(json!({"source": source, "alert": "PodCrashLooping"}));
            assert_eq!(classify(&p), Domain::Db, "source {}", source);
        }
    }

    #[test]
    fn test_consumer_alert_classifies_as_infra() {
        let p = payload(json!({"source": "alertmanager", "alert": "ConsumerLagHigh"}));
        assert_eq!(classify(&p), Domain::Infra);
        assert_eq!(classify_with_rule(&p).1, Some("alert-message-bus-terms"));
    }

    #[test]
    fn test_message_bus_terms_checked_before_workload_terms() {
        let p = payload(json!({"alert": "KafkaPodRestarting"}));
        assert_eq!(classify(&p), Domain::Infra);

        let p = payload(json!({"alert": "DeploymentReplicasMismatch"}));
        assert_eq!(classify(&p), Domain::K8s);
    }

    #[test]
    fn test_default_domain_is_infra() {
        assert_eq!(classify(&Map::new()), Domain::Infra);
        let p = payload(json!({"source": 42, "alert": "DiskFull"}));
        assert_eq!(classify_with_rule(&p), (Domain::Infra, None));
    }

    #[test]
    fn test_service_name_priority_order() {
        let p = payload(json!({
            "service": "second",
            "labels": {"pod": "fourth", "service": "fifth"},
            "commonLabels": {"pod": "third"},
            "metadata": {"service": "sixth", "pod": "seventh"}
        }));
        assert_eq!(resolve_service_name(&p), "second");

        let p = payload(json!({
            "labels": {"service": "fifth"},
            "metadata": {"pod": "seventh"}
        }));
        assert_eq!(resolve_service_name(&p), "fifth");

        let p = payload(json!({"metadata": {"pod": "seventh"}}));
        assert_eq!(resolve_service_name(&p), "seventh");
    }

    #[test]
    fn test_empty_and_non_string_names_are_skipped() {
        let p = payload(json!({
            "service_name": "",
            "service": 7,
            "commonLabels": {"pod": "kafka-ingest"}
        }));
        assert_eq!(resolve_service_name(&p), "kafka-ingest");
    }

    #[test]
    fn test_unknown_service_sentinel() {
        let p = payload(json!({"labels": "not-an-object"}));
        assert_eq!(resolve_service_name(&p), UNKNOWN_SERVICE);
    }
}
