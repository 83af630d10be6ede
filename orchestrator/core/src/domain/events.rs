// Copyright (c) 2026 Remediator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Pipeline Messages
//!
//! Wire types exchanged between pipeline stages over the message bus:
//!
//! | Type | Topic | Producer |
//! |------|-------|----------|
//! | [`NormalizedEvent`] | `events.normalized` | ingestion |
//! | [`DomainEvent`] | `events.{k8s,infra,db}` | enricher |
//! | [`Decision`] | `decisions.{k8s,infra,db}` | analysis |
//! | [`Action`] | `actions.approved` | policy gate |
//! | [`ActionStatus`] | `actions.status` | executor |
//!
//! All messages are JSON with snake_case field names. camelCase aliases are
//! accepted on input so protojson-encoded producers interoperate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// Tag stamped on every action the policy gate admits.
pub const AUTO_APPROVER: &str = "policy_engine_auto";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(pub String);

impl ActionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Random v4 id for actions proposed without one.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Coarse incident category used to route events and decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    K8s,
    Infra,
    Db,
}

impl Domain {
    pub const ALL: [Domain; 3] = [Domain::K8s, Domain::Infra, Domain::Db];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::K8s => "k8s",
            Domain::Infra => "infra",
            Domain::Db => "db",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "k8s" => Some(Domain::K8s),
            "infra" => Some(Domain::Infra),
            "db" => Some(Domain::Db),
            _ => None,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert as emitted by the ingestion endpoint. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    #[serde(alias = "eventId")]
    pub event_id: EventId,
    #[serde(default)]
    pub source: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub severity: String,
    #[serde(default, alias = "rawPayload")]
    pub raw_payload: Map<String, Value>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Classified and enriched event, created once by the enricher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    #[serde(alias = "eventId")]
    pub event_id: EventId,
    pub domain: Domain,
    #[serde(alias = "clusterId")]
    pub cluster_id: String,
    #[serde(alias = "serviceName")]
    pub service_name: String,
    #[serde(default, alias = "relatedResources")]
    pub related_resources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Map<String, Value>>,
    #[serde(alias = "originalEvent")]
    pub original_event: NormalizedEvent,
}

/// Remediation proposal produced by the analysis stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    #[serde(alias = "decisionId")]
    pub decision_id: String,
    #[serde(default, alias = "incidentId")]
    pub incident_id: String,
    #[serde(default)]
    pub analysis: String,
    #[serde(default, alias = "proposedActions")]
    pub proposed_actions: Vec<Action>,
    #[serde(default, alias = "confidenceScore")]
    pub confidence_score: f64,
}

/// A single remediation step.
///
/// `approver` is empty until the policy gate admits the action; [`Action::approve`]
/// is the only mutation an action ever sees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Generated when absent, since every status must name its action.
    #[serde(default = "ActionId::generate", alias = "actionId")]
    pub action_id: ActionId,
    #[serde(default, alias = "decisionId")]
    pub decision_id: String,
    #[serde(alias = "actionType")]
    pub action_type: String,
    pub target: String,
    #[serde(default)]
    pub params: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approver: Option<String>,
}

impl Action {
    /// Namespace named by `params.namespace`, `default` when absent or empty.
    pub fn namespace(&self) -> &str {
        match self.params.get("namespace") {
            Some(ns) if !ns.is_empty() => ns,
            _ => "default",
        }
    }

    /// Rate-limit key: `<action_type>:<target>`.
    pub fn rate_limit_key(&self) -> String {
        format!("{}:{}", self.action_type, self.target)
    }

    pub fn approve(mut self) -> Self {
        self.approver = Some(AUTO_APPROVER.to_string());
        self
    }

    pub fn is_approved(&self) -> bool {
        self.approver.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionOutcome {
    Success,
    Failed,
}

/// Terminal result of dispatching one action. Exactly one per dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStatus {
    #[serde(alias = "actionId")]
    pub action_id: ActionId,
    pub status: ExecutionOutcome,
    #[serde(default)]
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

impl ActionStatus {
    pub fn success(action_id: ActionId) -> Self {
        Self {
            action_id,
            status: ExecutionOutcome::Success,
            error: String::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn failed(action_id: ActionId, error: impl Into<String>) -> Self {
        Self {
            action_id,
            status: ExecutionOutcome::Failed,
            error: error.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionOutcome::Success
    }
}
