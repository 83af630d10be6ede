// Copyright (c) 2026 Remediator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Cluster Ports
//!
//! Interfaces the pipeline uses to read from and mutate a cluster.
//!
//! | Trait | Used by | Implementations |
//! |-------|---------|-----------------|
//! | [`ClusterInventory`] | enricher | `KubeClusterBackend` |
//! | [`ClusterBackend`] | executor | `KubeClusterBackend`, `SimulatedClusterBackend` |
//!
//! The executor's backend is chosen once at startup; handlers never branch on
//! whether a live cluster exists.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::action::{ScaleParamError, ScaleRequest};

/// Pod-template annotation that triggers a rollout when changed.
pub const RESTARTED_AT_ANNOTATION: &str = "kubectl.kubernetes.io/restartedAt";
pub const REVISION_ANNOTATION: &str = "deployment.kubernetes.io/revision";

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("{kind} '{name}' not found in namespace '{namespace}'")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },
    #[error("cluster API error: {0}")]
    Api(String),
    #[error("invalid target '{0}'")]
    InvalidTarget(String),
    #[error(transparent)]
    InvalidParams(#[from] ScaleParamError),
    #[error("no previous revision to roll back to for deployment/{0}")]
    NoRolloutHistory(String),
    #[error("{0}")]
    Unsupported(String),
}

impl ClusterError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleOutcome {
    pub previous: i32,
    pub current: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackOutcome {
    pub from_revision: Option<i64>,
    pub to_revision: i64,
}

/// Read-only lookups for enrichment.
#[async_trait]
pub trait ClusterInventory: Send + Sync {
    /// Exact-name deployment lookup; `Ok(None)` when absent.
    async fn find_deployment(&self, namespace: &str, name: &str) -> Result<Option<String>, ClusterError>;

    /// Names of pods matching `label_selector` (e.g. `app=web`).
    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<String>, ClusterError>;
}

/// Mutating primitives the executor dispatches to.
#[async_trait]
pub trait ClusterBackend: Send + Sync {
    /// Short name for logs (`kubernetes`, `simulation`).
    fn name(&self) -> &'static str;

    /// A simulated backend mutates nothing, so requests a live cluster would
    /// refuse are still reported as successful (except rollback).
    fn is_simulated(&self) -> bool {
        false
    }

    /// Fails with [`ClusterError::NotFound`] when the pod does not exist.
    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;

    /// Read-modify-write of `spec.replicas`. No retry on update conflict.
    async fn scale_deployment(
        &self,
        namespace: &str,
        name: &str,
        request: ScaleRequest,
    ) -> Result<ScaleOutcome, ClusterError>;

    /// Stamp [`RESTARTED_AT_ANNOTATION`] on the pod template.
    async fn restart_deployment(
        &self,
        namespace: &str,
        name: &str,
        restarted_at: DateTime<Utc>,
    ) -> Result<(), ClusterError>;

    /// Restore the pod template of the previous revision.
    async fn rollback_deployment(&self, namespace: &str, name: &str) -> Result<RollbackOutcome, ClusterError>;

    /// Most recent `tail_lines` of a pod's log.
    async fn pod_logs(&self, namespace: &str, name: &str, tail_lines: i64) -> Result<String, ClusterError>;

    /// Pods backing a deployment, by `app=<name>` label.
    async fn deployment_pods(&self, namespace: &str, name: &str) -> Result<Vec<String>, ClusterError>;
}
