// Copyright (c) 2026 Remediator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Action Executor
//!
//! Dispatches one approved [`Action`] to the configured [`ClusterBackend`] and
//! returns exactly one terminal [`ActionStatus`]. Nothing is retried here;
//! retries come from the alerting loop re-firing.
//!
//! Policy has already been applied upstream, so the executor does not re-check
//! the allowlist or namespace rules.
//!
//! Against a simulated backend every action except `rollback_deployment`
//! succeeds, including ones with invalid params or targets.
//!
//! | Action type | Deployment target | Pod / bare target |
//! |-------------|-------------------|-------------------|
//! | `restart_pod`, `flush_cache` | rolling restart | delete pod, rolling restart on not-found |
//! | `scale_deployment` | scale | scale (bare) / invalid (pod) |
//! | `rolling_restart_deployment` | rolling restart | rolling restart (bare) / invalid (pod) |
//! | `rollback_deployment` | rollout undo | rollout undo (bare) / invalid (pod) |
//! | `gather_logs` | logs of each `app=<name>` pod | logs of the pod |

use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::domain::action::{ActionKind, ResourceRef, ScaleRequest};
use crate::domain::cluster::{ClusterBackend, ClusterError};
use crate::domain::events::{Action, ActionStatus};
use crate::domain::pipeline_config::ExecutorConfig;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("unknown action type: {0}")]
    UnknownActionType(String),

    #[error("unknown action type: {action_type} (restart fallback failed: {source})")]
    FallbackFailed {
        action_type: String,
        #[source]
        source: ClusterError,
    },

    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

pub struct ActionExecutor {
    backend: Arc<dyn ClusterBackend>,
    config: ExecutorConfig,
}

impl ActionExecutor {
    pub fn new(backend: Arc<dyn ClusterBackend>, config: ExecutorConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Dispatch `action` and report its terminal status.
    pub async fn execute(&self, action: &Action) -> ActionStatus {
        info!(
            action_id = %action.action_id,
            action_type = %action.action_type,
            target = %action.target,
            backend = self.backend.name(),
            "Executing action"
        );

        match self.dispatch(action).await {
            Ok(()) => {
                info!(action_id = %action.action_id, "Action completed successfully");
                ActionStatus::success(action.action_id.clone())
            }
            Err(e) => {
                error!(action_id = %action.action_id, error = %e, "Action failed");
                ActionStatus::failed(action.action_id.clone(), e.to_string())
            }
        }
    }

    pub async fn dispatch(&self, action: &Action) -> Result<(), ExecutionError> {
        let kind = ActionKind::parse(&action.action_type);
        let result = self.dispatch_kind(action, kind).await;

        match result {
            Err(e) if self.backend.is_simulated() && kind != Some(ActionKind::RollbackDeployment) => {
                warn!(
                    action_id = %action.action_id,
                    error = %e,
                    "SIMULATION MODE: request would fail against a live cluster; reporting success"
                );
                Ok(())
            }
            other => other,
        }
    }

    async fn dispatch_kind(&self, action: &Action, kind: Option<ActionKind>) -> Result<(), ExecutionError> {
        let namespace = action.namespace();
        let target = ResourceRef::parse(&action.target);

        let Some(kind) = kind else {
            return self.dispatch_unknown(action, namespace, &target).await;
        };

        match kind {
            ActionKind::RestartPod | ActionKind::FlushCache => self.restart_pod(namespace, &target).await?,
            ActionKind::ScaleDeployment => self.scale(action, namespace, &target).await?,
            ActionKind::RollingRestartDeployment => {
                let name = deployment_name(&target)?;
                self.rolling_restart(namespace, name).await?
            }
            ActionKind::RollbackDeployment => {
                let name = deployment_name(&target)?;
                let outcome = self.backend.rollback_deployment(namespace, name).await?;
                info!(
                    deployment = name,
                    namespace,
                    from_revision = ?outcome.from_revision,
                    to_revision = outcome.to_revision,
                    "Rollback successful"
                );
            }
            ActionKind::GatherLogs => self.gather_logs(namespace, &target).await?,
        }
        Ok(())
    }

    async fn dispatch_unknown(
        &self,
        action: &Action,
        namespace: &str,
        target: &ResourceRef,
    ) -> Result<(), ExecutionError> {
        if !self.config.unknown_action_fallback {
            return Err(ExecutionError::UnknownActionType(action.action_type.clone()));
        }

        warn!(
            action_type = %action.action_type,
            target = %target,
            "Unknown action type, attempting restart_pod as fallback"
        );
        self.restart_pod(namespace, target)
            .await
            .map_err(|source| ExecutionError::FallbackFailed {
                action_type: action.action_type.clone(),
                source,
            })
    }

    /// Delete the pod so its controller recreates it. Deployment targets and
    /// pods that no longer exist get a rolling restart instead.
    async fn restart_pod(&self, namespace: &str, target: &ResourceRef) -> Result<(), ClusterError> {
        if let ResourceRef::Deployment(name) = target {
            return self.rolling_restart(namespace, name).await;
        }

        match self.backend.delete_pod(namespace, target.name()).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => {
                info!(target = %target, "Pod not found, attempting rolling restart of deployment");
                self.rolling_restart(namespace, target.name()).await
            }
            Err(e) => Err(e),
        }
    }

    async fn rolling_restart(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.backend.restart_deployment(namespace, name, Utc::now()).await
    }

    async fn scale(&self, action: &Action, namespace: &str, target: &ResourceRef) -> Result<(), ClusterError> {
        let name = deployment_name(target)?;
        let request = ScaleRequest::from_params(&action.params)?;
        let outcome = self.backend.scale_deployment(namespace, name, request).await?;
        info!(
            deployment = name,
            previous = outcome.previous,
            current = outcome.current,
            "Deployment scaled"
        );
        Ok(())
    }

    async fn gather_logs(&self, namespace: &str, target: &ResourceRef) -> Result<(), ClusterError> {
        let pods = match target {
            ResourceRef::Deployment(name) => self.backend.deployment_pods(namespace, name).await?,
            other => vec![other.name().to_string()],
        };

        for pod in &pods {
            let logs = self
                .backend
                .pod_logs(namespace, pod, self.config.log_tail_lines)
                .await?;
            info!(namespace, pod = %pod, lines = logs.lines().count(), "Gathered pod logs");
            debug!(pod = %pod, "{}", logs);
        }
        Ok(())
    }
}

/// Name of the deployment a target refers to. Pod targets are rejected.
fn deployment_name(target: &ResourceRef) -> Result<&str, ClusterError> {
    match target {
        ResourceRef::Deployment(name) | ResourceRef::Bare(name) => Ok(name),
        ResourceRef::Pod(_) => Err(ClusterError::InvalidTarget(format!(
            "{} (expected deployment/<name>)",
            target
        ))),
    }
}
