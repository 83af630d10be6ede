// Copyright (c) 2026 Remediator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Kubernetes Cluster Backend
//!
//! Live implementation of [`ClusterBackend`] and [`ClusterInventory`] on top of
//! `kube`. Credentials come from an explicit kubeconfig when configured,
//! otherwise they are inferred: local kubeconfig first, then the in-cluster
//! service account. Both are equally valid; availability decides.
//!
//! No request timeouts are configured beyond the client defaults, and updates
//! are plain replaces with no conflict retry.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{DeleteParams, ListParams, LogParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config, ResourceExt};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use crate::domain::action::ScaleRequest;
use crate::domain::cluster::{
    ClusterBackend, ClusterError, ClusterInventory, RollbackOutcome, ScaleOutcome,
    RESTARTED_AT_ANNOTATION, REVISION_ANNOTATION,
};

const POD_TEMPLATE_HASH_LABEL: &str = "pod-template-hash";

#[derive(Clone)]
pub struct KubeClusterBackend {
    client: Client,
}

impl KubeClusterBackend {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from `kubeconfig` if given, else infer credentials.
    pub async fn connect(kubeconfig: Option<&Path>) -> Result<Self, ClusterError> {
        let config = match kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path)
                    .map_err(|e| ClusterError::Api(format!("reading {}: {}", path.display(), e)))?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(|e| ClusterError::Api(format!("loading {}: {}", path.display(), e)))?
            }
            None => Config::infer()
                .await
                .map_err(|e| ClusterError::Api(format!("inferring cluster credentials: {}", e)))?,
        };

        let client = Client::try_from(config).map_err(|e| ClusterError::Api(e.to_string()))?;
        info!("Kubernetes client initialized");
        Ok(Self::new(client))
    }

    fn deployments(&self, namespace: &str) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn get_deployment(&self, namespace: &str, name: &str) -> Result<Deployment, ClusterError> {
        self.deployments(namespace)
            .get(name)
            .await
            .map_err(|e| map_kube_error(e, "deployment", namespace, name))
    }

    async fn replace_deployment(&self, namespace: &str, deployment: &Deployment) -> Result<(), ClusterError> {
        let name = deployment.name_any();
        self.deployments(namespace)
            .replace(&name, &PostParams::default(), deployment)
            .await
            .map_err(|e| map_kube_error(e, "deployment", namespace, &name))?;
        Ok(())
    }

    async fn list_pod_names(&self, namespace: &str, label_selector: &str) -> Result<Vec<String>, ClusterError> {
        let pods = self
            .pods(namespace)
            .list(&ListParams::default().labels(label_selector))
            .await
            .map_err(|e| ClusterError::Api(e.to_string()))?;
        Ok(pods.items.iter().map(|pod| pod.name_any()).collect())
    }
}

fn map_kube_error(err: kube::Error, kind: &'static str, namespace: &str, name: &str) -> ClusterError {
    match err {
        kube::Error::Api(response) if response.code == 404 => ClusterError::NotFound {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        other => ClusterError::Api(other.to_string()),
    }
}

fn revision_of(annotations: &BTreeMap<String, String>) -> Option<i64> {
    annotations.get(REVISION_ANNOTATION)?.parse().ok()
}

/// Highest-revision ReplicaSet owned by `deployment_uid` whose revision is
/// below `current`.
fn previous_revision<'a>(
    replica_sets: &'a [ReplicaSet],
    deployment_uid: &str,
    current: Option<i64>,
) -> Option<(i64, &'a ReplicaSet)> {
    replica_sets
        .iter()
        .filter(|rs| {
            rs.owner_references()
                .iter()
                .any(|owner| owner.controller == Some(true) && owner.uid == deployment_uid)
        })
        .filter_map(|rs| revision_of(rs.annotations()).map(|rev| (rev, rs)))
        .filter(|(rev, _)| current.is_none_or(|current| *rev < current))
        .max_by_key(|(rev, _)| *rev)
}

#[async_trait]
impl ClusterInventory for KubeClusterBackend {
    async fn find_deployment(&self, namespace: &str, name: &str) -> Result<Option<String>, ClusterError> {
        let deployment = self
            .deployments(namespace)
            .get_opt(name)
            .await
            .map_err(|e| ClusterError::Api(e.to_string()))?;
        Ok(deployment.map(|d| d.name_any()))
    }

    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<String>, ClusterError> {
        self.list_pod_names(namespace, label_selector).await
    }
}

#[async_trait]
impl ClusterBackend for KubeClusterBackend {
    fn name(&self) -> &'static str {
        "kubernetes"
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.pods(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| map_kube_error(e, "pod", namespace, name))?;
        info!(namespace, pod = name, "Pod deleted");
        Ok(())
    }

    async fn scale_deployment(
        &self,
        namespace: &str,
        name: &str,
        request: ScaleRequest,
    ) -> Result<ScaleOutcome, ClusterError> {
        let mut deployment = self.get_deployment(namespace, name).await?;
        let spec = deployment
            .spec
            .as_mut()
            .ok_or_else(|| ClusterError::Api(format!("deployment/{} has no spec", name)))?;

        // Unset replicas means the API server default of 1
        let previous = spec.replicas.unwrap_or(1);
        let current = request.apply(previous)?;

        info!(deployment = name, current = previous, new = current, "Scaling deployment");

        spec.replicas = Some(current);
        self.replace_deployment(namespace, &deployment).await?;
        Ok(ScaleOutcome { previous, current })
    }

    async fn restart_deployment(
        &self,
        namespace: &str,
        name: &str,
        restarted_at: DateTime<Utc>,
    ) -> Result<(), ClusterError> {
        let mut deployment = self.get_deployment(namespace, name).await?;
        let spec = deployment
            .spec
            .as_mut()
            .ok_or_else(|| ClusterError::Api(format!("deployment/{} has no spec", name)))?;

        spec.template
            .metadata
            .get_or_insert_with(Default::default)
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(
                RESTARTED_AT_ANNOTATION.to_string(),
                restarted_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            );

        info!(deployment = name, "Triggering rolling restart");
        self.replace_deployment(namespace, &deployment).await
    }

    async fn rollback_deployment(&self, namespace: &str, name: &str) -> Result<RollbackOutcome, ClusterError> {
        let mut deployment = self.get_deployment(namespace, name).await?;
        let uid = deployment
            .uid()
            .ok_or_else(|| ClusterError::Api(format!("deployment/{} has no uid", name)))?;
        let current = revision_of(deployment.annotations());

        let replica_sets: Api<ReplicaSet> = Api::namespaced(self.client.clone(), namespace);
        let owned = replica_sets
            .list(&ListParams::default())
            .await
            .map_err(|e| ClusterError::Api(e.to_string()))?;

        let (to_revision, replica_set) = previous_revision(&owned.items, &uid, current)
            .ok_or_else(|| ClusterError::NoRolloutHistory(name.to_string()))?;

        let mut template = replica_set
            .spec
            .as_ref()
            .and_then(|spec| spec.template.clone())
            .ok_or_else(|| ClusterError::Api(format!("revision {} has no pod template", to_revision)))?;
        if let Some(labels) = template.metadata.as_mut().and_then(|m| m.labels.as_mut()) {
            labels.remove(POD_TEMPLATE_HASH_LABEL);
        }

        let spec = deployment
            .spec
            .as_mut()
            .ok_or_else(|| ClusterError::Api(format!("deployment/{} has no spec", name)))?;
        spec.template = template;

        info!(
            deployment = name,
            namespace,
            from_revision = ?current,
            to_revision,
            "Rolling back deployment"
        );
        self.replace_deployment(namespace, &deployment).await?;

        Ok(RollbackOutcome {
            from_revision: current,
            to_revision,
        })
    }

    async fn pod_logs(&self, namespace: &str, name: &str, tail_lines: i64) -> Result<String, ClusterError> {
        let params = LogParams {
            tail_lines: Some(tail_lines),
            ..LogParams::default()
        };
        self.pods(namespace)
            .logs(name, &params)
            .await
            .map_err(|e| map_kube_error(e, "pod", namespace, name))
    }

    async fn deployment_pods(&self, namespace: &str, name: &str) -> Result<Vec<String>, ClusterError> {
        let pods = self.list_pod_names(namespace, &format!("app={}", name)).await?;
        if pods.is_empty() {
            warn!(namespace, deployment = name, "No pods labelled app={}", name);
        }
        Ok(pods)
    }
}
