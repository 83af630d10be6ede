// Copyright (c) 2026 Remediator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Backend Factory
//!
//! Creates the concrete message bus, cluster backend and stages from a
//! [`PipelineConfigSpec`]. Selection happens once here; nothing downstream
//! branches on which implementation it was handed.

use std::sync::Arc;
use tracing::{info, warn};

use crate::application::enricher::EnrichmentService;
use crate::application::executor::ActionExecutor;
use crate::application::pipeline::{EnricherStage, ExecutorStage, PolicyStage, Stage, StageKind};
use crate::application::policy_gate::PolicyGate;
use crate::domain::cluster::{ClusterBackend, ClusterInventory};
use crate::domain::messaging::MessageBus;
use crate::domain::pipeline_config::{BusConfig, BusKind, ClusterConfig, PipelineConfigSpec};
use crate::domain::rate_limit::RateLimitStore;
use crate::infrastructure::event_bus::InMemoryMessageBus;
use crate::infrastructure::kubernetes::KubeClusterBackend;
use crate::infrastructure::rate_limiter::InMemoryRateLimitStore;
use crate::infrastructure::simulation::SimulatedClusterBackend;

/// Creates a MessageBus implementation based on the configured transport.
/// Connection failures are fatal to the caller.
pub fn create_message_bus(config: &BusConfig) -> anyhow::Result<Arc<dyn MessageBus>> {
    match config.kind {
        BusKind::Memory => Ok(Arc::new(InMemoryMessageBus::new(config.channel_capacity))),
        #[cfg(feature = "kafka")]
        BusKind::Kafka => {
            use anyhow::Context;
            let bus = crate::infrastructure::kafka::KafkaMessageBus::connect(&config.bootstrap_servers)
                .context("Failed to connect to Kafka")?;
            Ok(Arc::new(bus))
        }
        #[cfg(not(feature = "kafka"))]
        BusKind::Kafka => anyhow::bail!(
            "bus kind 'kafka' requires building with the `kafka` feature (bootstrap servers: {})",
            config.bootstrap_servers
        ),
    }
}

/// Cluster access resolved at startup.
#[derive(Clone)]
pub struct ClusterHandles {
    pub backend: Arc<dyn ClusterBackend>,
    /// `None` when no live cluster is reachable; enrichment degrades.
    pub inventory: Option<Arc<dyn ClusterInventory>>,
}

impl ClusterHandles {
    pub fn simulated(config: &ClusterConfig) -> Self {
        Self {
            backend: Arc::new(SimulatedClusterBackend::new(config.simulation_delay)),
            inventory: None,
        }
    }

    pub fn is_simulated(&self) -> bool {
        self.inventory.is_none()
    }
}

/// Connect to the cluster, falling back to simulation when credentials are
/// unavailable or simulation is forced.
pub async fn connect_cluster(config: &ClusterConfig) -> ClusterHandles {
    if config.simulation {
        warn!("Simulation mode forced by configuration; no cluster mutations will be performed");
        return ClusterHandles::simulated(config);
    }

    match KubeClusterBackend::connect(config.kubeconfig.as_deref()).await {
        Ok(kube) => {
            let kube = Arc::new(kube);
            ClusterHandles {
                backend: kube.clone(),
                inventory: Some(kube),
            }
        }
        Err(e) => {
            warn!(error = %e, "Kubernetes client unavailable; running in SIMULATION MODE");
            ClusterHandles::simulated(config)
        }
    }
}

/// Shared collaborators for building stages.
pub struct StageFactory {
    spec: PipelineConfigSpec,
    cluster: ClusterHandles,
    rate_limits: Arc<dyn RateLimitStore>,
}

impl StageFactory {
    pub fn new(spec: PipelineConfigSpec, cluster: ClusterHandles) -> Self {
        let rate_limits = Arc::new(InMemoryRateLimitStore::new(spec.rate_limit));
        Self::with_rate_limits(spec, cluster, rate_limits)
    }

    pub fn with_rate_limits(
        spec: PipelineConfigSpec,
        cluster: ClusterHandles,
        rate_limits: Arc<dyn RateLimitStore>,
    ) -> Self {
        Self {
            spec,
            cluster,
            rate_limits,
        }
    }

    pub fn build(&self, kind: StageKind) -> Arc<dyn Stage> {
        info!(stage = %kind, backend = self.cluster.backend.name(), "Building stage");
        match kind {
            StageKind::Enricher => Arc::new(EnricherStage::new(EnrichmentService::new(
                self.cluster.inventory.clone(),
                self.spec.cluster.cluster_id.clone(),
                self.spec.enrichment.namespace.clone(),
            ))),
            StageKind::Policy => Arc::new(PolicyStage::new(self.policy_gate())),
            StageKind::Executor => Arc::new(ExecutorStage::new(ActionExecutor::new(
                self.cluster.backend.clone(),
                self.spec.executor.clone(),
            ))),
        }
    }

    pub fn policy_gate(&self) -> PolicyGate {
        PolicyGate::new(self.spec.policy.clone(), self.rate_limits.clone())
    }
}
