// Copyright (c) 2026 Remediator Contributors
// SPDX-License-Identifier: AGPL-3.0

// Simulation Backend
//
// Stand-in for a live cluster. Every primitive logs what it would have done,
// waits the configured delay, and reports success. Rollback has no meaningful
// simulated outcome and is refused.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::warn;

use crate::domain::action::ScaleRequest;
use crate::domain::cluster::{ClusterBackend, ClusterError, RollbackOutcome, ScaleOutcome};

/// Replica count assumed when simulating increments.
const SIMULATED_REPLICAS: i32 = 1;

#[derive(Debug, Clone)]
pub struct SimulatedClusterBackend {
    delay: Duration,
}

impl SimulatedClusterBackend {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

impl Default for SimulatedClusterBackend {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[async_trait]
impl ClusterBackend for SimulatedClusterBackend {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn is_simulated(&self) -> bool {
        true
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        warn!(namespace, pod = name, "SIMULATION MODE: would delete pod");
        self.pause().await;
        Ok(())
    }

    async fn scale_deployment(
        &self,
        namespace: &str,
        name: &str,
        request: ScaleRequest,
    ) -> Result<ScaleOutcome, ClusterError> {
        let current = request.apply(SIMULATED_REPLICAS)?;
        warn!(namespace, deployment = name, replicas = current, "SIMULATION MODE: would scale deployment");
        self.pause().await;
        Ok(ScaleOutcome {
            previous: SIMULATED_REPLICAS,
            current,
        })
    }

    async fn restart_deployment(
        &self,
        namespace: &str,
        name: &str,
        restarted_at: DateTime<Utc>,
    ) -> Result<(), ClusterError> {
        warn!(
            namespace,
            deployment = name,
            %restarted_at,
            "SIMULATION MODE: would trigger rolling restart"
        );
        self.pause().await;
        Ok(())
    }

    async fn rollback_deployment(&self, namespace: &str, name: &str) -> Result<RollbackOutcome, ClusterError> {
        warn!(namespace, deployment = name, "SIMULATION MODE: rollback is not simulated");
        Err(ClusterError::Unsupported(format!(
            "rollback of deployment/{} is not available in simulation mode",
            name
        )))
    }

    async fn pod_logs(&self, namespace: &str, name: &str, tail_lines: i64) -> Result<String, ClusterError> {
        warn!(namespace, pod = name, tail_lines, "SIMULATION MODE: would fetch pod logs");
        self.pause().await;
        Ok(String::new())
    }

    async fn deployment_pods(&self, namespace: &str, name: &str) -> Result<Vec<String>, ClusterError> {
        warn!(namespace, deployment = name, "SIMULATION MODE: would list deployment pods");
        Ok(vec![format!("{}-simulated", name)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulated_primitives_succeed_after_delay() {
        let backend = SimulatedClusterBackend::new(Duration::from_millis(20));
        let started = std::time::Instant::now();

        backend.delete_pod("default", "web-0").await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(20));

        let outcome = backend
            .scale_deployment("default", "api", ScaleRequest::Increment(2))
            .await
            .unwrap();
        assert_eq!(outcome, ScaleOutcome { previous: 1, current: 3 });
    }

    #[tokio::test]
    async fn test_simulated_rollback_is_unsupported() {
        let backend = SimulatedClusterBackend::new(Duration::ZERO);
        let err = backend.rollback_deployment("default", "api").await.unwrap_err();
        assert!(matches!(err, ClusterError::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_simulated_scale_still_validates_params() {
        let backend = SimulatedClusterBackend::new(Duration::ZERO);
        let err = backend
            .scale_deployment("default", "api", ScaleRequest::Increment(-4))
            .await
            .unwrap_err();
        assert!(matches!(err, ClusterError::InvalidParams(_)));
    }
}
