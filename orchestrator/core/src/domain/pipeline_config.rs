// Copyright (c) 2026 Remediator Contributors
// SPDX-License-Identifier: AGPL-3.0

// Pipeline Configuration
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) covering:
// - Message bus transport and bootstrap address
// - Cluster identity, credentials and simulation fallback
// - Enrichment namespace
// - Policy allowlists and rate limits
// - Executor behavior
// - Logging and metrics

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::policy::{PolicyRules, HARD_BLOCKED_NAMESPACES};
use crate::domain::rate_limit::RateLimitConfig;

pub const API_VERSION: &str = "remediator/v1";
pub const KIND: &str = "PipelineConfig";
pub const CONFIG_PATH_ENV: &str = "REMEDIATOR_CONFIG_PATH";

/// Top-level configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfigManifest {
    /// API version (must be "remediator/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "PipelineConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: PipelineConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfigSpec {
    #[serde(default)]
    pub bus: BusConfig,

    #[serde(default)]
    pub cluster: ClusterConfig,

    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    #[serde(default)]
    pub policy: PolicyRules,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    /// In-process broadcast channels; all stages must share one process.
    Memory,
    /// Kafka-compatible partitioned log (requires the `kafka` feature).
    Kafka,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    #[serde(default = "default_bus_kind")]
    pub kind: BusKind,

    #[serde(default = "default_bootstrap_servers")]
    pub bootstrap_servers: String,

    /// Consumer groups are named `<group_prefix>-<stage>`.
    #[serde(default = "default_group_prefix")]
    pub group_prefix: String,

    /// Per-topic buffer for the in-memory transport.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            kind: default_bus_kind(),
            bootstrap_servers: default_bootstrap_servers(),
            group_prefix: default_group_prefix(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default = "default_cluster_id")]
    pub cluster_id: String,

    /// Explicit kubeconfig. When unset, credentials are inferred
    /// (local kubeconfig first, then in-cluster service account).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<PathBuf>,

    /// Skip credential discovery and always use the simulation backend.
    #[serde(default)]
    pub simulation: bool,

    /// Pause taken by the simulation backend per dispatched action.
    #[serde(default = "default_simulation_delay", with = "humantime_serde")]
    pub simulation_delay: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            cluster_id: default_cluster_id(),
            kubeconfig: None,
            simulation: false,
            simulation_delay: default_simulation_delay(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Namespace searched for related deployments and pods.
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Attempt `restart_pod` for action types the executor has no handler for.
    /// `false` rejects them outright.
    #[serde(default = "default_unknown_action_fallback")]
    pub unknown_action_fallback: bool,

    #[serde(default = "default_log_tail_lines")]
    pub log_tail_lines: i64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            unknown_action_fallback: default_unknown_action_fallback(),
            log_tail_lines: default_log_tail_lines(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,

    /// Prometheus exporter port; `None` disables the exporter.
    #[serde(default = "default_metrics_port")]
    pub metrics_port: Option<u16>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            metrics_port: default_metrics_port(),
        }
    }
}

fn default_bus_kind() -> BusKind {
    BusKind::Memory
}

fn default_bootstrap_servers() -> String {
    "localhost:9092".to_string()
}

fn default_group_prefix() -> String {
    "remediator".to_string()
}

fn default_channel_capacity() -> usize {
    1000
}

fn default_cluster_id() -> String {
    "default-cluster".to_string()
}

fn default_simulation_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_unknown_action_fallback() -> bool {
    true
}

fn default_log_tail_lines() -> i64 {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

fn default_metrics_port() -> Option<u16> {
    Some(9090)
}

impl Default for PipelineConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "remediator".to_string(),
                labels: None,
            },
            spec: PipelineConfigSpec::default(),
        }
    }
}

impl PipelineConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. REMEDIATOR_CONFIG_PATH environment variable
    /// 2. ./remediator-config.yaml (working directory)
    /// 3. ~/.remediator/config.yaml (user home)
    /// 4. /etc/remediator/config.yaml
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./remediator-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".remediator").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/remediator/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // A broker address means the stages are fed by external producers
        if let Some(broker) = lookup("KAFKA_BROKER").filter(|v| !v.is_empty()) {
            tracing::info!("Environment override: KAFKA_BROKER={} (bus kind: kafka)", broker);
            self.spec.bus.kind = BusKind::Kafka;
            self.spec.bus.bootstrap_servers = broker;
        }

        if let Some(cluster_id) = lookup("CLUSTER_ID").filter(|v| !v.is_empty()) {
            tracing::info!("Environment override: CLUSTER_ID={}", cluster_id);
            self.spec.cluster.cluster_id = cluster_id;
        }

        if let Some(path) = lookup("KUBECONFIG").filter(|v| !v.is_empty()) {
            // Only a single file is supported, not a path list
            if !path.contains(':') {
                self.spec.cluster.kubeconfig = Some(PathBuf::from(path));
            }
        }

        if let Some(val) = lookup("REMEDIATOR_SIMULATION") {
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => {
                    tracing::info!("Environment override: REMEDIATOR_SIMULATION=true");
                    self.spec.cluster.simulation = true;
                }
                "false" | "0" | "no" | "off" => {
                    self.spec.cluster.simulation = false;
                }
                _ => {
                    tracing::warn!(
                        "Invalid value for REMEDIATOR_SIMULATION: '{}'. Expected true/false. Ignoring.",
                        val
                    );
                }
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.spec.cluster.cluster_id.trim().is_empty() {
            anyhow::bail!("spec.cluster.cluster_id must not be empty");
        }

        if self.spec.rate_limit.max_actions == 0 {
            anyhow::bail!("spec.rate_limit.max_actions must be at least 1");
        }

        if self.spec.rate_limit.window.is_zero() {
            anyhow::bail!("spec.rate_limit.window must be non-zero");
        }

        for blocked in HARD_BLOCKED_NAMESPACES {
            if self.spec.policy.allowed_namespaces.contains(*blocked) {
                anyhow::bail!(
                    "spec.policy.allowed_namespaces must not contain '{}'",
                    blocked
                );
            }
        }

        if self.spec.bus.kind == BusKind::Kafka && !cfg!(feature = "kafka") {
            anyhow::bail!(
                "spec.bus.kind is 'kafka' but this build has no Kafka transport; rebuild with `--features kafka`"
            );
        }

        if self.spec.bus.kind == BusKind::Memory && self.spec.bus.channel_capacity == 0 {
            anyhow::bail!("spec.bus.channel_capacity must be at least 1");
        }

        if self.spec.executor.log_tail_lines <= 0 {
            anyhow::bail!("spec.executor.log_tail_lines must be positive");
        }

        Ok(())
    }
}
