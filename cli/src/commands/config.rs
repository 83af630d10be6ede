// Copyright (c) 2026 Remediator Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use remediator_core::domain::pipeline_config::{BusKind, PipelineConfigManifest, CONFIG_PATH_ENV};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the effective configuration as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./remediator-config.yaml)
        #[arg(short, long, default_value = "./remediator-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    let config = PipelineConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. {}: {}",
            CONFIG_PATH_ENV,
            std::env::var(CONFIG_PATH_ENV)
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./remediator-config.yaml");
        println!("  4. ~/.remediator/config.yaml");
        println!("  5. /etc/remediator/config.yaml");
        println!();
    }

    if as_yaml {
        print!("{}", serde_yaml::to_string(&config).context("Failed to render configuration")?);
        return Ok(());
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Message Bus:".bold());
    match spec.bus.kind {
        BusKind::Memory => println!("  Kind: in-memory (capacity {})", spec.bus.channel_capacity),
        BusKind::Kafka => println!("  Kind: kafka ({})", spec.bus.bootstrap_servers),
    }
    println!("  Consumer group prefix: {}", spec.bus.group_prefix);
    println!();

    println!("{}", "Cluster:".bold());
    println!("  ID: {}", spec.cluster.cluster_id);
    match &spec.cluster.kubeconfig {
        Some(path) => println!("  Kubeconfig: {}", path.display()),
        None => println!("  Kubeconfig: {}", "(inferred)".dimmed()),
    }
    if spec.cluster.simulation {
        println!("  {}", "Simulation forced".yellow());
    }
    println!("  Enrichment namespace: {}", spec.enrichment.namespace);
    println!();

    println!("{}", "Policy:".bold());
    let actions: Vec<&str> = spec.policy.allowed_actions.iter().map(|a| a.as_str()).collect();
    let namespaces: Vec<&str> = spec.policy.allowed_namespaces.iter().map(String::as_str).collect();
    println!("  Allowed actions: {}", actions.join(", "));
    println!("  Allowed namespaces: {}", namespaces.join(", "));
    println!(
        "  Rate limit: {} per {:?}",
        spec.rate_limit.max_actions, spec.rate_limit.window
    );
    println!(
        "  Unknown action fallback: {}",
        if spec.executor.unknown_action_fallback { "restart_pod" } else { "reject" }
    );
    println!();

    println!("{}", "Observability:".bold());
    println!("  Log level: {} ({:?})", spec.observability.log_level, spec.observability.log_format);
    match spec.observability.metrics_port {
        Some(port) if port != 0 => println!("  Metrics: 0.0.0.0:{}/metrics", port),
        _ => println!("  Metrics: {}", "disabled".dimmed()),
    }
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = PipelineConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    };

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
