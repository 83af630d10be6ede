// Copyright (c) 2026 Remediator Contributors
// SPDX-License-Identifier: AGPL-3.0

//! # Remediator CLI
//!
//! The `remediator` binary runs the alert-to-remediation decision pipeline.
//!
//! ## Commands
//!
//! - `remediator run [--stage enricher|policy|executor|all]` - Run stage consumer loops
//! - `remediator replay --events FILE [--decisions FILE]` - Feed recorded messages through an in-process pipeline
//! - `remediator evaluate --action FILE` - Dry-run the policy gate
//! - `remediator config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use remediator::commands::{self, ConfigCommand, EvaluateArgs, ReplayArgs, RunArgs};
use remediator_core::domain::pipeline_config::{LogFormat, PipelineConfigManifest};

/// Remediator - automated, policy-gated remediation of infrastructure alerts
#[derive(Parser)]
#[command(name = "remediator")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "REMEDIATOR_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, global = true, env = "REMEDIATOR_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run pipeline stages
    #[command(name = "run")]
    Run(RunArgs),

    /// Replay recorded events and decisions through an in-process pipeline
    #[command(name = "replay")]
    Replay(ReplayArgs),

    /// Evaluate proposed actions against the policy gate without executing them
    #[command(name = "evaluate")]
    Evaluate(EvaluateArgs),

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = cli.log_level.as_deref();

    match cli.command {
        Commands::Config { command } => {
            // Must work even when the config file is broken
            init_logging(log_level.unwrap_or("warn"), LogFormat::Text)?;
            commands::config::handle_command(command, cli.config).await
        }
        Commands::Run(args) => commands::run::execute(args, prepare(cli.config, log_level)?).await,
        Commands::Replay(args) => commands::replay::execute(args, prepare(cli.config, log_level)?).await,
        Commands::Evaluate(args) => commands::evaluate::execute(args, prepare(cli.config, log_level)?).await,
    }
}

/// Load and validate configuration, then initialize logging from it.
fn prepare(config: Option<PathBuf>, log_level: Option<&str>) -> Result<PipelineConfigManifest> {
    let manifest = PipelineConfigManifest::load_or_default(config).context("Failed to load configuration")?;
    manifest
        .validate()
        .context("Configuration validation failed")?;

    let observability = &manifest.spec.observability;
    init_logging(log_level.unwrap_or(&observability.log_level), observability.log_format)?;
    Ok(manifest)
}

/// Initialize tracing subscriber for logging. `RUST_LOG` wins over `level`.
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Json => builder.json().with_current_span(false).init(),
        LogFormat::Text => builder.with_target(false).compact().init(),
    }

    Ok(())
}
