// Copyright (c) 2026 Remediator Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Run pipeline stages as long-lived consumer loops
//!
//! Each selected stage gets its own consumer group (`<group_prefix>-<stage>`).
//! SIGINT or SIGTERM cancels the shared shutdown token; every loop finishes the
//! message it is processing and exits.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use tokio::signal;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use remediator_core::application::backend_factory::{
    connect_cluster, create_message_bus, ClusterHandles, StageFactory,
};
use remediator_core::application::pipeline::{run_stage, StageKind};
use remediator_core::domain::pipeline_config::{BusKind, PipelineConfigManifest};
use remediator_core::infrastructure::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StageSelection {
    Enricher,
    Policy,
    Executor,
    All,
}

impl StageSelection {
    pub fn stages(self) -> Vec<StageKind> {
        match self {
            StageSelection::Enricher => vec![StageKind::Enricher],
            StageSelection::Policy => vec![StageKind::Policy],
            StageSelection::Executor => vec![StageKind::Executor],
            StageSelection::All => StageKind::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Stage to run; `all` runs every stage in this process
    #[arg(long, value_enum, default_value = "all")]
    pub stage: StageSelection,
}

pub async fn execute(args: RunArgs, manifest: PipelineConfigManifest) -> Result<()> {
    let spec = manifest.spec;
    let stages = args.stage.stages();

    if spec.bus.kind == BusKind::Memory {
        println!(
            "{}",
            "⚠ In-memory bus: stages only see messages published by this process. Set KAFKA_BROKER or spec.bus.kind: kafka to consume external topics".yellow()
        );
        if args.stage != StageSelection::All {
            warn!("In-memory bus selected with a single stage; downstream stages are not running");
        }
    }

    if let Some(port) = spec.observability.metrics_port.filter(|port| *port != 0) {
        metrics::install_exporter(port)?;
    }

    let bus = create_message_bus(&spec.bus).context("Failed to create message bus")?;

    // Only the enricher and executor touch the cluster
    let needs_cluster = stages
        .iter()
        .any(|stage| matches!(stage, StageKind::Enricher | StageKind::Executor));
    let cluster = if needs_cluster {
        connect_cluster(&spec.cluster).await
    } else {
        ClusterHandles::simulated(&spec.cluster)
    };
    if needs_cluster && cluster.is_simulated() {
        println!(
            "{}",
            "⚠ No cluster credentials: actions will be simulated and reported as success".yellow()
        );
    }

    let group_prefix = spec.bus.group_prefix.clone();
    let factory = StageFactory::new(spec, cluster);
    let shutdown = CancellationToken::new();

    let mut tasks = JoinSet::new();
    for kind in stages {
        let stage = factory.build(kind);
        let bus = bus.clone();
        let group_id = kind.group_id(&group_prefix);
        let token = shutdown.clone();
        tasks.spawn(async move { run_stage(stage, bus, &group_id, token).await });
    }

    info!(stage = ?args.stage, "Remediator running; press Ctrl+C to stop");

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    let mut result = Ok(());
    while let Some(joined) = tasks.join_next().await {
        let outcome = joined
            .context("Stage task panicked")
            .and_then(|stage_result| stage_result);
        if let Err(e) = outcome {
            // One stage failing to start brings the rest down
            shutdown.cancel();
            if result.is_ok() {
                result = Err(e);
            }
        }
    }

    info!("All stages stopped");
    result
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
