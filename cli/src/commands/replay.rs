// Copyright (c) 2026 Remediator Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Replay recorded messages through an in-process pipeline
//!
//! Events (NDJSON `NormalizedEvent`) go to `events.normalized`; decisions
//! (NDJSON `Decision`) stand in for the analysis stage and go to
//! `decisions.<domain>`. All three stages run over the in-memory bus and the
//! enriched events and action statuses are printed as they arrive.
//!
//! The simulation backend is used unless `--live` is given.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use remediator_core::application::backend_factory::{connect_cluster, ClusterHandles, StageFactory};
use remediator_core::application::pipeline::{run_stage, StageKind};
use remediator_core::domain::events::{ActionStatus, Decision, Domain, DomainEvent, NormalizedEvent};
use remediator_core::domain::messaging::{topics, BusConsumer, MessageBus};
use remediator_core::domain::pipeline_config::PipelineConfigManifest;
use remediator_core::infrastructure::event_bus::InMemoryMessageBus;

use super::read_ndjson;

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// NDJSON file of normalized events
    #[arg(long, value_name = "FILE")]
    pub events: Option<PathBuf>,

    /// NDJSON file of decisions
    #[arg(long, value_name = "FILE")]
    pub decisions: Option<PathBuf>,

    /// Domain whose decisions topic receives the decisions
    #[arg(long, default_value = "k8s", value_parser = parse_domain)]
    pub domain: Domain,

    /// Execute against the configured cluster instead of simulating
    #[arg(long)]
    pub live: bool,

    /// Stop after no output has arrived for this many milliseconds
    #[arg(long, default_value_t = 3000)]
    pub idle_ms: u64,
}

fn parse_domain(value: &str) -> Result<Domain, String> {
    Domain::parse(value).ok_or_else(|| format!("unknown domain '{}' (expected k8s, infra or db)", value))
}

/// What a replay produced.
#[derive(Debug, Default)]
pub struct ReplayReport {
    pub enriched: Vec<DomainEvent>,
    pub statuses: Vec<ActionStatus>,
}

pub async fn execute(args: ReplayArgs, manifest: PipelineConfigManifest) -> Result<()> {
    if args.events.is_none() && args.decisions.is_none() {
        anyhow::bail!("Nothing to replay: pass --events and/or --decisions");
    }

    let events: Vec<NormalizedEvent> = match &args.events {
        Some(path) => read_ndjson(path)?,
        None => Vec::new(),
    };
    let decisions: Vec<Decision> = match &args.decisions {
        Some(path) => read_ndjson(path)?,
        None => Vec::new(),
    };

    let spec = manifest.spec;
    let cluster = if args.live {
        connect_cluster(&spec.cluster).await
    } else {
        ClusterHandles::simulated(&spec.cluster)
    };
    println!(
        "Replaying {} event(s) and {} decision(s) against the {} backend",
        events.len(),
        decisions.len(),
        cluster.backend.name().bold()
    );

    let factory = StageFactory::new(spec, cluster);
    let report = replay(
        &factory,
        events,
        decisions,
        args.domain,
        Duration::from_millis(args.idle_ms),
    )
    .await?;

    let failed = report.statuses.iter().filter(|s| !s.is_success()).count();
    println!();
    println!(
        "{} enriched, {} executed, {} failed",
        report.enriched.len(),
        report.statuses.len(),
        failed
    );
    Ok(())
}

/// Run every stage over a fresh in-memory bus, publish the inputs and collect
/// outputs until the pipeline goes quiet for `idle`.
pub async fn replay(
    factory: &StageFactory,
    events: Vec<NormalizedEvent>,
    decisions: Vec<Decision>,
    domain: Domain,
    idle: Duration,
) -> Result<ReplayReport> {
    let bus = Arc::new(InMemoryMessageBus::default());
    let mut observed_topics: Vec<String> = Domain::ALL.iter().map(|d| topics::domain_events(*d)).collect();
    observed_topics.push(topics::ACTIONS_STATUS.to_string());
    let mut observer = bus.subscribe(&observed_topics, "replay-observer").await?;

    let shutdown = CancellationToken::new();
    let mut tasks = Vec::new();
    for kind in StageKind::ALL {
        let stage = factory.build(kind);
        let stage_bus: Arc<dyn MessageBus> = bus.clone();
        let token = shutdown.clone();
        tasks.push(tokio::spawn(async move {
            run_stage(stage, stage_bus, &kind.group_id("replay"), token).await
        }));
    }
    wait_for_subscribers(&bus).await?;

    for event in &events {
        bus.publish(topics::EVENTS_NORMALIZED, Some(event.event_id.as_str()), serde_json::to_vec(event)?)
            .await?;
    }
    let decisions_topic = topics::decisions(domain);
    for decision in &decisions {
        bus.publish(&decisions_topic, Some(&decision.decision_id), serde_json::to_vec(decision)?)
            .await?;
    }

    let report = collect(observer.as_mut(), idle).await?;

    shutdown.cancel();
    for task in tasks {
        task.await.context("Stage task panicked")??;
    }
    Ok(report)
}

async fn wait_for_subscribers(bus: &InMemoryMessageBus) -> Result<()> {
    let inputs = [topics::EVENTS_NORMALIZED, topics::DECISIONS[0], topics::ACTIONS_APPROVED];
    tokio::time::timeout(Duration::from_secs(5), async {
        while inputs.iter().any(|topic| bus.subscriber_count(topic) == 0) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .context("Stages did not subscribe in time")
}

async fn collect(observer: &mut dyn BusConsumer, idle: Duration) -> Result<ReplayReport> {
    let mut report = ReplayReport::default();

    while let Some(message) = observer.poll(idle).await? {
        if message.topic == topics::ACTIONS_STATUS {
            let status: ActionStatus = serde_json::from_slice(&message.payload)?;
            print_status(&status);
            report.statuses.push(status);
        } else {
            let event: DomainEvent = serde_json::from_slice(&message.payload)?;
            print_enriched(&event);
            report.enriched.push(event);
        }
    }
    Ok(report)
}

fn print_enriched(event: &DomainEvent) {
    println!(
        "{} {} → {} service={} related=[{}]",
        "event".cyan(),
        event.event_id,
        event.domain.as_str().bold(),
        event.service_name,
        event.related_resources.join(", ")
    );
}

fn print_status(status: &ActionStatus) {
    if status.is_success() {
        println!("{} {} {}", "action".cyan(), status.action_id, "success".green());
    } else {
        println!(
            "{} {} {} {}",
            "action".cyan(),
            status.action_id,
            "failed".red(),
            status.error
        );
    }
}
