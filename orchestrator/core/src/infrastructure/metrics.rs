// Copyright (c) 2026 Remediator Contributors
// SPDX-License-Identifier: AGPL-3.0

// Pipeline Metrics
//
// Counters and histograms recorded through the `metrics` facade. Nothing is
// exported until `install_exporter` registers the Prometheus recorder; before
// that every call is a no-op, which keeps library code and tests recorder-free.

use anyhow::Context;
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

pub const EVENTS_RECEIVED: &str = "orchestrator_events_received_total";
pub const EVENTS_PROCESSED: &str = "orchestrator_events_processed_total";
pub const PROCESSING_DURATION: &str = "orchestrator_processing_duration_seconds";
pub const ACTIONS_EXECUTED: &str = "orchestrator_actions_executed_total";
pub const POLICY_DECISIONS: &str = "orchestrator_policy_decisions_total";
pub const MESSAGES_PUBLISHED: &str = "orchestrator_kafka_messages_published_total";

/// Serve `/metrics` on `0.0.0.0:<port>`. Must run inside a tokio runtime.
pub fn install_exporter(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("Failed to start Prometheus exporter on {}", addr))?;

    describe();
    info!("Prometheus metrics exporter listening on {}", addr);
    Ok(())
}

fn describe() {
    describe_counter!(EVENTS_RECEIVED, "Total number of events received");
    describe_counter!(EVENTS_PROCESSED, "Total number of events processed");
    describe_histogram!(PROCESSING_DURATION, Unit::Seconds, "Time spent processing events");
    describe_counter!(ACTIONS_EXECUTED, "Total number of remediation actions executed");
    describe_counter!(POLICY_DECISIONS, "Total number of policy decisions made");
    describe_counter!(MESSAGES_PUBLISHED, "Total number of bus messages published");
}

pub fn record_event_received(stage: &'static str, severity: &str) {
    counter!(EVENTS_RECEIVED, "service" => stage, "severity" => severity.to_string()).increment(1);
}

/// `status` is `success` or `error`.
pub fn record_event_processed(stage: &'static str, status: &'static str, elapsed: Duration) {
    counter!(EVENTS_PROCESSED, "service" => stage, "status" => status).increment(1);
    histogram!(PROCESSING_DURATION, "service" => stage).record(elapsed.as_secs_f64());
}

pub fn record_action_executed(action_type: &str, success: bool) {
    let status = if success { "success" } else { "failed" };
    counter!(ACTIONS_EXECUTED, "action_type" => action_type.to_string(), "status" => status).increment(1);
}

/// `decision` is `approved` or the violated rule's label.
pub fn record_policy_decision(decision: &'static str) {
    counter!(POLICY_DECISIONS, "decision" => decision).increment(1);
}

pub fn record_message_published(topic: &str) {
    counter!(MESSAGES_PUBLISHED, "topic" => topic.to_string()).increment(1);
}
