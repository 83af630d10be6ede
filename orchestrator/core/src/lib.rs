// Copyright (c) 2026 Remediator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Remediator Core
//!
//! Alert-to-remediation decision pipeline: enrich and classify normalized
//! alerts, gate proposed actions through safety policy and rate limiting,
//! then execute approved actions against a cluster and report their status.
//!
//! # Architecture
//!
//! - **domain:** message types, policy rules, ports
//! - **application:** enricher, policy gate, executor, stage runtime
//! - **infrastructure:** message buses, cluster backends, rate-limit store, metrics

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
