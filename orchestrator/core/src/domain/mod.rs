// Copyright (c) 2026 Remediator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Domain Layer
//!
//! Pipeline message types, the remediation vocabulary, safety policy and the
//! ports (cluster, message bus, rate-limit store) the application layer
//! drives. Nothing here performs I/O.

pub mod action;
pub mod classification;
pub mod cluster;
pub mod events;
pub mod messaging;
pub mod pipeline_config;
pub mod policy;
pub mod rate_limit;
