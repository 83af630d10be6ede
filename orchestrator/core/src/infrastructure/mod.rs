// Copyright (c) 2026 Remediator Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod event_bus;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod kubernetes;
pub mod metrics;
pub mod rate_limiter;
pub mod simulation;

pub use event_bus::InMemoryMessageBus;
pub use kubernetes::KubeClusterBackend;
pub use rate_limiter::InMemoryRateLimitStore;
pub use simulation::SimulatedClusterBackend;
