// Copyright (c) 2026 Remediator Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod backend_factory;
pub mod enricher;
pub mod executor;
pub mod pipeline;
pub mod policy_gate;

pub use backend_factory::{connect_cluster, create_message_bus, ClusterHandles, StageFactory};
pub use enricher::EnrichmentService;
pub use executor::{ActionExecutor, ExecutionError};
pub use pipeline::{run_stage, Stage, StageKind};
pub use policy_gate::{PolicyGate, Verdict};
