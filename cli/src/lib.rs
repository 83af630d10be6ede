// Copyright (c) 2026 Remediator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Remediator CLI library - exposes testable components
//!
//! # Architecture
//!
//! - **Layer:** Interface / Presentation Layer
//! - **Purpose:** Command handlers behind the `remediator` binary

pub mod commands;
