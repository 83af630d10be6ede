// Copyright (c) 2026 Remediator Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the Remediator CLI

pub mod config;
pub mod evaluate;
pub mod replay;
pub mod run;

pub use self::config::ConfigCommand;
pub use self::evaluate::EvaluateArgs;
pub use self::replay::ReplayArgs;
pub use self::run::RunArgs;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Read newline-delimited JSON. Blank lines and `#` comments are skipped.
pub(crate) fn read_ndjson<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid JSON record", path.display(), index + 1))
        })
        .collect()
}
