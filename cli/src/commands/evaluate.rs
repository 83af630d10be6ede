// Copyright (c) 2026 Remediator Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Dry-run the policy gate
//!
//! Evaluates each action in an NDJSON file against the configured policy with
//! a fresh rate-limit store, so repeated actions within the file are limited
//! exactly as a running gate would limit them. Nothing is executed or published.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use remediator_core::application::policy_gate::{PolicyGate, Verdict};
use remediator_core::domain::events::Action;
use remediator_core::domain::pipeline_config::PipelineConfigManifest;
use remediator_core::infrastructure::rate_limiter::InMemoryRateLimitStore;

use super::read_ndjson;

#[derive(Debug, Args)]
pub struct EvaluateArgs {
    /// NDJSON file of proposed actions
    #[arg(long, value_name = "FILE")]
    pub action: PathBuf,
}

pub async fn execute(args: EvaluateArgs, manifest: PipelineConfigManifest) -> Result<()> {
    let actions: Vec<Action> = read_ndjson(&args.action)?;
    let spec = manifest.spec;
    let gate = PolicyGate::new(spec.policy, Arc::new(InMemoryRateLimitStore::new(spec.rate_limit)));

    let verdicts = evaluate_all(&gate, actions).await;
    for verdict in &verdicts {
        print_verdict(verdict);
    }

    let approved = verdicts.iter().filter(|v| v.is_approved()).count();
    println!();
    println!("{} approved, {} rejected", approved, verdicts.len() - approved);
    Ok(())
}

pub async fn evaluate_all(gate: &PolicyGate, actions: Vec<Action>) -> Vec<Verdict> {
    let mut verdicts = Vec::with_capacity(actions.len());
    for action in actions {
        verdicts.push(gate.evaluate(action).await);
    }
    verdicts
}

fn print_verdict(verdict: &Verdict) {
    let action = verdict.action();
    let label = if verdict.is_approved() {
        "APPROVED".green().bold()
    } else {
        "REJECTED".red().bold()
    };
    println!(
        "{} {} {} {} ({})",
        label,
        action.action_id,
        action.action_type,
        action.target,
        verdict.reason()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use remediator_core::domain::policy::PolicyRules;
    use std::io::Write;

    #[tokio::test]
    async fn test_evaluate_file_applies_rate_limit_within_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for i in 0..4 {
            writeln!(
                file,
                r#"{{"action_id": "a{}", "action_type": "restart_pod", "target": "pod/web-0"}}"#,
                i
            )
            .unwrap();
        }
        writeln!(file, "# comment lines are skipped").unwrap();
        writeln!(
            file,
            r#"{{"actionId": "b", "actionType": "drain_node", "target": "node/n1"}}"#
        )
        .unwrap();

        let actions: Vec<Action> = read_ndjson(file.path()).unwrap();
        let gate = PolicyGate::new(PolicyRules::default(), Arc::new(InMemoryRateLimitStore::default()));
        let verdicts = evaluate_all(&gate, actions).await;

        let approved: Vec<bool> = verdicts.iter().map(Verdict::is_approved).collect();
        assert_eq!(approved, vec![true, true, true, false, false]);
        assert!(verdicts[3].reason().starts_with("Rate limit exceeded"));
    }

    #[test]
    fn test_invalid_record_reports_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"action_id": "a", "action_type": "restart_pod", "target": "pod/x"}}"#).unwrap();
        writeln!(file, "{{broken").unwrap();

        let err = read_ndjson::<Action>(file.path()).unwrap_err();
        assert!(err.to_string().ends_with(":2: invalid JSON record"));
    }
}
