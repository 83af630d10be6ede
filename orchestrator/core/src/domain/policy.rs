// Copyright (c) 2026 Remediator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Remediation Safety Policy
//!
//! Static admission rules for proposed actions. [`PolicyRules::check`] applies
//! them in a fixed order and returns the first violation:
//!
//! 1. action type must be in the allowlist
//! 2. action type must not contain a forbidden verb (`delete`)
//! 3. namespace resolves from `params.namespace`, defaulting to `default`
//! 4. hard-blocked namespaces (`kube-system`) are always rejected
//! 5. namespace must be in the allowed set; anything else needs a human
//!
//! Rate limiting is the final gate and lives in [`crate::domain::rate_limit`],
//! because it is the only rule with state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::domain::action::ActionKind;
use crate::domain::events::Action;

pub const HARD_BLOCKED_NAMESPACES: &[&str] = &["kube-system"];
pub const FORBIDDEN_VERBS: &[&str] = &["delete"];

/// Reason an action was refused. `Display` is the human-readable reason.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicyViolation {
    #[error("Action type '{action_type}' is not in the AllowList")]
    NotAllowlisted { action_type: String },

    #[error("Automatic deletion is forbidden")]
    ForbiddenVerb { action_type: String },

    #[error("Cannot perform actions in {namespace} namespace")]
    NamespaceBlocked { namespace: String },

    #[error("Namespace '{namespace}' requires human approval")]
    RequiresHumanApproval { namespace: String },

    /// `window` is pre-rendered, e.g. `hour` or `30 minutes`.
    #[error("Rate limit exceeded: Too many '{action_type}' actions on '{target}' in the last {window}")]
    RateLimited {
        action_type: String,
        target: String,
        window: String,
    },
}

impl PolicyViolation {
    /// Short label for metrics.
    pub fn rule(&self) -> &'static str {
        match self {
            PolicyViolation::NotAllowlisted { .. } => "allowlist",
            PolicyViolation::ForbiddenVerb { .. } => "forbidden_verb",
            PolicyViolation::NamespaceBlocked { .. } => "namespace_blocked",
            PolicyViolation::RequiresHumanApproval { .. } => "human_approval",
            PolicyViolation::RateLimited { .. } => "rate_limit",
        }
    }
}

/// Allowlists for autonomous remediation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRules {
    /// Subset of the canonical vocabulary permitted without approval.
    #[serde(default = "default_allowed_actions")]
    pub allowed_actions: BTreeSet<ActionKind>,

    #[serde(default = "default_allowed_namespaces")]
    pub allowed_namespaces: BTreeSet<String>,
}

impl Default for PolicyRules {
    fn default() -> Self {
        Self {
            allowed_actions: default_allowed_actions(),
            allowed_namespaces: default_allowed_namespaces(),
        }
    }
}

impl PolicyRules {
    /// Apply the stateless rules in order. Returns the resolved namespace on success.
    pub fn check<'a>(&self, action: &'a Action) -> Result<&'a str, PolicyViolation> {
        let allowlisted = ActionKind::parse(&action.action_type)
            .is_some_and(|kind| self.allowed_actions.contains(&kind));
        if !allowlisted {
            return Err(PolicyViolation::NotAllowlisted {
                action_type: action.action_type.clone(),
            });
        }

        if contains_forbidden_verb(&action.action_type) {
            return Err(PolicyViolation::ForbiddenVerb {
                action_type: action.action_type.clone(),
            });
        }

        let namespace = action.namespace();

        if HARD_BLOCKED_NAMESPACES.contains(&namespace) {
            return Err(PolicyViolation::NamespaceBlocked {
                namespace: namespace.to_string(),
            });
        }

        if !self.allowed_namespaces.contains(namespace) {
            return Err(PolicyViolation::RequiresHumanApproval {
                namespace: namespace.to_string(),
            });
        }

        Ok(namespace)
    }
}

/// Case-insensitive substring match against [`FORBIDDEN_VERBS`].
pub fn contains_forbidden_verb(action_type: &str) -> bool {
    let lowered = action_type.to_lowercase();
    FORBIDDEN_VERBS.iter().any(|verb| lowered.contains(verb))
}

fn default_allowed_actions() -> BTreeSet<ActionKind> {
    ActionKind::ALL.into_iter().collect()
}

fn default_allowed_namespaces() -> BTreeSet<String> {
    ["default", "apps", "staging"].into_iter().map(String::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::ActionId;
    use std::collections::HashMap;

    fn action(action_type: &str, namespace: Option<&str>) -> Action {
        let mut params = HashMap::new();
        if let Some(ns) = namespace {
            params.insert("namespace".to_string(), ns.to_string());
        }
        Action {
            action_id: ActionId::new("a-1"),
            decision_id: String::new(),
            action_type: action_type.to_string(),
            target: "deployment/api".to_string(),
            params,
            reasoning: None,
            approver: None,
        }
    }

    #[test]
    fn test_canonical_actions_pass_in_default_namespace() {
        let rules = PolicyRules::default();
        for kind in ActionKind::ALL {
            assert_eq!(rules.check(&action(kind.as_str(), None)), Ok("default"));
        }
    }

    #[test]
    fn test_unknown_action_types_rejected_everywhere() {
        let rules = PolicyRules::default();
        for ns in [None, Some("default"), Some("apps"), Some("kube-system"), Some("production")] {
            let err = rules.check(&action("drain_node", ns)).unwrap_err();
            assert!(matches!(err, PolicyViolation::NotAllowlisted { .. }));
        }
        let err = rules.check(&action("RESTART_POD", None)).unwrap_err();
        assert_eq!(err.to_string(), "Action type 'RESTART_POD' is not in the AllowList");
    }

    #[test]
    fn test_delete_actions_never_pass() {
        let rules = PolicyRules::default();
        let err = rules.check(&action("delete_namespace", None)).unwrap_err();
        assert!(matches!(err, PolicyViolation::NotAllowlisted { .. }));

        assert!(contains_forbidden_verb("delete_pod"));
        assert!(contains_forbidden_verb("Force_DELETE"));
        assert!(!contains_forbidden_verb("restart_pod"));
    }

    #[test]
    fn test_kube_system_is_hard_blocked() {
        let mut rules = PolicyRules::default();
        rules.allowed_namespaces.insert("kube-system".to_string());

        let err = rules.check(&action("restart_pod", Some("kube-system"))).unwrap_err();
        assert_eq!(
            err,
            PolicyViolation::NamespaceBlocked { namespace: "kube-system".to_string() }
        );
        assert_eq!(err.to_string(), "Cannot perform actions in kube-system namespace");
    }

    #[test]
    fn test_unlisted_namespace_requires_human_approval() {
        let rules = PolicyRules::default();
        let err = rules.check(&action("scale_deployment", Some("production"))).unwrap_err();
        assert_eq!(err.to_string(), "Namespace 'production' requires human approval");
        assert_eq!(err.rule(), "human_approval");

        assert_eq!(rules.check(&action("scale_deployment", Some("staging"))), Ok("staging"));
    }

    #[test]
    fn test_narrowed_allowlist() {
        let rules = PolicyRules {
            allowed_actions: [ActionKind::GatherLogs].into_iter().collect(),
            ..PolicyRules::default()
        };
        assert!(rules.check(&action("gather_logs", None)).is_ok());
        assert!(rules.check(&action("restart_pod", None)).is_err());
    }
}
