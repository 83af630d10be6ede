// Copyright (c) 2026 Remediator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Policy Gate
//!
//! Admits or rejects each proposed [`Action`] of a [`Decision`]
//! independently. Stateless rules come from [`PolicyRules`]; the rate limit is
//! checked last through an injected [`RateLimitStore`], so a rejected action
//! never consumes rate-limit budget.
//!
//! Rejections are a normal outcome: they are logged with their reason and
//! nothing is forwarded.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::events::{Action, ActionId, Decision};
use crate::domain::policy::{PolicyRules, PolicyViolation};
use crate::domain::rate_limit::{describe_window, RateLimitStore};

/// Outcome of evaluating one action.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Carries the action stamped with the auto-approval tag.
    Approved(Action),
    Rejected {
        action: Action,
        violation: PolicyViolation,
    },
}

impl Verdict {
    pub fn is_approved(&self) -> bool {
        matches!(self, Verdict::Approved(_))
    }

    /// Human-readable reason: `Approved` or the violated rule's message.
    pub fn reason(&self) -> String {
        match self {
            Verdict::Approved(_) => "Approved".to_string(),
            Verdict::Rejected { violation, .. } => violation.to_string(),
        }
    }

    pub fn action(&self) -> &Action {
        match self {
            Verdict::Approved(action) | Verdict::Rejected { action, .. } => action,
        }
    }
}

pub struct PolicyGate {
    rules: PolicyRules,
    rate_limits: Arc<dyn RateLimitStore>,
}

impl PolicyGate {
    pub fn new(rules: PolicyRules, rate_limits: Arc<dyn RateLimitStore>) -> Self {
        Self { rules, rate_limits }
    }

    pub fn rules(&self) -> &PolicyRules {
        &self.rules
    }

    /// Check one action. Records a rate-limit admission only when every
    /// stateless rule has passed.
    pub async fn check(&self, action: &Action) -> Result<(), PolicyViolation> {
        self.rules.check(action)?;

        if !self.rate_limits.admit(&action.rate_limit_key(), Utc::now()).await {
            return Err(PolicyViolation::RateLimited {
                action_type: action.action_type.clone(),
                target: action.target.clone(),
                window: describe_window(self.rate_limits.window()),
            });
        }
        Ok(())
    }

    pub async fn evaluate(&self, action: Action) -> Verdict {
        match self.check(&action).await {
            Ok(()) => {
                info!(
                    action_id = %action.action_id,
                    action_type = %action.action_type,
                    target = %action.target,
                    "Action approved"
                );
                Verdict::Approved(action.approve())
            }
            Err(violation) => {
                warn!(
                    action_id = %action.action_id,
                    action_type = %action.action_type,
                    target = %action.target,
                    reason = %violation,
                    "Action rejected"
                );
                Verdict::Rejected { action, violation }
            }
        }
    }

    /// Evaluate every proposed action in order.
    pub async fn process_decision(&self, decision: Decision) -> Vec<Verdict> {
        info!(
            decision_id = %decision.decision_id,
            actions = decision.proposed_actions.len(),
            "Evaluating decision"
        );

        let mut verdicts = Vec::with_capacity(decision.proposed_actions.len());
        for mut action in decision.proposed_actions {
            if action.decision_id.is_empty() {
                action.decision_id = decision.decision_id.clone();
            }
            if action.action_id.is_empty() {
                action.action_id = ActionId::generate();
            }
            verdicts.push(self.evaluate(action).await);
        }
        verdicts
    }
}
