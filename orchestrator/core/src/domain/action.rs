// Copyright (c) 2026 Remediator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Remediation Vocabulary
//!
//! The closed set of action types the pipeline can automate, the parsed form of
//! an action `target`, and the replica arithmetic behind `scale_deployment`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Canonical, closed vocabulary of automatable actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    RestartPod,
    ScaleDeployment,
    RollingRestartDeployment,
    RollbackDeployment,
    GatherLogs,
    FlushCache,
}

impl ActionKind {
    pub const ALL: [ActionKind; 6] = [
        ActionKind::RestartPod,
        ActionKind::ScaleDeployment,
        ActionKind::RollingRestartDeployment,
        ActionKind::RollbackDeployment,
        ActionKind::GatherLogs,
        ActionKind::FlushCache,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::RestartPod => "restart_pod",
            ActionKind::ScaleDeployment => "scale_deployment",
            ActionKind::RollingRestartDeployment => "rolling_restart_deployment",
            ActionKind::RollbackDeployment => "rollback_deployment",
            ActionKind::GatherLogs => "gather_logs",
            ActionKind::FlushCache => "flush_cache",
        }
    }

    /// Exact, case-sensitive lookup. Anything else is outside the vocabulary.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed action target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceRef {
    Pod(String),
    Deployment(String),
    /// No kind prefix; interpreted by the handler.
    Bare(String),
}

impl ResourceRef {
    pub fn parse(target: &str) -> Self {
        if let Some(name) = target.strip_prefix("deployment/") {
            ResourceRef::Deployment(name.to_string())
        } else if let Some(name) = target.strip_prefix("pod/") {
            ResourceRef::Pod(name.to_string())
        } else {
            ResourceRef::Bare(target.to_string())
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ResourceRef::Pod(name) | ResourceRef::Deployment(name) | ResourceRef::Bare(name) => name,
        }
    }

    pub fn is_deployment(&self) -> bool {
        matches!(self, ResourceRef::Deployment(_))
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceRef::Pod(name) => write!(f, "pod/{}", name),
            ResourceRef::Deployment(name) => write!(f, "deployment/{}", name),
            ResourceRef::Bare(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScaleParamError {
    #[error("missing replicas, replicas_increment, or replicas_increase param")]
    Missing,
    #[error("invalid integer for '{param}': '{value}'")]
    NotAnInteger { param: &'static str, value: String },
    #[error("resulting replica count {0} is negative")]
    Negative(i64),
    #[error("resulting replica count {0} exceeds the maximum of {max}", max = i32::MAX)]
    Overflow(i64),
}

/// Desired replica change for `scale_deployment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleRequest {
    Absolute(i32),
    Increment(i32),
}

impl ScaleRequest {
    /// `replicas` wins over `replicas_increment`, which wins over `replicas_increase`.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, ScaleParamError> {
        if let Some(value) = params.get("replicas") {
            return parse_int("replicas", value).map(ScaleRequest::Absolute);
        }
        for param in ["replicas_increment", "replicas_increase"] {
            if let Some(value) = params.get(param) {
                return parse_int(param, value).map(ScaleRequest::Increment);
            }
        }
        Err(ScaleParamError::Missing)
    }

    pub fn apply(&self, current: i32) -> Result<i32, ScaleParamError> {
        let next = match self {
            ScaleRequest::Absolute(replicas) => i64::from(*replicas),
            ScaleRequest::Increment(delta) => i64::from(current) + i64::from(*delta),
        };
        if next < 0 {
            return Err(ScaleParamError::Negative(next));
        }
        i32::try_from(next).map_err(|_| ScaleParamError::Overflow(next))
    }
}

fn parse_int(param: &'static str, value: &str) -> Result<i32, ScaleParamError> {
    value.trim().parse::<i32>().map_err(|_| ScaleParamError::NotAnInteger {
        param,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_action_kind_vocabulary_is_exact() {
        assert_eq!(ActionKind::parse("scale_deployment"), Some(ActionKind::ScaleDeployment));
        assert_eq!(ActionKind::parse("Scale_Deployment"), None);
        assert_eq!(ActionKind::parse("delete_pod"), None);
        for kind in ActionKind::ALL {
            assert_eq!(ActionKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn test_resource_ref_parsing() {
        assert_eq!(ResourceRef::parse("pod/web-0"), ResourceRef::Pod("web-0".into()));
        assert_eq!(
            ResourceRef::parse("deployment/kafka-ingest"),
            ResourceRef::Deployment("kafka-ingest".into())
        );
        assert_eq!(ResourceRef::parse("kafka-ingest"), ResourceRef::Bare("kafka-ingest".into()));
        assert_eq!(ResourceRef::parse("deployment/api").to_string(), "deployment/api");
    }

    #[test]
    fn test_increment_adds_to_current_replicas() {
        let request = ScaleRequest::from_params(&params(&[("replicas_increment", "1")])).unwrap();
        assert_eq!(request.apply(2).unwrap(), 3);

        let request = ScaleRequest::from_params(&params(&[("replicas_increase", "2")])).unwrap();
        assert_eq!(request.apply(2).unwrap(), 4);
    }

    #[test]
    fn test_absolute_replicas_win_over_increments() {
        let request = ScaleRequest::from_params(&params(&[
            ("replicas", "5"),
            ("replicas_increment", "1"),
            ("replicas_increase", "3"),
        ]))
        .unwrap();
        assert_eq!(request, ScaleRequest::Absolute(5));
        assert_eq!(request.apply(2).unwrap(), 5);
    }

    #[test]
    fn test_increment_wins_over_increase() {
        let request = ScaleRequest::from_params(&params(&[
            ("replicas_increment", "1"),
            ("replicas_increase", "3"),
        ]))
        .unwrap();
        assert_eq!(request, ScaleRequest::Increment(1));
    }

    #[test]
    fn test_missing_and_invalid_scale_params() {
        assert_eq!(
            ScaleRequest::from_params(&params(&[("namespace", "apps")])),
            Err(ScaleParamError::Missing)
        );
        assert!(matches!(
            ScaleRequest::from_params(&params(&[("replicas", "many")])),
            Err(ScaleParamError::NotAnInteger { param: "replicas", .. })
        ));
        assert_eq!(ScaleRequest::Increment(-5).apply(2), Err(ScaleParamError::Negative(-3)));
    }

    #[test]
    fn test_increment_past_i32_max_overflows() {
        let err = ScaleRequest::Increment(i32::MAX).apply(2).unwrap_err();
        assert_eq!(err, ScaleParamError::Overflow(i64::from(i32::MAX) + 2));
        assert!(err.to_string().contains("exceeds the maximum"));
    }
}
