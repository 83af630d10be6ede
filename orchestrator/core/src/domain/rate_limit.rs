// Copyright (c) 2026 Remediator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Action Rate Limiting
//!
//! Bounds how often the same action may hit the same target. Keys are
//! `<action_type>:<target>`; each key holds a sliding window of admission
//! timestamps. Stale entries are evicted lazily on the check path.
//!
//! The store is an injectable trait so a shared or persistent backend can
//! replace [`crate::infrastructure::rate_limiter::InMemoryRateLimitStore`]
//! without touching the policy gate.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Admissions allowed per key within one window.
    #[serde(default = "default_max_actions")]
    pub max_actions: usize,

    #[serde(default = "default_window", with = "humantime_serde")]
    pub window: std::time::Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_actions: default_max_actions(),
            window: default_window(),
        }
    }
}

fn default_max_actions() -> usize {
    3
}

fn default_window() -> std::time::Duration {
    std::time::Duration::from_secs(3600)
}

/// Check-and-record admission store.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Returns `true` and records `now` when the key still has budget in the
    /// window ending at `now`; returns `false` without recording otherwise.
    async fn admit(&self, key: &str, now: DateTime<Utc>) -> bool;

    /// Length of the sliding window, for rejection messages.
    fn window(&self) -> std::time::Duration;
}

/// Renders a window for humans: `hour`, `30 minutes`, `2 hours`, `90 seconds`.
pub fn describe_window(window: std::time::Duration) -> String {
    let secs = window.as_secs();
    let (count, unit) = if secs > 0 && secs % 3600 == 0 {
        (secs / 3600, "hour")
    } else if secs > 0 && secs % 60 == 0 {
        (secs / 60, "minute")
    } else {
        (secs, "second")
    };
    match count {
        1 => unit.to_string(),
        n => format!("{} {}s", n, unit),
    }
}

/// Timestamps recorded for one key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlidingWindow {
    admissions: Vec<DateTime<Utc>>,
}

impl SlidingWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop entries not strictly newer than `now - window`, then admit if under capacity.
    pub fn admit(&mut self, now: DateTime<Utc>, window: Duration, capacity: usize) -> bool {
        if let Some(cutoff) = now.checked_sub_signed(window) {
            self.admissions.retain(|t| *t > cutoff);
        }

        if self.admissions.len() >= capacity {
            return false;
        }

        self.admissions.push(now);
        true
    }

    pub fn len(&self) -> usize {
        self.admissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.admissions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_fourth_admission_in_window_rejected() {
        let mut window = SlidingWindow::new();
        let hour = Duration::hours(1);

        assert!(window.admit(t0(), hour, 3));
        assert!(window.admit(t0() + Duration::minutes(10), hour, 3));
        assert!(window.admit(t0() + Duration::minutes(20), hour, 3));
        assert!(!window.admit(t0() + Duration::minutes(30), hour, 3));
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn test_admission_after_window_elapsed_from_earliest() {
        let mut window = SlidingWindow::new();
        let hour = Duration::hours(1);

        assert!(window.admit(t0(), hour, 3));
        assert!(window.admit(t0() + Duration::minutes(10), hour, 3));
        assert!(window.admit(t0() + Duration::minutes(20), hour, 3));

        // Exactly one window after the earliest entry evicts it.
        assert!(window.admit(t0() + hour, hour, 3));
        assert!(!window.admit(t0() + hour + Duration::seconds(1), hour, 3));
    }

    #[test]
    fn test_rejection_does_not_record() {
        let mut window = SlidingWindow::new();
        let hour = Duration::hours(1);
        for _ in 0..3 {
            assert!(window.admit(t0(), hour, 3));
        }
        for minute in 1..10 {
            assert!(!window.admit(t0() + Duration::minutes(minute), hour, 3));
        }
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn test_describe_window() {
        use std::time::Duration as StdDuration;
        assert_eq!(describe_window(StdDuration::from_secs(3600)), "hour");
        assert_eq!(describe_window(StdDuration::from_secs(1800)), "30 minutes");
        assert_eq!(describe_window(StdDuration::from_secs(7200)), "2 hours");
        assert_eq!(describe_window(StdDuration::from_secs(60)), "minute");
        assert_eq!(describe_window(StdDuration::from_secs(90)), "90 seconds");
    }

    #[test]
    fn test_default_config_is_three_per_hour() {
        let config = RateLimitConfig::default();
        assert_eq!(config.max_actions, 3);
        assert_eq!(config.window, std::time::Duration::from_secs(3600));
    }
}
