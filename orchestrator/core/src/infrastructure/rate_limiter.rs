// Copyright (c) 2026 Remediator Contributors
// SPDX-License-Identifier: AGPL-3.0

// In-memory rate-limit store. Volatile: history resets on restart.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::domain::rate_limit::{RateLimitConfig, RateLimitStore, SlidingWindow};

pub struct InMemoryRateLimitStore {
    windows: Mutex<HashMap<String, SlidingWindow>>,
    configured_window: std::time::Duration,
    window: chrono::Duration,
    capacity: usize,
}

impl InMemoryRateLimitStore {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            configured_window: config.window,
            window: chrono::Duration::from_std(config.window).unwrap_or(chrono::Duration::MAX),
            capacity: config.max_actions,
        }
    }

    /// Admissions currently recorded for `key`, including stale ones not yet evicted.
    pub fn recorded(&self, key: &str) -> usize {
        self.windows.lock().get(key).map(SlidingWindow::len).unwrap_or(0)
    }
}

impl Default for InMemoryRateLimitStore {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn admit(&self, key: &str, now: DateTime<Utc>) -> bool {
        // Held across the whole check-and-record
        let mut windows = self.windows.lock();
        windows
            .entry(key.to_string())
            .or_default()
            .admit(now, self.window, self.capacity)
    }

    fn window(&self) -> std::time::Duration {
        self.configured_window
    }
}
