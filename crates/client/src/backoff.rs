// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Capped exponential backoff for reconnection.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Reconnection policy for subscription channels.
///
/// Retries never give up: every failed attempt schedules exactly one more
/// until the channel is closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Delay before the first retry (milliseconds).
    pub initial_delay_ms: u64,
    /// Maximum delay between attempts (seconds).
    pub max_delay_secs: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        ReconnectConfig {
            initial_delay_ms: 100,
            max_delay_secs: 30,
        }
    }
}

/// Backoff state for one connection loop.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial_ms: u64,
    max_ms: u64,
    next_ms: u64,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: &ReconnectConfig) -> Self {
        let max_ms = config.max_delay_secs.saturating_mul(1000).max(1);
        let initial_ms = config.initial_delay_ms.clamp(1, max_ms);
        Backoff {
            initial_ms,
            max_ms,
            next_ms: initial_ms,
            attempt: 0,
        }
    }

    /// Number of failures since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Records a failure and returns how long to wait before retrying.
    pub fn next_delay(&mut self) -> Duration {
        let delay = Duration::from_millis(self.next_ms);
        self.attempt = self.attempt.saturating_add(1);
        self.next_ms = std::cmp::min(self.next_ms.saturating_mul(2), self.max_ms);
        delay
    }

    /// Resets after a successful connection.
    pub fn reset(&mut self) {
        self.next_ms = self.initial_ms;
        self.attempt = 0;
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
