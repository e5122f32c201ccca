// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning for the mutual exclusion protocol
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Deadline for collecting grants from every required peer
    #[serde(with = "humantime_serde")]
    pub acquire_timeout: Duration,
    /// Pause between acquisitions issued by the session loop
    #[serde(with = "humantime_serde")]
    pub request_interval: Duration,
}

impl CoordinatorConfig {
    pub fn new() -> Self {
        Self {
            acquire_timeout: Duration::from_secs(30),
            request_interval: Duration::from_secs(2),
        }
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn with_request_interval(mut self, interval: Duration) -> Self {
        self.request_interval = interval;
        self
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::new()
    }
}
