// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runner that simply occupies the critical section for a while

use async_trait::async_trait;
use dimutex_core::{CriticalSectionRunner, RunnerError};
use std::time::Duration;

pub const DEFAULT_HOLD: Duration = Duration::from_secs(7);

#[derive(Clone, Debug)]
pub struct HoldRunner {
    node: String,
    hold: Duration,
}

impl HoldRunner {
    pub fn new(node: impl Into<String>, hold: Duration) -> Self {
        Self {
            node: node.into(),
            hold,
        }
    }

    pub fn hold(&self) -> Duration {
        self.hold
    }
}

#[async_trait]
impl CriticalSectionRunner for HoldRunner {
    async fn run(&self) -> Result<(), RunnerError> {
        tracing::info!("{} has gotten access to the critical section", self.node);
        tokio::time::sleep(self.hold).await;
        tracing::info!("{} has released the critical section", self.node);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn holds_for_configured_duration() {
        let runner = HoldRunner::new("alpha", DEFAULT_HOLD);
        let start = tokio::time::Instant::now();
        runner.run().await.unwrap();
        assert_eq!(start.elapsed(), DEFAULT_HOLD);
    }
}
