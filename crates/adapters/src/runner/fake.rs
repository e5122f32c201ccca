// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recording runner for cluster tests
#![cfg_attr(coverage_nightly, coverage(off))]

use async_trait::async_trait;
use dimutex_core::{CriticalSectionRunner, RunnerError};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// One completed critical section
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub node: String,
    pub entered: Instant,
    pub left: Instant,
}

#[derive(Default)]
struct LedgerState {
    inside: Vec<String>,
    entries: Vec<LedgerEntry>,
    overlaps: Vec<(String, String)>,
}

/// Shared record of who was inside the critical section and when
#[derive(Clone, Default)]
pub struct Ledger {
    state: Arc<Mutex<LedgerState>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runner(&self, node: impl Into<String>, hold: Duration) -> LedgerRunner {
        LedgerRunner {
            node: node.into(),
            hold,
            fail: false,
            ledger: self.clone(),
        }
    }

    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.lock().entries.clone()
    }

    /// Pairs of nodes that were inside at the same time
    pub fn overlaps(&self) -> Vec<(String, String)> {
        self.lock().overlaps.clone()
    }

    pub fn count(&self, node: &str) -> usize {
        self.lock().entries.iter().filter(|e| e.node == node).count()
    }

    fn enter(&self, node: &str) {
        let mut state = self.lock();
        let overlaps: Vec<(String, String)> = state
            .inside
            .iter()
            .map(|other| (other.clone(), node.to_string()))
            .collect();
        state.overlaps.extend(overlaps);
        state.inside.push(node.to_string());
    }

    fn leave(&self, node: &str, entered: Instant) {
        let mut state = self.lock();
        state.inside.retain(|n| n != node);
        state.entries.push(LedgerEntry {
            node: node.to_string(),
            entered,
            left: Instant::now(),
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Runner that records its stay in a [`Ledger`]
#[derive(Clone)]
pub struct LedgerRunner {
    node: String,
    hold: Duration,
    fail: bool,
    ledger: Ledger,
}

impl LedgerRunner {
    /// Record the stay, then report failure
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }
}

/// Closes a stay in the ledger when dropped, so a cancelled run still leaves
struct Stay<'a> {
    ledger: &'a Ledger,
    node: &'a str,
    entered: Instant,
}

impl<'a> Stay<'a> {
    fn begin(ledger: &'a Ledger, node: &'a str) -> Self {
        ledger.enter(node);
        Self {
            ledger,
            node,
            entered: Instant::now(),
        }
    }
}

impl Drop for Stay<'_> {
    fn drop(&mut self) {
        self.ledger.leave(self.node, self.entered);
    }
}

#[async_trait]
impl CriticalSectionRunner for LedgerRunner {
    async fn run(&self) -> Result<(), RunnerError> {
        let stay = Stay::begin(&self.ledger, &self.node);
        tokio::time::sleep(self.hold).await;
        drop(stay);
        if self.fail {
            return Err(RunnerError::Failed(format!("{} failed on purpose", self.node)));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
