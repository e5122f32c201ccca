// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lamport logical clock

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Logical timestamp carried on protocol messages
pub type Timestamp = u64;

/// The clock cannot move past `u64::MAX`. Running into it means a peer is
/// sending bogus timestamps; the clock refuses to advance instead of
/// saturating.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("logical clock overflow: cannot advance past {0}")]
pub struct ClockOverflow(pub Timestamp);

/// Lamport clock approximating happened-before across nodes.
///
/// The value never decreases. `tick` is used for local events (issuing a
/// request, receiving a grant), `observe` for every received timestamp.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalClock {
    current: Timestamp,
}

impl LogicalClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value without advancing
    pub fn now(&self) -> Timestamp {
        self.current
    }

    /// Advance by one and return the new value
    pub fn tick(&mut self) -> Result<Timestamp, ClockOverflow> {
        self.advance_past(self.current)
    }

    /// Merge a remote timestamp: `max(current, remote) + 1`.
    ///
    /// On overflow the clock keeps its previous value.
    pub fn observe(&mut self, remote: Timestamp) -> Result<Timestamp, ClockOverflow> {
        self.advance_past(self.current.max(remote))
    }

    fn advance_past(&mut self, value: Timestamp) -> Result<Timestamp, ClockOverflow> {
        self.current = value.checked_add(1).ok_or(ClockOverflow(value))?;
        Ok(self.current)
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
