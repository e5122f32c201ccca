// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordinator errors

use crate::clock::ClockOverflow;
use crate::id::NodeIdentity;
use crate::state::CriticalSectionState;
use crate::traits::{PeerError, RunnerError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Operation called in a state that does not allow it; a caller bug
    #[error("protocol violation: {operation} called while {state}")]
    ProtocolViolation {
        operation: &'static str,
        state: CriticalSectionState,
    },

    /// Deadline passed before every required peer granted access
    #[error(
        "acquire failed: {} peer(s) did not grant in time ({} transport failure(s))",
        .missing.len(),
        .failures.len()
    )]
    AcquireFailed {
        missing: Vec<NodeIdentity>,
        failures: Vec<(NodeIdentity, PeerError)>,
    },

    #[error(transparent)]
    Runner(#[from] RunnerError),

    /// A timestamp pushed the logical clock to its limit
    #[error(transparent)]
    Clock(#[from] ClockOverflow),

    /// The coordinator went away before answering a deferred request
    #[error("coordinator dropped before granting deferred request")]
    Dropped,
}

impl CoordinatorError {
    /// Whether retrying with a fresh timestamp can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::AcquireFailed { .. })
    }
}
