// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol messages exchanged between coordinators

use crate::clock::Timestamp;
use crate::id::NodeIdentity;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One acquisition attempt, identified by `(timestamp, requester)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessRequest {
    pub requester: NodeIdentity,
    pub timestamp: Timestamp,
}

impl AccessRequest {
    pub fn new(requester: NodeIdentity, timestamp: Timestamp) -> Self {
        Self {
            requester,
            timestamp,
        }
    }

    /// Ordering key: timestamp first, requester identity breaks ties
    pub fn key(&self) -> (Timestamp, &NodeIdentity) {
        (self.timestamp, &self.requester)
    }

    /// True if this request wins against `other` (smaller key wins)
    pub fn precedes(&self, other: &AccessRequest) -> bool {
        self.cmp_priority(other) == Ordering::Less
    }

    pub fn cmp_priority(&self, other: &AccessRequest) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl std::fmt::Display for AccessRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.requester, self.timestamp)
    }
}

/// Acknowledgement that the sender no longer stands in the requester's way.
///
/// Carries no payload: its presence is the grant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
