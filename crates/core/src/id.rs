// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node identity

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Unique, immutable identity of a node for the lifetime of its process.
///
/// Identities order by numeric id first and name second. That order is the
/// tie-break key between requests carrying the same logical timestamp.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeIdentity {
    pub id: u64,
    pub name: String,
}

impl NodeIdentity {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Random identity for nodes started without explicit configuration.
    ///
    /// Ids stay below 2^63 so they fit signed 64-bit config formats.
    pub fn generate() -> Self {
        let uuid = uuid::Uuid::new_v4();
        let (high, _) = uuid.as_u64_pair();
        Self {
            id: high >> 1,
            name: format!("node-{}", uuid.simple()),
        }
    }
}

impl Ord for NodeIdentity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id
            .cmp(&other.id)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for NodeIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.name, self.id)
    }
}
