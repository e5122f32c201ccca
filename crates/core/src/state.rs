// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Critical section state

use serde::{Deserialize, Serialize};

/// Interest of the local node in the critical section
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CriticalSectionState {
    /// No interest in the critical section
    #[default]
    Released,
    /// A request is multicast and replies are being collected
    Wanted,
    /// The local node is executing the critical section
    Held,
}

impl CriticalSectionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Released => "released",
            Self::Wanted => "wanted",
            Self::Held => "held",
        }
    }
}

impl std::fmt::Display for CriticalSectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
