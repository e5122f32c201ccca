// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process peer links
//!
//! The networked link lives with the daemon's wire protocol; this module
//! only carries the in-memory network used to run whole clusters in tests.

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{LocalConnector, LocalNetwork, LocalPeerLink, PeerCall};
