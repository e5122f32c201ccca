// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for the mutex coordinator's collaborators

pub mod membership;
pub mod peer;
pub mod runner;
pub mod traced;

pub use membership::{GossipConfig, GossipMembership, StaticMembership};
pub use runner::{CommandRunner, HoldRunner, DEFAULT_HOLD};
pub use traced::{TracedConnector, TracedPeerLink, TracedRunner};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use membership::FakeMembership;
#[cfg(any(test, feature = "test-support"))]
pub use peer::{LocalConnector, LocalNetwork, LocalPeerLink, PeerCall};
#[cfg(any(test, feature = "test-support"))]
pub use runner::{Ledger, LedgerEntry, LedgerRunner};
