// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Membership view adapters

mod fixed;
pub mod gossip;

pub use fixed::StaticMembership;
pub use gossip::{GossipConfig, GossipMembership};

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeMembership;
