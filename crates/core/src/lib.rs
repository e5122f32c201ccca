// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dimutex-core: distributed mutual exclusion protocol
//!
//! This crate provides:
//! - Lamport logical clock and node identities
//! - The Ricart–Agrawala coordinator with its deferred-reply queue
//! - Traits for the collaborators it consumes (membership, peer links,
//!   critical section work)
//! - The session glue that keeps peer links in line with membership

pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod id;
pub mod message;
pub mod session;
pub mod state;
pub mod traits;

// Re-exports
pub use clock::{ClockOverflow, LogicalClock, Timestamp};
pub use config::CoordinatorConfig;
pub use coordinator::{Answer, CoordinatorStatus, DeferredGrant, MutexCoordinator};
pub use error::CoordinatorError;
pub use id::NodeIdentity;
pub use message::{AccessGrant, AccessRequest};
pub use session::{PeerBook, PeerSetChange, Session};
pub use state::CriticalSectionState;
pub use traits::{
    CriticalSectionRunner, Member, MembershipError, MembershipView, PeerConnector, PeerError,
    PeerLink, RunnerError,
};
