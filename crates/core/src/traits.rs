// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interfaces of the collaborators the coordinator consumes

use crate::id::NodeIdentity;
use crate::message::{AccessGrant, AccessRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::sync::watch;

// =============================================================================
// Membership
// =============================================================================

/// A reachable peer as reported by the membership view
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Member {
    pub identity: NodeIdentity,
    /// Address of the peer's mutex RPC endpoint
    pub addr: SocketAddr,
}

impl Member {
    pub fn new(identity: NodeIdentity, addr: SocketAddr) -> Self {
        Self { identity, addr }
    }
}

/// Errors from membership operations
#[derive(Debug, Error)]
pub enum MembershipError {
    #[error("failed to bind gossip socket at {0}: {1}")]
    Bind(SocketAddr, #[source] std::io::Error),
    #[error("gossip encoding error: {0}")]
    Encoding(String),
    #[error("membership view closed")]
    Closed,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Changing set of alive peers, excluding the local node
pub trait MembershipView: Clone + Send + Sync + 'static {
    /// Snapshot of the members currently considered alive
    fn current_members(&self) -> BTreeSet<Member>;

    /// Receiver updated whenever a member joins or leaves
    fn subscribe(&self) -> watch::Receiver<BTreeSet<Member>>;
}

// =============================================================================
// Peer link
// =============================================================================

/// Errors from a single point-to-point call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeerError {
    #[error("peer {peer} unreachable: {reason}")]
    Unreachable { peer: String, reason: String },
    #[error("peer {0} timed out")]
    Timeout(String),
    #[error("peer {0} closed the connection before granting")]
    Closed(String),
    #[error("protocol error talking to {peer}: {reason}")]
    Protocol { peer: String, reason: String },
    #[error("peer {peer} rejected the request: {reason}")]
    Rejected { peer: String, reason: String },
}

/// Point-to-point channel to one peer.
///
/// A call delivers the request at most once and resolves with the peer's
/// grant, which may arrive much later if the peer defers. No retries.
#[async_trait]
pub trait PeerLink: Clone + Send + Sync + 'static {
    /// Identity of the peer on the other end
    fn peer(&self) -> &NodeIdentity;

    /// Deliver an access request and wait for the grant
    async fn request_access(&self, request: AccessRequest) -> Result<AccessGrant, PeerError>;
}

/// Builds peer links for members reported by the membership view
pub trait PeerConnector: Clone + Send + Sync + 'static {
    type Link: PeerLink;

    fn connect(&self, member: &Member) -> Self::Link;
}

// =============================================================================
// Critical section
// =============================================================================

/// Errors from the critical section work
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("critical section failed: {0}")]
    Failed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Unit of work executed while the node holds exclusive access
#[async_trait]
pub trait CriticalSectionRunner: Send + Sync {
    async fn run(&self) -> Result<(), RunnerError>;
}
