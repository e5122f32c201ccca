// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gossip wire types

use dimutex_core::{Member, MembershipError, NodeIdentity};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::time::Instant;

/// SWIM-style liveness of a member
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberState {
    Alive,
    Suspect,
    Dead,
    /// Announced its own departure
    Left,
}

/// A cluster member as known to the gossip layer.
///
/// `incarnation` is bumped only by the member itself, to refute suspicion.
/// Updates with a higher incarnation win.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GossipMember {
    pub identity: NodeIdentity,
    pub gossip_addr: SocketAddr,
    /// Endpoint of the member's mutex RPC server
    pub rpc_addr: SocketAddr,
    pub state: MemberState,
    pub incarnation: u64,

    #[serde(skip)]
    pub last_seen: Option<Instant>,
    /// When the member was declared dead or left; tombstones expire
    #[serde(skip)]
    pub gone_since: Option<Instant>,
}

impl GossipMember {
    pub fn new(identity: NodeIdentity, gossip_addr: SocketAddr, rpc_addr: SocketAddr) -> Self {
        Self {
            identity,
            gossip_addr,
            rpc_addr,
            state: MemberState::Alive,
            incarnation: 1,
            last_seen: None,
            gone_since: None,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.state == MemberState::Alive
    }

    pub fn to_member(&self) -> Member {
        Member::new(self.identity.clone(), self.rpc_addr)
    }
}

/// Datagrams exchanged between gossip services
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GossipMessage {
    /// New member introducing itself to a seed
    Join { member: GossipMember },
    /// Liveness probe; carries the sender so receivers learn about it
    Ping { from: GossipMember },
    /// Reply to a ping with the responder's full member list
    Ack {
        from: NodeIdentity,
        incarnation: u64,
        members: Vec<GossipMember>,
    },
    Suspect { node: NodeIdentity, incarnation: u64 },
    Alive { node: NodeIdentity, incarnation: u64 },
    /// Graceful departure
    Leave { node: NodeIdentity, incarnation: u64 },
}

impl GossipMessage {
    pub fn encode(&self) -> Result<Vec<u8>, MembershipError> {
        serde_json::to_vec(self).map_err(|e| MembershipError::Encoding(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, MembershipError> {
        serde_json::from_slice(bytes).map_err(|e| MembershipError::Encoding(e.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Ping { .. } => "ping",
            Self::Ack { .. } => "ack",
            Self::Suspect { .. } => "suspect",
            Self::Alive { .. } => "alive",
            Self::Leave { .. } => "leave",
        }
    }
}
