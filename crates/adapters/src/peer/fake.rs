// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory network of coordinators for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use async_trait::async_trait;
use dimutex_core::{
    AccessGrant, AccessRequest, CoordinatorError, Member, MutexCoordinator, NodeIdentity,
    PeerConnector, PeerError, PeerLink,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

/// Recorded peer call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerCall {
    pub from: NodeIdentity,
    pub to: NodeIdentity,
    pub request: AccessRequest,
}

#[derive(Default)]
struct NetworkState {
    nodes: HashMap<NodeIdentity, MutexCoordinator<LocalPeerLink>>,
    /// Directed pairs whose messages are dropped
    cut: BTreeSet<(NodeIdentity, NodeIdentity)>,
    calls: Vec<PeerCall>,
}

/// Shared registry that routes requests straight into peer coordinators
#[derive(Clone, Default)]
pub struct LocalNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `coordinator` reachable under its identity
    pub fn register(&self, coordinator: MutexCoordinator<LocalPeerLink>) {
        let mut state = self.lock();
        state
            .nodes
            .insert(coordinator.identity().clone(), coordinator);
    }

    /// Make a node unreachable; its in-flight deferred answers still arrive
    pub fn unregister(&self, identity: &NodeIdentity) {
        self.lock().nodes.remove(identity);
    }

    /// Drop requests in both directions between `a` and `b`
    pub fn partition(&self, a: &NodeIdentity, b: &NodeIdentity) {
        let mut state = self.lock();
        state.cut.insert((a.clone(), b.clone()));
        state.cut.insert((b.clone(), a.clone()));
    }

    pub fn heal(&self) {
        self.lock().cut.clear();
    }

    pub fn connector(&self, from: NodeIdentity) -> LocalConnector {
        LocalConnector {
            from,
            network: self.clone(),
        }
    }

    pub fn link(&self, from: NodeIdentity, to: NodeIdentity) -> LocalPeerLink {
        LocalPeerLink {
            from,
            peer: to,
            network: self.clone(),
        }
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<PeerCall> {
        self.lock().calls.clone()
    }

    fn route(
        &self,
        from: &NodeIdentity,
        to: &NodeIdentity,
        request: &AccessRequest,
    ) -> Result<MutexCoordinator<LocalPeerLink>, PeerError> {
        let mut state = self.lock();
        state.calls.push(PeerCall {
            from: from.clone(),
            to: to.clone(),
            request: request.clone(),
        });
        if state.cut.contains(&(from.clone(), to.clone())) {
            return Err(PeerError::Unreachable {
                peer: to.to_string(),
                reason: "partitioned".to_string(),
            });
        }
        state.nodes.get(to).cloned().ok_or_else(|| PeerError::Unreachable {
            peer: to.to_string(),
            reason: "not registered".to_string(),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, NetworkState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Link from one registered node to another
#[derive(Clone)]
pub struct LocalPeerLink {
    from: NodeIdentity,
    peer: NodeIdentity,
    network: LocalNetwork,
}

#[async_trait]
impl PeerLink for LocalPeerLink {
    fn peer(&self) -> &NodeIdentity {
        &self.peer
    }

    async fn request_access(&self, request: AccessRequest) -> Result<AccessGrant, PeerError> {
        let target = self.network.route(&self.from, &self.peer, &request)?;
        target
            .answer_request(request)
            .into_grant()
            .await
            .map_err(|e| match e {
                CoordinatorError::Dropped => PeerError::Closed(self.peer.to_string()),
                other => PeerError::Rejected {
                    peer: self.peer.to_string(),
                    reason: other.to_string(),
                },
            })
    }
}

/// Connector handing out links within a [`LocalNetwork`]
#[derive(Clone)]
pub struct LocalConnector {
    from: NodeIdentity,
    network: LocalNetwork,
}

impl PeerConnector for LocalConnector {
    type Link = LocalPeerLink;

    fn connect(&self, member: &Member) -> LocalPeerLink {
        self.network.link(self.from.clone(), member.identity.clone())
    }
}
