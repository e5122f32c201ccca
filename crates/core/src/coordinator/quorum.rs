// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Quorum barrier for one acquisition attempt

use crate::id::NodeIdentity;
use crate::traits::PeerError;
use std::collections::BTreeMap;

/// Where one required peer stands for the current claim
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Progress {
    /// Required, but no link is known yet to send the request over
    Undispatched,
    InFlight,
    Granted,
    Failed(PeerError),
}

/// Tracks the peers whose grant the current claim still needs.
///
/// Starts from the peer set snapshot taken at multicast time. Departures
/// reported by the membership view shrink it; peers that must be consulted
/// after the fact (joiners, requesters granted while waiting) extend it.
#[derive(Clone, Debug, Default)]
pub(crate) struct QuorumBarrier {
    peers: BTreeMap<NodeIdentity, Progress>,
}

impl QuorumBarrier {
    pub(crate) fn new(snapshot: impl IntoIterator<Item = NodeIdentity>) -> Self {
        Self {
            peers: snapshot
                .into_iter()
                .map(|peer| (peer, Progress::InFlight))
                .collect(),
        }
    }

    /// Add a peer to the quorum. Returns false if it was already tracked.
    pub(crate) fn require(&mut self, peer: NodeIdentity) -> bool {
        if self.peers.contains_key(&peer) {
            return false;
        }
        self.peers.insert(peer, Progress::Undispatched);
        true
    }

    /// Whether a request has to go out to `peer`: it was never sent, or the
    /// last call failed and a fresh link may get through
    pub(crate) fn needs_dispatch(&self, peer: &NodeIdentity) -> bool {
        matches!(
            self.peers.get(peer),
            Some(Progress::Undispatched | Progress::Failed(_))
        )
    }

    pub(crate) fn mark_dispatched(&mut self, peer: &NodeIdentity) {
        if let Some(progress) = self.peers.get_mut(peer) {
            *progress = Progress::InFlight;
        }
    }

    /// Count a grant. Grants from peers outside the quorum are ignored.
    pub(crate) fn record_grant(&mut self, peer: &NodeIdentity) -> bool {
        match self.peers.get_mut(peer) {
            Some(progress) if *progress != Progress::Granted => {
                *progress = Progress::Granted;
                true
            }
            _ => false,
        }
    }

    /// A failed call never counts as a grant
    pub(crate) fn record_failure(&mut self, peer: &NodeIdentity, error: PeerError) {
        if let Some(progress) = self.peers.get_mut(peer) {
            if *progress != Progress::Granted {
                *progress = Progress::Failed(error);
            }
        }
    }

    /// Drop a departed peer from the quorum. Returns true if it was still needed.
    pub(crate) fn forget(&mut self, peer: &NodeIdentity) -> bool {
        matches!(self.peers.remove(peer), Some(progress) if progress != Progress::Granted)
    }

    pub(crate) fn is_satisfied(&self) -> bool {
        self.peers
            .values()
            .all(|progress| *progress == Progress::Granted)
    }

    pub(crate) fn granted(&self) -> usize {
        self.peers
            .values()
            .filter(|progress| **progress == Progress::Granted)
            .count()
    }

    pub(crate) fn required(&self) -> usize {
        self.peers.len()
    }

    pub(crate) fn missing(&self) -> Vec<NodeIdentity> {
        self.peers
            .iter()
            .filter(|(_, progress)| **progress != Progress::Granted)
            .map(|(peer, _)| peer.clone())
            .collect()
    }

    pub(crate) fn failures(&self) -> Vec<(NodeIdentity, PeerError)> {
        self.peers
            .iter()
            .filter_map(|(peer, progress)| match progress {
                Progress::Failed(error) => Some((peer.clone(), error.clone())),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "quorum_tests.rs"]
mod tests;
