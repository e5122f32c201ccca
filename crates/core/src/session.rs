// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session: glue between the membership view and the coordinator
//!
//! Keeps the coordinator's peer links in line with the members the view
//! reports alive, and drives the periodic request loop for the hosting
//! process. Owns no protocol state.

use crate::coordinator::MutexCoordinator;
use crate::error::CoordinatorError;
use crate::id::NodeIdentity;
use crate::traits::{CriticalSectionRunner, Member, MembershipView, PeerConnector};
use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Result of reconciling the peer links with a membership snapshot
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PeerSetChange {
    pub joined: Vec<NodeIdentity>,
    pub left: Vec<NodeIdentity>,
}

impl PeerSetChange {
    pub fn is_empty(&self) -> bool {
        self.joined.is_empty() && self.left.is_empty()
    }
}

/// Open links, keyed by peer identity
pub struct PeerBook<L> {
    links: BTreeMap<NodeIdentity, (SocketAddr, L)>,
}

impl<L> Default for PeerBook<L> {
    fn default() -> Self {
        Self {
            links: BTreeMap::new(),
        }
    }
}

impl<L: Clone> PeerBook<L> {
    /// Open links for new members, drop links of departed ones.
    ///
    /// A member that reappears at a different address gets a fresh link.
    pub fn reconcile<C>(&mut self, members: &BTreeSet<Member>, connector: &C) -> PeerSetChange
    where
        C: PeerConnector<Link = L>,
    {
        let mut change = PeerSetChange::default();
        let wanted: BTreeMap<&NodeIdentity, &Member> =
            members.iter().map(|m| (&m.identity, m)).collect();

        self.links.retain(|identity, (addr, _)| {
            let keep = wanted.get(identity).is_some_and(|m| m.addr == *addr);
            if !keep {
                change.left.push(identity.clone());
            }
            keep
        });

        for (identity, member) in wanted {
            if !self.links.contains_key(identity) {
                self.links
                    .insert(identity.clone(), (member.addr, connector.connect(member)));
                change.joined.push(identity.clone());
            }
        }

        // An address change shows up as both; report it as a join only
        change.left.retain(|identity| !change.joined.contains(identity));
        change
    }

    pub fn links(&self) -> BTreeMap<NodeIdentity, L> {
        self.links
            .iter()
            .map(|(identity, (_, link))| (identity.clone(), link.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

/// Hosts one coordinator for the lifetime of the process
pub struct Session<M, C: PeerConnector> {
    membership: M,
    connector: C,
    coordinator: MutexCoordinator<C::Link>,
}

impl<M, C> Session<M, C>
where
    M: MembershipView,
    C: PeerConnector,
{
    pub fn new(membership: M, connector: C, coordinator: MutexCoordinator<C::Link>) -> Self {
        Self {
            membership,
            connector,
            coordinator,
        }
    }

    pub fn coordinator(&self) -> &MutexCoordinator<C::Link> {
        &self.coordinator
    }

    /// Follow the membership view until shutdown, pushing every change of
    /// the alive set into the coordinator immediately.
    pub async fn sync_peers(&self, mut shutdown: watch::Receiver<bool>) {
        let mut members = self.membership.subscribe();
        let mut book = PeerBook::default();

        loop {
            let snapshot = members.borrow_and_update().clone();
            let change = book.reconcile(&snapshot, &self.connector);
            if !change.is_empty() {
                for peer in &change.joined {
                    info!(%peer, "peer joined");
                }
                for peer in &change.left {
                    info!(%peer, "peer left");
                }
                self.coordinator.update_peers(book.links());
                debug!(peers = book.len(), "peer set updated");
            }

            tokio::select! {
                changed = members.changed() => {
                    if changed.is_err() {
                        warn!("membership view closed, peer set frozen");
                        break;
                    }
                }
                _ = shutdown.wait_for(|stop| *stop) => break,
            }
        }
    }

    /// Every `request_interval`, run the critical section through the
    /// coordinator. Failed acquisitions are logged and retried next round.
    pub async fn request_loop<R>(&self, runner: &R, mut shutdown: watch::Receiver<bool>)
    where
        R: CriticalSectionRunner + ?Sized,
    {
        let config = self.coordinator.config().clone();

        loop {
            tokio::select! {
                _ = tokio::time::sleep(config.request_interval) => {}
                _ = shutdown.wait_for(|stop| *stop) => break,
            }

            info!(node = %self.coordinator.identity(), "requesting access to critical section");
            tokio::select! {
                result = self.coordinator.run_critical_section(runner, config.acquire_timeout) => {
                    match result {
                        Ok(()) => {}
                        Err(e @ CoordinatorError::AcquireFailed { .. }) => {
                            warn!(error = %e, "acquisition failed, retrying next round");
                        }
                        Err(CoordinatorError::Runner(e)) => {
                            error!(error = %e, "critical section work failed");
                        }
                        Err(e) => {
                            error!(error = %e, "request loop stopped");
                            break;
                        }
                    }
                }
                // Dropping the request abandons any claim and answers deferred peers
                _ = shutdown.wait_for(|stop| *stop) => break,
            }
        }
        info!("request loop stopped");
    }

    /// Run peer sync and the request loop together until shutdown
    pub async fn run<R>(&self, runner: &R, shutdown: watch::Receiver<bool>)
    where
        R: CriticalSectionRunner + ?Sized,
    {
        tokio::join!(
            self.sync_peers(shutdown.clone()),
            self.request_loop(runner, shutdown)
        );
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
