// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! UDP gossip membership
//!
//! Each node pings one random alive member per interval and merges the
//! member list carried back in the ack. Silent members become suspect and
//! then dead; a suspected node refutes by bumping its incarnation. Seeds are
//! only used to join; an unreachable seed is logged and skipped.

mod config;
mod table;
mod types;

pub use config::GossipConfig;
pub use table::{FailureSweep, MemberTable};
pub use types::{GossipMember, GossipMessage, MemberState};

use dimutex_core::{Member, MembershipError, MembershipView, NodeIdentity};
use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const MAX_DATAGRAM: usize = 65_507;

/// Membership view backed by a gossip protocol
#[derive(Clone)]
pub struct GossipMembership {
    inner: Arc<Inner>,
}

struct Inner {
    config: GossipConfig,
    socket: UdpSocket,
    local_addr: SocketAddr,
    table: Mutex<MemberTable>,
    view: watch::Sender<BTreeSet<Member>>,
    stop: watch::Sender<bool>,
}

impl GossipMembership {
    /// Bind the gossip socket, announce ourselves to the seeds and start the
    /// background loops.
    ///
    /// `rpc_addr` is what other members will dial for mutex requests.
    pub async fn start(
        identity: NodeIdentity,
        rpc_addr: SocketAddr,
        config: GossipConfig,
    ) -> Result<Self, MembershipError> {
        let socket = UdpSocket::bind(config.bind)
            .await
            .map_err(|e| MembershipError::Bind(config.bind, e))?;
        let bound = socket.local_addr()?;
        let local_addr = config.advertise.unwrap_or(bound);

        let mut local = GossipMember::new(identity, local_addr, rpc_addr);
        local.incarnation = startup_incarnation();

        let (view, _) = watch::channel(BTreeSet::new());
        let (stop, _) = watch::channel(false);
        let membership = Self {
            inner: Arc::new(Inner {
                config,
                socket,
                local_addr,
                table: Mutex::new(MemberTable::new(local)),
                view,
                stop,
            }),
        };

        info!(
            node = %membership.identity(),
            gossip = %local_addr,
            rpc = %rpc_addr,
            "gossip membership started"
        );
        membership.join_seeds().await;

        tokio::spawn(membership.clone().receive_loop());
        tokio::spawn(membership.clone().gossip_loop());
        tokio::spawn(membership.clone().failure_detection_loop());
        Ok(membership)
    }

    pub fn identity(&self) -> NodeIdentity {
        self.table().local().identity.clone()
    }

    /// Address other members send gossip to
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    /// Announce our departure and stop the background loops
    pub async fn leave(&self) {
        let (farewell, targets) = {
            let mut table = self.table();
            (table.farewell(), table.broadcast_targets())
        };
        info!(peers = targets.len(), "leaving cluster");
        self.broadcast(&farewell, &targets).await;
        self.inner.stop.send_replace(true);
    }

    async fn join_seeds(&self) {
        let join = GossipMessage::Join {
            member: self.table().local().clone(),
        };
        for seed in &self.inner.config.seeds {
            if *seed == self.inner.local_addr {
                continue;
            }
            match self.send(&join, *seed).await {
                Ok(()) => info!(%seed, "sent join request"),
                Err(e) => warn!(%seed, error = %e, "seed unreachable, continuing"),
            }
        }
    }

    async fn gossip_loop(self) {
        let mut stop = self.inner.stop.subscribe();
        let mut interval = tokio::time::interval(self.inner.config.interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = stop.wait_for(|stop| *stop) => break,
            }

            let (ping, target) = {
                let table = self.table();
                (table.ping(), table.probe_target(&mut rand::thread_rng()))
            };
            let Some(target) = target else {
                continue;
            };
            if let Err(e) = self.send(&ping, target).await {
                warn!(%target, error = %e, "failed to send ping");
            }
        }
        debug!("gossip loop stopped");
    }

    async fn receive_loop(self) {
        let mut stop = self.inner.stop.subscribe();
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let received = tokio::select! {
                received = self.inner.socket.recv_from(&mut buf) => received,
                _ = stop.wait_for(|stop| *stop) => break,
            };
            match received {
                Ok((len, src)) => match GossipMessage::decode(&buf[..len]) {
                    Ok(message) => self.handle_message(message, src).await,
                    Err(e) => warn!(%src, error = %e, "dropping malformed gossip"),
                },
                Err(e) => {
                    // ICMP errors from earlier sends surface here on some platforms
                    debug!(error = %e, "gossip receive failed");
                }
            }
        }
        debug!("receive loop stopped");
    }

    async fn failure_detection_loop(self) {
        let mut stop = self.inner.stop.subscribe();
        let mut interval = tokio::time::interval(self.inner.config.interval);
        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = stop.wait_for(|stop| *stop) => break,
            }

            let (suspicions, targets, changed) = {
                let mut table = self.table();
                let now = Instant::now();
                let sweep = table.detect_failures(
                    now,
                    self.inner.config.suspect_timeout,
                    self.inner.config.dead_timeout,
                );
                table.prune(now, self.inner.config.tombstone_timeout);
                (
                    table.suspicions(&sweep),
                    table.broadcast_targets(),
                    !sweep.dead.is_empty(),
                )
            };
            if changed {
                self.publish();
            }
            for suspicion in &suspicions {
                self.broadcast(suspicion, &targets).await;
            }
        }
        debug!("failure detection loop stopped");
    }

    async fn handle_message(&self, message: GossipMessage, src: SocketAddr) {
        debug!(%src, kind = message.name(), "gossip received");
        let now = Instant::now();
        match message {
            GossipMessage::Join { member } => {
                let (changed, ack) = {
                    let mut table = self.table();
                    (table.admit(member, now), table.ack())
                };
                if changed {
                    self.publish();
                }
                if let Err(e) = self.send(&ack, src).await {
                    warn!(%src, error = %e, "failed to answer join");
                }
            }
            GossipMessage::Ping { from } => {
                let (changed, ack) = {
                    let mut table = self.table();
                    (table.admit(from, now), table.ack())
                };
                if changed {
                    self.publish();
                }
                if let Err(e) = self.send(&ack, src).await {
                    debug!(%src, error = %e, "failed to send ack");
                }
            }
            GossipMessage::Ack {
                from,
                incarnation,
                members,
            } => {
                let changed = {
                    let mut table = self.table();
                    let mut changed = table.touch(&from, incarnation, now);
                    for member in members {
                        changed |= table.merge(member, now);
                    }
                    changed
                };
                if changed {
                    self.publish();
                }
            }
            GossipMessage::Suspect { node, incarnation } => {
                let (refutation, targets) = {
                    let mut table = self.table();
                    (table.suspect(&node, incarnation), table.broadcast_targets())
                };
                if let Some(refutation) = refutation {
                    self.broadcast(&refutation, &targets).await;
                }
            }
            GossipMessage::Alive { node, incarnation } => {
                if self.table().alive(&node, incarnation, now) {
                    self.publish();
                }
            }
            GossipMessage::Leave { node, incarnation } => {
                if self.table().leave(&node, incarnation, now) {
                    self.publish();
                }
            }
        }
    }

    /// Push the current view to subscribers if it differs
    fn publish(&self) {
        let view = self.table().view();
        self.inner.view.send_if_modified(|current| {
            if *current == view {
                return false;
            }
            *current = view;
            true
        });
    }

    async fn send(&self, message: &GossipMessage, target: SocketAddr) -> Result<(), MembershipError> {
        let bytes = message.encode()?;
        self.inner.socket.send_to(&bytes, target).await?;
        Ok(())
    }

    async fn broadcast(&self, message: &GossipMessage, targets: &[SocketAddr]) {
        for target in targets {
            if let Err(e) = self.send(message, *target).await {
                debug!(%target, kind = message.name(), error = %e, "broadcast send failed");
            }
        }
    }

    fn table(&self) -> MutexGuard<'_, MemberTable> {
        self.inner.table.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl MembershipView for GossipMembership {
    fn current_members(&self) -> BTreeSet<Member> {
        self.inner.view.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<BTreeSet<Member>> {
        self.inner.view.subscribe()
    }
}

/// Incarnations start at the wall clock so a restarted node outranks
/// whatever the cluster remembers about its previous run.
fn startup_incarnation() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(1, |d| d.as_millis() as u64)
}

#[cfg(test)]
#[path = "gossip_tests.rs"]
mod tests;
