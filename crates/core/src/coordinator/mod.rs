// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mutual exclusion coordinator
//!
//! Ricart–Agrawala over Lamport timestamps: a node wanting the critical
//! section multicasts a timestamped request and enters once every required
//! peer has granted it. A node that is inside the critical section, or whose
//! own pending request is older, defers its answer until it leaves.
//!
//! All protocol state sits behind a single mutex, so answering a peer,
//! changing the peer set and deciding a grant never interleave. Peer set
//! updates bump a version under that mutex; a claim enters the critical
//! section only once it has caught up with the latest version.

mod deferred;
mod quorum;

use crate::clock::{LogicalClock, Timestamp};
use crate::config::CoordinatorConfig;
use crate::error::CoordinatorError;
use crate::id::NodeIdentity;
use crate::message::{AccessGrant, AccessRequest};
use crate::state::CriticalSectionState;
use crate::traits::{CriticalSectionRunner, PeerError, PeerLink};
use deferred::DeferredReplies;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use quorum::QuorumBarrier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{oneshot, watch, Notify};
use tokio::time::Instant;
use tracing::{debug, info, warn, Instrument};

type PeerCall = BoxFuture<'static, (NodeIdentity, Result<AccessGrant, PeerError>)>;

/// Outcome of answering a peer's request
#[derive(Debug)]
pub enum Answer {
    /// Granted on the spot
    Granted(AccessGrant),
    /// Postponed until the local node releases or abandons its claim
    Deferred(DeferredGrant),
    /// The request cannot be ordered against ours
    Rejected(CoordinatorError),
}

impl Answer {
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }

    /// Wait until the grant is actually given
    pub async fn into_grant(self) -> Result<AccessGrant, CoordinatorError> {
        match self {
            Self::Granted(grant) => Ok(grant),
            Self::Deferred(deferred) => deferred.wait().await,
            Self::Rejected(error) => Err(error),
        }
    }
}

/// Handle on a deferred answer; resolves exactly once
#[derive(Debug)]
pub struct DeferredGrant {
    rx: oneshot::Receiver<AccessGrant>,
}

impl DeferredGrant {
    pub async fn wait(self) -> Result<AccessGrant, CoordinatorError> {
        self.rx.await.map_err(|_| CoordinatorError::Dropped)
    }
}

/// Point-in-time view of a coordinator, for diagnostics
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorStatus {
    pub identity: NodeIdentity,
    pub state: CriticalSectionState,
    pub clock: Timestamp,
    pub claim: Option<AccessRequest>,
    pub deferred: Vec<NodeIdentity>,
    pub peers: Vec<NodeIdentity>,
}

struct ActiveClaim {
    request: AccessRequest,
    /// Requesters granted while this claim waits; their grant becomes required
    consults: Vec<NodeIdentity>,
    wake: Arc<Notify>,
}

#[derive(Default)]
struct CoordinatorCore {
    state: CriticalSectionState,
    clock: LogicalClock,
    claim: Option<ActiveClaim>,
    deferred: DeferredReplies,
    /// Bumped on every peer set update
    peer_version: u64,
}

struct Shared<L> {
    identity: NodeIdentity,
    config: CoordinatorConfig,
    core: Mutex<CoordinatorCore>,
    peers: watch::Sender<BTreeMap<NodeIdentity, L>>,
}

/// Protocol engine for one node. Cheap to clone; clones share state.
pub struct MutexCoordinator<L> {
    shared: Arc<Shared<L>>,
}

impl<L> Clone for MutexCoordinator<L> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<L: PeerLink> MutexCoordinator<L> {
    pub fn new(identity: NodeIdentity, config: CoordinatorConfig) -> Self {
        let (peers, _) = watch::channel(BTreeMap::new());
        Self {
            shared: Arc::new(Shared {
                identity,
                config,
                core: Mutex::new(CoordinatorCore::default()),
                peers,
            }),
        }
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.shared.identity
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.shared.config
    }

    pub fn state(&self) -> CriticalSectionState {
        self.lock().state
    }

    pub fn clock(&self) -> Timestamp {
        self.lock().clock.now()
    }

    pub fn peers(&self) -> Vec<NodeIdentity> {
        self.shared.peers.borrow().keys().cloned().collect()
    }

    pub fn status(&self) -> CoordinatorStatus {
        let core = self.lock();
        CoordinatorStatus {
            identity: self.shared.identity.clone(),
            state: core.state,
            clock: core.clock.now(),
            claim: core.claim.as_ref().map(|claim| claim.request.clone()),
            deferred: core.deferred.requesters(),
            peers: self.peers(),
        }
    }

    /// Replace the peer set. In-flight requests drop departed peers from
    /// their quorum and consult newly joined ones.
    pub fn update_peers(&self, links: BTreeMap<NodeIdentity, L>) {
        let mut links = links;
        links.remove(&self.shared.identity);
        let mut core = self.lock();
        core.peer_version += 1;
        self.shared.peers.send_replace(links);
    }

    /// Acquire the critical section, waiting at most `timeout` for grants.
    ///
    /// On success the node is Held until [`release_access`](Self::release_access).
    /// Dropping the returned future before it completes abandons the claim.
    pub async fn request_access(&self, timeout: Duration) -> Result<(), CoordinatorError> {
        self.acquire(timeout).await.map(|_| ())
    }

    /// Leave the critical section and answer every deferred request.
    ///
    /// Returns how many deferred requests were answered.
    pub fn release_access(&self) -> Result<usize, CoordinatorError> {
        let (claim, answered) = {
            let mut core = self.lock();
            if core.state != CriticalSectionState::Held {
                return Err(CoordinatorError::ProtocolViolation {
                    operation: "release_access",
                    state: core.state,
                });
            }
            core.state = CriticalSectionState::Released;
            let claim = core.claim.take().map(|claim| claim.request);
            (claim, core.deferred.flush())
        };

        info!(
            claim = ?claim.map(|c| c.timestamp),
            answered = answered.len(),
            "released access"
        );
        Ok(answered.len())
    }

    /// Acquire, run `runner` exactly once while Held, then release.
    ///
    /// The release happens whether or not the runner succeeds, and also if
    /// this future is dropped mid-run.
    pub async fn run_critical_section<R>(
        &self,
        runner: &R,
        timeout: Duration,
    ) -> Result<(), CoordinatorError>
    where
        R: CriticalSectionRunner + ?Sized,
    {
        let claim = self.acquire(timeout).await?;
        let mut guard = ClaimGuard::new(self, claim);

        let result = runner.run().await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "critical section failed");
        }

        guard.disarm();
        self.release_access()?;
        result.map_err(CoordinatorError::from)
    }

    /// Decide on a peer's request. Never blocks.
    pub fn answer_request(&self, request: AccessRequest) -> Answer {
        let mut core = self.lock();
        let clock = match core.clock.observe(request.timestamp) {
            Ok(clock) => clock,
            Err(error) => {
                warn!(
                    requester = %request.requester,
                    timestamp = request.timestamp,
                    %error,
                    "rejecting request"
                );
                return Answer::Rejected(error.into());
            }
        };

        let defer = match core.state {
            CriticalSectionState::Held => true,
            CriticalSectionState::Wanted => core
                .claim
                .as_ref()
                .is_some_and(|claim| claim.request.precedes(&request)),
            CriticalSectionState::Released => false,
        };

        if defer {
            let (tx, rx) = oneshot::channel();
            core.deferred.push(request.clone(), tx);
            debug!(
                requester = %request.requester,
                timestamp = request.timestamp,
                clock,
                state = %core.state,
                queued = core.deferred.len(),
                "deferring request"
            );
            return Answer::Deferred(DeferredGrant { rx });
        }

        if let Some(claim) = core.claim.as_mut() {
            if request.requester != self.shared.identity {
                claim.consults.push(request.requester.clone());
                claim.wake.notify_one();
            }
        }

        debug!(
            requester = %request.requester,
            timestamp = request.timestamp,
            clock,
            state = %core.state,
            "granting request"
        );
        Answer::Granted(AccessGrant {})
    }

    async fn acquire(&self, timeout: Duration) -> Result<AccessRequest, CoordinatorError> {
        let span = tracing::info_span!("mutex.request", node = %self.shared.identity);
        self.collect_grants(timeout).instrument(span).await
    }

    /// Multicast a fresh claim and wait for the quorum or the deadline
    async fn collect_grants(&self, timeout: Duration) -> Result<AccessRequest, CoordinatorError> {
        let deadline = Instant::now() + timeout;

        let (claim, wake, mut peers_rx, mut seen, mut known) = {
            let mut core = self.lock();
            if core.state != CriticalSectionState::Released {
                return Err(CoordinatorError::ProtocolViolation {
                    operation: "request_access",
                    state: core.state,
                });
            }
            let timestamp = core.clock.tick()?;
            let request = AccessRequest::new(self.shared.identity.clone(), timestamp);
            let wake = Arc::new(Notify::new());
            core.state = CriticalSectionState::Wanted;
            core.claim = Some(ActiveClaim {
                request: request.clone(),
                consults: Vec::new(),
                wake: Arc::clone(&wake),
            });

            let mut peers_rx = self.shared.peers.subscribe();
            let snapshot = peers_rx.borrow_and_update().clone();
            (request, wake, peers_rx, core.peer_version, snapshot)
        };

        info!(
            timestamp = claim.timestamp,
            peers = known.len(),
            "requesting access"
        );

        let mut guard = ClaimGuard::new(self, claim.clone());
        let mut barrier = QuorumBarrier::new(known.keys().cloned());
        let mut calls: FuturesUnordered<PeerCall> = known
            .values()
            .map(|link| dispatch(link.clone(), claim.clone()))
            .collect();

        loop {
            if let Some((version, current)) = self.peer_change(seen, &mut peers_rx) {
                for peer in known.keys().filter(|peer| !current.contains_key(*peer)) {
                    if barrier.forget(peer) {
                        info!(%peer, "peer departed, no longer waiting for its grant");
                    }
                }
                for (peer, link) in &current {
                    if !known.contains_key(peer) && barrier.require(peer.clone()) {
                        debug!(%peer, "peer joined while waiting, consulting it");
                    }
                    // A failed peer may have come back at a new address
                    if barrier.needs_dispatch(peer) {
                        barrier.mark_dispatched(peer);
                        calls.push(dispatch(link.clone(), claim.clone()));
                    }
                }
                known = current;
                seen = version;
            }

            for peer in self.take_consults() {
                if barrier.require(peer.clone()) {
                    debug!(%peer, "granted an older request while waiting, consulting requester");
                    if let Some(link) = known.get(&peer) {
                        barrier.mark_dispatched(&peer);
                        calls.push(dispatch(link.clone(), claim.clone()));
                    }
                }
            }

            // A consult arriving after the drain above keeps us waiting
            if barrier.is_satisfied() && self.enter_held(&claim, seen)? {
                guard.disarm();
                info!(
                    timestamp = claim.timestamp,
                    granted = barrier.granted(),
                    "access granted"
                );
                return Ok(claim);
            }

            tokio::select! {
                Some((peer, result)) = calls.next(), if !calls.is_empty() => match result {
                    Ok(AccessGrant {}) => {
                        let clock = self.lock().clock.tick()?;
                        if barrier.record_grant(&peer) {
                            debug!(
                                %peer,
                                clock,
                                granted = barrier.granted(),
                                required = barrier.required(),
                                "grant received"
                            );
                        } else {
                            debug!(%peer, "ignoring grant from peer outside the quorum");
                        }
                    }
                    Err(error) => {
                        warn!(%peer, %error, "peer call failed");
                        barrier.record_failure(&peer, error);
                    }
                },

                _ = wake.notified() => {}

                // Applied at the top of the loop
                Ok(()) = peers_rx.changed() => {}

                _ = tokio::time::sleep_until(deadline) => {
                    let missing = barrier.missing();
                    let failures = barrier.failures();
                    warn!(
                        timestamp = claim.timestamp,
                        missing = missing.len(),
                        failures = failures.len(),
                        "deadline passed before quorum"
                    );
                    return Err(CoordinatorError::AcquireFailed { missing, failures });
                }
            }
        }
    }

    /// Wanted→Held, unless requesters granted meanwhile still need consulting
    /// or the peer set moved past version `seen`
    fn enter_held(&self, claim: &AccessRequest, seen: u64) -> Result<bool, CoordinatorError> {
        let mut core = self.lock();
        let pending = match &core.claim {
            Some(active) if core.state == CriticalSectionState::Wanted && &active.request == claim => {
                !active.consults.is_empty()
            }
            _ => {
                return Err(CoordinatorError::ProtocolViolation {
                    operation: "grant",
                    state: core.state,
                })
            }
        };
        if pending || core.peer_version != seen {
            return Ok(false);
        }
        core.state = CriticalSectionState::Held;
        Ok(true)
    }

    /// The latest peer set and its version, if newer than `seen`
    fn peer_change(
        &self,
        seen: u64,
        peers_rx: &mut watch::Receiver<BTreeMap<NodeIdentity, L>>,
    ) -> Option<(u64, BTreeMap<NodeIdentity, L>)> {
        let core = self.lock();
        if core.peer_version == seen {
            return None;
        }
        let current = peers_rx.borrow_and_update().clone();
        Some((core.peer_version, current))
    }

    fn take_consults(&self) -> Vec<NodeIdentity> {
        self.lock()
            .claim
            .as_mut()
            .map(|claim| std::mem::take(&mut claim.consults))
            .unwrap_or_default()
    }

    /// Give up `claim` if it is still the active one, answering deferred requests
    fn relinquish(&self, claim: &AccessRequest) {
        let (state, answered) = {
            let mut core = self.lock();
            let current = core.claim.as_ref().map(|c| &c.request);
            if current != Some(claim) || core.state == CriticalSectionState::Released {
                return;
            }
            let state = core.state;
            core.state = CriticalSectionState::Released;
            core.claim = None;
            (state, core.deferred.flush())
        };
        warn!(
            timestamp = claim.timestamp,
            from = %state,
            answered = answered.len(),
            "abandoned claim"
        );
    }

    fn lock(&self) -> MutexGuard<'_, CoordinatorCore> {
        self.shared.core.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn dispatch<L: PeerLink>(link: L, request: AccessRequest) -> PeerCall {
    Box::pin(async move {
        let peer = link.peer().clone();
        let result = link.request_access(request).await;
        (peer, result)
    })
}

/// Abandons a claim on drop unless disarmed
struct ClaimGuard<'a, L: PeerLink> {
    coordinator: &'a MutexCoordinator<L>,
    claim: AccessRequest,
    armed: bool,
}

impl<'a, L: PeerLink> ClaimGuard<'a, L> {
    fn new(coordinator: &'a MutexCoordinator<L>, claim: AccessRequest) -> Self {
        Self {
            coordinator,
            claim,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<L: PeerLink> Drop for ClaimGuard<'_, L> {
    fn drop(&mut self) {
        if self.armed {
            self.coordinator.relinquish(&self.claim);
        }
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
