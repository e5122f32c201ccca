// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Member table: the pure state machine behind the gossip service
//!
//! Every mutation takes the current instant from the caller, so the
//! transitions can be driven without sockets or timers.

use super::types::{GossipMember, GossipMessage, MemberState};
use dimutex_core::{Member, NodeIdentity};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Members that changed liveness during one failure sweep
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FailureSweep {
    pub suspected: Vec<NodeIdentity>,
    pub dead: Vec<NodeIdentity>,
}

impl FailureSweep {
    pub fn is_empty(&self) -> bool {
        self.suspected.is_empty() && self.dead.is_empty()
    }
}

pub struct MemberTable {
    local: GossipMember,
    members: BTreeMap<NodeIdentity, GossipMember>,
}

impl MemberTable {
    pub fn new(local: GossipMember) -> Self {
        Self {
            local,
            members: BTreeMap::new(),
        }
    }

    pub fn local(&self) -> &GossipMember {
        &self.local
    }

    pub fn get(&self, identity: &NodeIdentity) -> Option<&GossipMember> {
        self.members.get(identity)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Peers the mutex should treat as present.
    ///
    /// Suspects stay in: dropping a live peer from the quorum is unsafe,
    /// while keeping a dead one only delays acquisition.
    pub fn view(&self) -> BTreeSet<Member> {
        self.members
            .values()
            .filter(|m| matches!(m.state, MemberState::Alive | MemberState::Suspect))
            .map(GossipMember::to_member)
            .collect()
    }

    /// Every known member plus ourselves, as carried by an ack
    pub fn snapshot(&self) -> Vec<GossipMember> {
        std::iter::once(self.local.clone())
            .chain(self.members.values().cloned())
            .collect()
    }

    /// Gossip addresses of everyone not known to be gone
    pub fn broadcast_targets(&self) -> Vec<SocketAddr> {
        self.members
            .values()
            .filter(|m| matches!(m.state, MemberState::Alive | MemberState::Suspect))
            .map(|m| m.gossip_addr)
            .collect()
    }

    /// Random alive member to probe this round
    pub fn probe_target<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<SocketAddr> {
        let alive: Vec<SocketAddr> = self
            .members
            .values()
            .filter(|m| m.is_alive())
            .map(|m| m.gossip_addr)
            .collect();
        alive.choose(rng).copied()
    }

    pub fn ping(&self) -> GossipMessage {
        GossipMessage::Ping {
            from: self.local.clone(),
        }
    }

    pub fn ack(&self) -> GossipMessage {
        GossipMessage::Ack {
            from: self.local.identity.clone(),
            incarnation: self.local.incarnation,
            members: self.snapshot(),
        }
    }

    /// Direct contact: the sender is alive at `incarnation` or later.
    ///
    /// Only a newer incarnation brings back a member that left. Returns
    /// true when the view changed.
    pub fn touch(&mut self, identity: &NodeIdentity, incarnation: u64, now: Instant) -> bool {
        let Some(member) = self.members.get_mut(identity) else {
            return false;
        };
        if member.state == MemberState::Left && incarnation <= member.incarnation {
            return false;
        }
        if member.state != MemberState::Alive {
            info!(member = %identity, "member alive again");
        }
        let changed = !in_view(member.state);
        member.state = MemberState::Alive;
        member.incarnation = member.incarnation.max(incarnation);
        member.last_seen = Some(now);
        member.gone_since = None;
        changed
    }

    /// A member announced itself through a join or a ping.
    ///
    /// Returns true when the view changed.
    pub fn admit(&mut self, mut member: GossipMember, now: Instant) -> bool {
        if member.identity == self.local.identity {
            return false;
        }
        let known = self.members.get(&member.identity).map(|existing| {
            let same_addrs = existing.gossip_addr == member.gossip_addr
                && existing.rpc_addr == member.rpc_addr;
            (existing.state, existing.incarnation, same_addrs)
        });
        match known {
            Some((_, _, true)) => {
                let identity = member.identity.clone();
                self.touch(&identity, member.incarnation, now)
            }
            Some((MemberState::Left, incarnation, _)) if member.incarnation <= incarnation => false,
            _ => {
                info!(member = %member.identity, addr = %member.rpc_addr, "member joined");
                member.state = MemberState::Alive;
                member.last_seen = Some(now);
                member.gone_since = None;
                self.members.insert(member.identity.clone(), member);
                true
            }
        }
    }

    /// Fold a member learned second-hand (from an ack) into the table.
    ///
    /// Higher incarnations win. At equal incarnation the more severe state
    /// wins, except that second-hand news never marks a member dead.
    pub fn merge(&mut self, update: GossipMember, now: Instant) -> bool {
        if update.identity == self.local.identity {
            return false;
        }
        match self.members.get_mut(&update.identity) {
            None => {
                if !update.is_alive() {
                    return false;
                }
                info!(member = %update.identity, addr = %update.rpc_addr, "discovered member");
                let mut member = update;
                member.last_seen = Some(now);
                member.gone_since = None;
                self.members.insert(member.identity.clone(), member);
                true
            }
            Some(existing) => {
                let before = existing.state;
                let newer = update.incarnation > existing.incarnation;
                let same = update.incarnation == existing.incarnation;
                match update.state {
                    MemberState::Alive if newer => {
                        existing.state = MemberState::Alive;
                        existing.incarnation = update.incarnation;
                        existing.gossip_addr = update.gossip_addr;
                        existing.rpc_addr = update.rpc_addr;
                        existing.last_seen = Some(now);
                        existing.gone_since = None;
                    }
                    MemberState::Suspect
                        if (newer || same) && existing.state == MemberState::Alive =>
                    {
                        existing.state = MemberState::Suspect;
                        existing.incarnation = update.incarnation;
                    }
                    MemberState::Left if newer || same => {
                        if existing.state != MemberState::Left {
                            existing.gone_since = Some(now);
                        }
                        existing.state = MemberState::Left;
                        existing.incarnation = update.incarnation;
                    }
                    _ => {}
                }
                let changed = in_view(before) != in_view(existing.state);
                if changed {
                    debug!(member = %update.identity, state = ?existing.state, "member state merged");
                }
                changed
            }
        }
    }

    /// Someone suspects `node`. About ourselves, returns the refutation to
    /// broadcast.
    pub fn suspect(&mut self, node: &NodeIdentity, incarnation: u64) -> Option<GossipMessage> {
        if *node == self.local.identity {
            if incarnation >= self.local.incarnation {
                self.local.incarnation = incarnation + 1;
                info!(incarnation = self.local.incarnation, "refuting suspicion");
            }
            return Some(GossipMessage::Alive {
                node: node.clone(),
                incarnation: self.local.incarnation,
            });
        }
        if let Some(member) = self.members.get_mut(node) {
            if member.state == MemberState::Alive && incarnation >= member.incarnation {
                info!(member = %node, "member suspected");
                member.state = MemberState::Suspect;
                member.incarnation = incarnation;
            }
        }
        None
    }

    /// A member refuted suspicion at `incarnation`
    pub fn alive(&mut self, node: &NodeIdentity, incarnation: u64, now: Instant) -> bool {
        let Some(member) = self.members.get_mut(node) else {
            return false;
        };
        let refutes = incarnation > member.incarnation
            || (incarnation == member.incarnation && member.state == MemberState::Suspect);
        if !refutes || (member.state == MemberState::Left && incarnation <= member.incarnation) {
            return false;
        }
        let changed = !in_view(member.state);
        member.state = MemberState::Alive;
        member.incarnation = incarnation;
        member.last_seen = Some(now);
        member.gone_since = None;
        changed
    }

    /// A member left gracefully
    pub fn leave(&mut self, node: &NodeIdentity, incarnation: u64, now: Instant) -> bool {
        let Some(member) = self.members.get_mut(node) else {
            return false;
        };
        if incarnation < member.incarnation {
            return false;
        }
        let changed = in_view(member.state);
        if changed {
            info!(member = %node, "member left");
        }
        if member.state != MemberState::Left {
            member.gone_since = Some(now);
        }
        member.state = MemberState::Left;
        member.incarnation = incarnation;
        changed
    }

    /// Our own departure announcement
    pub fn farewell(&mut self) -> GossipMessage {
        self.local.state = MemberState::Left;
        GossipMessage::Leave {
            node: self.local.identity.clone(),
            incarnation: self.local.incarnation,
        }
    }

    /// Age out silent members: Alive becomes Suspect after
    /// `suspect_timeout`, Suspect becomes Dead after `dead_timeout`.
    pub fn detect_failures(
        &mut self,
        now: Instant,
        suspect_timeout: Duration,
        dead_timeout: Duration,
    ) -> FailureSweep {
        let mut sweep = FailureSweep::default();
        for member in self.members.values_mut() {
            let silent = member
                .last_seen
                .map_or(Duration::MAX, |seen| now.saturating_duration_since(seen));
            match member.state {
                MemberState::Alive if silent > suspect_timeout => {
                    info!(member = %member.identity, silent_ms = silent.as_millis() as u64, "member suspected");
                    member.state = MemberState::Suspect;
                    sweep.suspected.push(member.identity.clone());
                }
                MemberState::Suspect if silent > dead_timeout => {
                    info!(member = %member.identity, "member declared dead");
                    member.state = MemberState::Dead;
                    member.gone_since = Some(now);
                    sweep.dead.push(member.identity.clone());
                }
                _ => {}
            }
        }
        sweep
    }

    /// Forget members that have been dead or gone for longer than
    /// `tombstone_timeout`. Until then their tombstone keeps stale gossip
    /// from resurrecting them.
    pub fn prune(&mut self, now: Instant, tombstone_timeout: Duration) -> Vec<NodeIdentity> {
        let expired: Vec<NodeIdentity> = self
            .members
            .values()
            .filter(|m| !in_view(m.state))
            .filter(|m| {
                m.gone_since
                    .is_some_and(|since| now.saturating_duration_since(since) > tombstone_timeout)
            })
            .map(|m| m.identity.clone())
            .collect();
        for identity in &expired {
            self.members.remove(identity);
            debug!(member = %identity, "tombstone expired");
        }
        expired
    }

    /// Suspicion broadcasts for the members a sweep suspected
    pub fn suspicions(&self, sweep: &FailureSweep) -> Vec<GossipMessage> {
        sweep
            .suspected
            .iter()
            .filter_map(|id| self.members.get(id))
            .map(|m| GossipMessage::Suspect {
                node: m.identity.clone(),
                incarnation: m.incarnation,
            })
            .collect()
    }
}

fn in_view(state: MemberState) -> bool {
    matches!(state, MemberState::Alive | MemberState::Suspect)
}

#[cfg(test)]
#[path = "table_tests.rs"]
mod tests;
