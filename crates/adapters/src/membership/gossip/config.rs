// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gossip membership configuration

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GossipConfig {
    /// UDP address the gossip socket binds to
    pub bind: SocketAddr,
    /// Address other members use to reach us; defaults to the bound address
    pub advertise: Option<SocketAddr>,
    /// Gossip addresses of existing members to join through
    pub seeds: Vec<SocketAddr>,
    /// How often a random alive member is pinged
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Silence after which an alive member becomes suspect
    #[serde(with = "humantime_serde")]
    pub suspect_timeout: Duration,
    /// Silence after which a member is declared dead
    #[serde(with = "humantime_serde")]
    pub dead_timeout: Duration,
    /// How long dead and departed members are remembered
    #[serde(with = "humantime_serde")]
    pub tombstone_timeout: Duration,
}

impl GossipConfig {
    pub fn new(bind: SocketAddr) -> Self {
        Self {
            bind,
            advertise: None,
            seeds: Vec::new(),
            interval: Duration::from_millis(500),
            suspect_timeout: Duration::from_secs(5),
            dead_timeout: Duration::from_secs(10),
            tombstone_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_seeds(mut self, seeds: Vec<SocketAddr>) -> Self {
        self.seeds = seeds;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeouts(mut self, suspect: Duration, dead: Duration) -> Self {
        self.suspect_timeout = suspect;
        self.dead_timeout = dead;
        self
    }
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([0, 0, 0, 0], 7401)))
    }
}
