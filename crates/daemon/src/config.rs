// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: TOML file, environment overrides, validation

use dimutex_adapters::{GossipConfig, DEFAULT_HOLD};
use dimutex_core::{CoordinatorConfig, NodeIdentity};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::lifecycle::{state_dir, LifecycleError};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub node: NodeSection,
    pub gossip: GossipConfig,
    pub mutex: MutexSection,
    pub critical_section: CriticalSectionSection,
    pub log: LogSection,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NodeSection {
    pub name: Option<String>,
    pub id: Option<u64>,
    /// Peer RPC listen address
    pub listen: SocketAddr,
    /// Address announced to peers; defaults to the bound listen address
    pub advertise: Option<SocketAddr>,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            name: None,
            id: None,
            listen: SocketAddr::from(([0, 0, 0, 0], 7400)),
            advertise: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MutexSection {
    #[serde(with = "humantime_serde")]
    pub acquire_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub request_interval: Duration,
    /// Upper bound on one peer call, including time spent deferred
    #[serde(with = "humantime_serde")]
    pub rpc_timeout: Duration,
}

impl Default for MutexSection {
    fn default() -> Self {
        let coordinator = CoordinatorConfig::default();
        Self {
            acquire_timeout: coordinator.acquire_timeout,
            request_interval: coordinator.request_interval,
            rpc_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CriticalSectionSection {
    /// How long to stay inside when no command is configured
    #[serde(with = "humantime_serde")]
    pub hold: Duration,
    /// Shell command to run while holding access
    pub command: Option<String>,
}

impl Default for CriticalSectionSection {
    fn default() -> Self {
        Self {
            hold: DEFAULT_HOLD,
            command: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSection {
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load from an optional file plus the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, LifecycleError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    LifecycleError::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                Self::parse(&text)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.resolve_identity();
        config.validate()?;
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self, LifecycleError> {
        toml::from_str(text).map_err(|e| LifecycleError::Config(e.to_string()))
    }

    /// Apply `DIMUTEX_*` overrides looked up through `env`
    pub fn apply_env(
        &mut self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<(), LifecycleError> {
        if let Some(name) = env("DIMUTEX_NAME") {
            self.node.name = Some(name);
        }
        if let Some(id) = env("DIMUTEX_ID") {
            self.node.id = Some(parse_env("DIMUTEX_ID", &id)?);
        }
        if let Some(listen) = env("DIMUTEX_LISTEN") {
            self.node.listen = parse_env("DIMUTEX_LISTEN", &listen)?;
        }
        if let Some(advertise) = env("DIMUTEX_ADVERTISE") {
            self.node.advertise = Some(parse_env("DIMUTEX_ADVERTISE", &advertise)?);
        }
        if let Some(bind) = env("DIMUTEX_GOSSIP_BIND") {
            self.gossip.bind = parse_env("DIMUTEX_GOSSIP_BIND", &bind)?;
        }
        if let Some(seeds) = env("DIMUTEX_SEEDS") {
            self.gossip.seeds = seeds
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| parse_env("DIMUTEX_SEEDS", s))
                .collect::<Result<_, _>>()?;
        }
        Ok(())
    }

    /// Fill in whatever part of the identity was left unset
    pub fn resolve_identity(&mut self) {
        match (&self.node.name, self.node.id) {
            (Some(_), Some(_)) => {}
            (Some(_), None) => self.node.id = Some(NodeIdentity::generate().id),
            (None, Some(id)) => self.node.name = Some(format!("node-{id}")),
            (None, None) => {
                let generated = NodeIdentity::generate();
                self.node.name = Some(generated.name);
                self.node.id = Some(generated.id);
            }
        }
    }

    pub fn validate(&self) -> Result<(), LifecycleError> {
        let timeouts = [
            ("mutex.acquire_timeout", self.mutex.acquire_timeout),
            ("mutex.request_interval", self.mutex.request_interval),
            ("mutex.rpc_timeout", self.mutex.rpc_timeout),
            ("gossip.interval", self.gossip.interval),
            ("gossip.suspect_timeout", self.gossip.suspect_timeout),
            ("gossip.dead_timeout", self.gossip.dead_timeout),
            ("gossip.tombstone_timeout", self.gossip.tombstone_timeout),
        ];
        for (field, value) in timeouts {
            if value.is_zero() {
                return Err(LifecycleError::Config(format!("{field} must be greater than zero")));
            }
        }
        if self.gossip.dead_timeout <= self.gossip.suspect_timeout {
            return Err(LifecycleError::Config(
                "gossip.dead_timeout must exceed gossip.suspect_timeout".to_string(),
            ));
        }
        if self.node.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(LifecycleError::Config("node.name must not be empty".to_string()));
        }
        if self
            .critical_section
            .command
            .as_deref()
            .is_some_and(|cmd| cmd.trim().is_empty())
        {
            return Err(LifecycleError::Config(
                "critical_section.command must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn identity(&self) -> NodeIdentity {
        let id = self.node.id.unwrap_or_default();
        let name = self
            .node
            .name
            .clone()
            .unwrap_or_else(|| format!("node-{id}"));
        NodeIdentity::new(id, name)
    }

    pub fn coordinator(&self) -> CoordinatorConfig {
        CoordinatorConfig::new()
            .with_acquire_timeout(self.mutex.acquire_timeout)
            .with_request_interval(self.mutex.request_interval)
    }

    /// Configured log file, or `<state dir>/dimutex/<node name>.log`
    pub fn log_path(&self) -> Result<PathBuf, LifecycleError> {
        match &self.log.path {
            Some(path) => Ok(path.clone()),
            None => Ok(state_dir()?
                .join("dimutex")
                .join(format!("{}.log", self.identity().name))),
        }
    }

    pub fn to_toml(&self) -> Result<String, LifecycleError> {
        toml::to_string_pretty(self).map_err(|e| LifecycleError::Config(e.to_string()))
    }
}

fn parse_env<T>(key: &str, value: &str) -> Result<T, LifecycleError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| LifecycleError::Config(format!("invalid {key} {value:?}: {e}")))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
