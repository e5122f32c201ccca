// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node lifecycle management: startup, run, shutdown.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use dimutex_adapters::{CommandRunner, GossipMembership, HoldRunner, TracedConnector, TracedRunner};
use dimutex_core::{
    CriticalSectionRunner, MembershipError, MembershipView, MutexCoordinator, RunnerError, Session,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::client::{TcpConnector, TcpPeerLink};
use crate::config::Config;
use crate::server;

/// Peer links as the daemon uses them
pub type DaemonLink = dimutex_adapters::TracedPeerLink<TcpPeerLink>;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to bind peer listener at {0}: {1}")]
    Bind(SocketAddr, #[source] std::io::Error),
    #[error(transparent)]
    Membership(#[from] MembershipError),
    #[error("could not determine state directory")]
    NoStateDir,
}

/// Get the state directory for dimutex
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state"))
}

/// The configured critical section work
pub enum SectionRunner {
    Hold(HoldRunner),
    Command(CommandRunner),
}

impl SectionRunner {
    pub fn from_config(config: &Config) -> Self {
        let name = config.identity().name;
        match &config.critical_section.command {
            Some(command) => {
                let runner = CommandRunner::new(name, command.clone());
                info!(command = runner.command(), "critical section runs a command");
                Self::Command(runner)
            }
            None => {
                let runner = HoldRunner::new(name, config.critical_section.hold);
                info!(hold = ?runner.hold(), "critical section holds for a fixed time");
                Self::Hold(runner)
            }
        }
    }
}

#[async_trait]
impl CriticalSectionRunner for SectionRunner {
    async fn run(&self) -> Result<(), RunnerError> {
        match self {
            Self::Hold(runner) => runner.run().await,
            Self::Command(runner) => runner.run().await,
        }
    }
}

/// Bind the peer RPC listener
pub async fn bind(config: &Config) -> Result<TcpListener, LifecycleError> {
    let listen = config.node.listen;
    TcpListener::bind(listen)
        .await
        .map_err(|e| LifecycleError::Bind(listen, e))
}

/// One running node: coordinator, peer server and session, over any
/// membership view
pub struct Node<M: MembershipView> {
    session: Arc<Session<M, TracedConnector<TcpConnector>>>,
    rpc_addr: SocketAddr,
    stop: watch::Sender<bool>,
    server: JoinHandle<()>,
}

impl<M: MembershipView> Node<M> {
    /// Start serving peers on `listener` and following `membership`.
    ///
    /// `rpc_addr` is the address this node is known by; see [`advertised`].
    pub fn start(
        config: &Config,
        listener: TcpListener,
        rpc_addr: SocketAddr,
        membership: M,
    ) -> Self {
        let coordinator = MutexCoordinator::new(config.identity(), config.coordinator());
        let connector = TracedConnector::new(TcpConnector::new(config.mutex.rpc_timeout));
        let (stop, _) = watch::channel(false);

        let server = tokio::spawn(server::serve(
            listener,
            coordinator.clone(),
            stop.subscribe(),
        ));
        info!(node = %coordinator.identity(), %rpc_addr, "node started");

        Self {
            session: Arc::new(Session::new(membership, connector, coordinator)),
            rpc_addr,
            stop,
            server,
        }
    }

    pub fn coordinator(&self) -> &MutexCoordinator<DaemonLink> {
        self.session.coordinator()
    }

    /// Address peers dial for mutex requests
    pub fn rpc_addr(&self) -> SocketAddr {
        self.rpc_addr
    }

    /// Run the session until [`stop`](Self::stop) is called
    pub async fn run<R>(&self, runner: &R)
    where
        R: CriticalSectionRunner + ?Sized,
    {
        self.session.run(runner, self.stop.subscribe()).await;
    }

    /// Ask the session and the peer server to wind down
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    pub async fn shutdown(self) {
        self.stop();
        if let Err(e) = self.server.await {
            warn!(error = %e, "peer server task failed");
        }
    }
}

/// Address to announce: `node.advertise`, else the bound listen address
pub fn advertised(config: &Config, listener: &TcpListener) -> Result<SocketAddr, LifecycleError> {
    if let Some(addr) = config.node.advertise {
        return Ok(addr);
    }
    let bound = listener.local_addr()?;
    if bound.ip().is_unspecified() {
        warn!(
            %bound,
            "listening on an unspecified address without node.advertise, peers on other hosts cannot reach us"
        );
    }
    Ok(bound)
}

/// A node discovering its peers through gossip
pub struct Daemon {
    pub node: Node<GossipMembership>,
    pub membership: GossipMembership,
}

/// Bind the listener, join the cluster and start serving peers
pub async fn startup(config: &Config) -> Result<Daemon, LifecycleError> {
    let listener = bind(config).await?;
    let rpc_addr = advertised(config, &listener)?;
    let membership =
        GossipMembership::start(config.identity(), rpc_addr, config.gossip.clone()).await?;
    let node = Node::start(config, listener, rpc_addr, membership.clone());
    Ok(Daemon { node, membership })
}

impl Daemon {
    /// Leave the cluster and stop serving
    pub async fn shutdown(self) {
        info!("Shutting down node...");
        self.node.stop();
        self.membership.leave().await;
        self.node.shutdown().await;
        info!("Node stopped");
    }
}

/// The runner the daemon executes, wrapped with tracing
pub fn runner(config: &Config) -> TracedRunner<SectionRunner> {
    TracedRunner::new(SectionRunner::from_config(config))
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
