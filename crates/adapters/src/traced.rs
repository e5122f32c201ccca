// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced wrappers for consistent observability

use async_trait::async_trait;
use dimutex_core::{
    AccessGrant, AccessRequest, CriticalSectionRunner, Member, NodeIdentity, PeerConnector,
    PeerError, PeerLink, RunnerError,
};
use tracing::Instrument;

/// Wrapper that adds tracing to any PeerLink
#[derive(Clone)]
pub struct TracedPeerLink<L> {
    inner: L,
}

impl<L> TracedPeerLink<L> {
    pub fn new(inner: L) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<L: PeerLink> PeerLink for TracedPeerLink<L> {
    fn peer(&self) -> &NodeIdentity {
        self.inner.peer()
    }

    async fn request_access(&self, request: AccessRequest) -> Result<AccessGrant, PeerError> {
        let span = tracing::info_span!(
            "peer.request_access",
            peer = %self.inner.peer(),
            timestamp = request.timestamp
        );

        async {
            tracing::debug!("sending request");
            let start = std::time::Instant::now();
            let result = self.inner.request_access(request).await;
            let elapsed = start.elapsed();

            match &result {
                Ok(_) => tracing::debug!(elapsed_ms = elapsed.as_millis() as u64, "granted"),
                Err(e) => tracing::warn!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "request failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }
}

/// Connector whose links are wrapped in [`TracedPeerLink`]
#[derive(Clone)]
pub struct TracedConnector<C> {
    inner: C,
}

impl<C> TracedConnector<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

impl<C: PeerConnector> PeerConnector for TracedConnector<C> {
    type Link = TracedPeerLink<C::Link>;

    fn connect(&self, member: &Member) -> Self::Link {
        tracing::debug!(peer = %member.identity, addr = %member.addr, "opening peer link");
        TracedPeerLink::new(self.inner.connect(member))
    }
}

/// Wrapper that adds tracing to any CriticalSectionRunner
pub struct TracedRunner<R> {
    inner: R,
}

impl<R> TracedRunner<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<R: CriticalSectionRunner> CriticalSectionRunner for TracedRunner<R> {
    async fn run(&self) -> Result<(), RunnerError> {
        let span = tracing::info_span!("critical_section.run");

        async {
            let start = std::time::Instant::now();
            let result = self.inner.run().await;
            let elapsed = start.elapsed();

            match &result {
                Ok(()) => tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "work done"),
                Err(e) => tracing::error!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "work failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
