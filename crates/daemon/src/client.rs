// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TCP peer link

use crate::protocol::{self, ProtocolError, Request, Response, DEFAULT_TIMEOUT};
use async_trait::async_trait;
use dimutex_core::{
    AccessGrant, AccessRequest, CoordinatorStatus, Member, NodeIdentity, PeerConnector, PeerError,
    PeerLink,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;

/// Link to a peer's RPC endpoint. Opens one connection per call.
#[derive(Clone, Debug)]
pub struct TcpPeerLink {
    peer: NodeIdentity,
    addr: SocketAddr,
    rpc_timeout: Duration,
}

impl TcpPeerLink {
    pub fn new(peer: NodeIdentity, addr: SocketAddr, rpc_timeout: Duration) -> Self {
        Self {
            peer,
            addr,
            rpc_timeout,
        }
    }

    fn map_error(&self, error: ProtocolError) -> PeerError {
        let peer = self.peer.to_string();
        match error {
            ProtocolError::Timeout => PeerError::Timeout(peer),
            ProtocolError::ConnectionClosed => PeerError::Closed(peer),
            ProtocolError::Io(e) => PeerError::Unreachable {
                peer,
                reason: e.to_string(),
            },
            other => PeerError::Protocol {
                peer,
                reason: other.to_string(),
            },
        }
    }
}

#[async_trait]
impl PeerLink for TcpPeerLink {
    fn peer(&self) -> &NodeIdentity {
        &self.peer
    }

    async fn request_access(&self, request: AccessRequest) -> Result<AccessGrant, PeerError> {
        let call = call(self.addr, Request::AccessRequest { request });
        let response = tokio::time::timeout(self.rpc_timeout, call)
            .await
            .map_err(|_| PeerError::Timeout(self.peer.to_string()))?
            .map_err(|e| self.map_error(e))?;

        match response {
            Response::Granted => Ok(AccessGrant {}),
            Response::Error { message } => Err(PeerError::Rejected {
                peer: self.peer.to_string(),
                reason: message,
            }),
            other => Err(PeerError::Protocol {
                peer: self.peer.to_string(),
                reason: format!("unexpected response: {other:?}"),
            }),
        }
    }
}

/// Opens [`TcpPeerLink`]s for members of the view
#[derive(Clone, Debug)]
pub struct TcpConnector {
    rpc_timeout: Duration,
}

impl TcpConnector {
    pub fn new(rpc_timeout: Duration) -> Self {
        Self { rpc_timeout }
    }
}

impl PeerConnector for TcpConnector {
    type Link = TcpPeerLink;

    fn connect(&self, member: &Member) -> TcpPeerLink {
        TcpPeerLink::new(member.identity.clone(), member.addr, self.rpc_timeout)
    }
}

/// One request, one response over a fresh connection
pub async fn call(addr: SocketAddr, request: Request) -> Result<Response, ProtocolError> {
    let stream = tokio::time::timeout(DEFAULT_TIMEOUT, TcpStream::connect(addr))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    stream.set_nodelay(true)?;
    let (mut reader, mut writer) = stream.into_split();

    protocol::write_request(&mut writer, &request, DEFAULT_TIMEOUT).await?;
    protocol::read_response(&mut reader).await
}

/// Ask a node for its coordinator status
pub async fn status(addr: SocketAddr) -> Result<CoordinatorStatus, ProtocolError> {
    let response = tokio::time::timeout(DEFAULT_TIMEOUT, call(addr, Request::Status))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    match response {
        Response::Status { status } => Ok(status),
        other => Err(ProtocolError::UnexpectedResponse(format!("{other:?}"))),
    }
}
