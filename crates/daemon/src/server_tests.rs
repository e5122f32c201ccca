// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::client::{self, TcpPeerLink};
use dimutex_core::{
    AccessRequest, CoordinatorConfig, CriticalSectionState, NodeIdentity, PeerError,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

fn node(id: u64) -> NodeIdentity {
    NodeIdentity::new(id, format!("n{id}"))
}

struct Served {
    coordinator: MutexCoordinator<TcpPeerLink>,
    addr: SocketAddr,
    _stop: watch::Sender<bool>,
}

async fn served(id: u64) -> Served {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let coordinator = MutexCoordinator::new(node(id), CoordinatorConfig::default());
    let (stop, shutdown) = watch::channel(false);
    tokio::spawn(serve(listener, coordinator.clone(), shutdown));
    Served {
        coordinator,
        addr,
        _stop: stop,
    }
}

fn link(to: &Served, timeout: Duration) -> TcpPeerLink {
    TcpPeerLink::new(to.coordinator.identity().clone(), to.addr, timeout)
}

#[tokio::test]
async fn ping_answers_with_identity() {
    let server = served(1).await;
    let response = client::call(server.addr, Request::Ping).await.unwrap();
    match response {
        Response::Pong { node: who, version } => {
            assert_eq!(who, node(1));
            assert_eq!(version, PROTOCOL_VERSION);
        }
        other => panic!("expected pong, got {other:?}"),
    }
}

#[tokio::test]
async fn released_node_grants_immediately() {
    let server = served(1).await;
    let link = link(&server, Duration::from_secs(5));

    link.request_access(AccessRequest::new(node(2), 4)).await.unwrap();
    assert!(server.coordinator.clock() > 4);
}

#[tokio::test]
async fn held_node_keeps_connection_open_until_release() {
    let server = served(1).await;
    server
        .coordinator
        .request_access(Duration::from_secs(1))
        .await
        .unwrap();

    let pending = tokio::spawn({
        let link = link(&server, Duration::from_secs(5));
        async move { link.request_access(AccessRequest::new(node(2), 1)).await }
    });

    for _ in 0..200 {
        if !server.coordinator.status().deferred.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(server.coordinator.status().deferred, vec![node(2)]);
    assert!(!pending.is_finished());

    assert_eq!(server.coordinator.release_access().unwrap(), 1);
    pending.await.unwrap().unwrap();
}

#[tokio::test]
async fn rpc_timeout_bounds_a_deferred_call() {
    let server = served(1).await;
    server
        .coordinator
        .request_access(Duration::from_secs(1))
        .await
        .unwrap();

    let err = link(&server, Duration::from_millis(50))
        .request_access(AccessRequest::new(node(2), 1))
        .await
        .unwrap_err();
    assert_eq!(err, PeerError::Timeout(node(1).to_string()));
}

#[tokio::test]
async fn overflowing_timestamp_is_rejected() {
    let server = served(1).await;
    let link = link(&server, Duration::from_secs(5));

    let err = link
        .request_access(AccessRequest::new(node(2), u64::MAX))
        .await
        .unwrap_err();
    assert!(matches!(err, PeerError::Rejected { .. }), "{err:?}");
    assert_eq!(server.coordinator.clock(), 0);

    // The node keeps answering sane requests
    link.request_access(AccessRequest::new(node(2), 3)).await.unwrap();
}

#[tokio::test]
async fn status_reports_coordinator_state() {
    let server = served(1).await;
    server
        .coordinator
        .request_access(Duration::from_secs(1))
        .await
        .unwrap();

    let status = client::status(server.addr).await.unwrap();
    assert_eq!(status.identity, node(1));
    assert_eq!(status.state, CriticalSectionState::Held);
    assert!(status.claim.is_some());
}

#[tokio::test]
async fn closed_port_is_unreachable() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let link = TcpPeerLink::new(node(9), addr, Duration::from_secs(1));

    let err = link
        .request_access(AccessRequest::new(node(2), 1))
        .await
        .unwrap_err();
    assert!(matches!(err, PeerError::Unreachable { .. }), "{err:?}");
}

#[tokio::test]
async fn malformed_request_is_a_protocol_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let coordinator: MutexCoordinator<TcpPeerLink> =
        MutexCoordinator::new(node(1), CoordinatorConfig::default());

    let client = tokio::spawn(async move {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        protocol::write_message(&mut stream, b"not json").await.unwrap();
        stream.shutdown().await.unwrap();
    });

    let (stream, _) = listener.accept().await.unwrap();
    let err = handle_connection(&coordinator, stream).await.unwrap_err();
    assert!(matches!(err, ServerError::Protocol(ProtocolError::Json(_))), "{err:?}");
    client.await.unwrap();
}

#[tokio::test]
async fn client_hanging_up_early_is_not_an_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let coordinator: MutexCoordinator<TcpPeerLink> =
        MutexCoordinator::new(node(1), CoordinatorConfig::default());

    drop(TcpStream::connect(addr).await.unwrap());
    let (stream, _) = listener.accept().await.unwrap();
    handle_connection(&coordinator, stream).await.unwrap();
}
