// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

fn config(seeds: Vec<SocketAddr>) -> GossipConfig {
    GossipConfig::new(SocketAddr::from(([127, 0, 0, 1], 0)))
        .with_seeds(seeds)
        .with_interval(Duration::from_millis(20))
        .with_timeouts(Duration::from_millis(300), Duration::from_millis(600))
}

fn rpc(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

async fn start(id: u64, seeds: Vec<SocketAddr>) -> GossipMembership {
    GossipMembership::start(NodeIdentity::new(id, format!("n{id}")), rpc(9000 + id as u16), config(seeds))
        .await
        .unwrap()
}

async fn wait_for_view(membership: &GossipMembership, expected: &[u64]) {
    let mut rx = membership.subscribe();
    let expected: Vec<u64> = expected.to_vec();
    tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|view| view.iter().map(|m| m.identity.id).collect::<Vec<_>>() == expected),
    )
    .await
    .unwrap_or_else(|_| panic!("view never became {expected:?}: {:?}", membership.current_members()))
    .unwrap();
}

#[tokio::test]
async fn members_discover_each_other_through_a_seed() {
    let seed = start(1, vec![]).await;
    let second = start(2, vec![seed.local_addr()]).await;
    let third = start(3, vec![seed.local_addr()]).await;

    wait_for_view(&seed, &[2, 3]).await;
    wait_for_view(&second, &[1, 3]).await;
    wait_for_view(&third, &[1, 2]).await;

    let view = second.current_members();
    let first = view.iter().next().unwrap();
    assert_eq!(first.addr, rpc(9001));
}

#[tokio::test]
async fn unreachable_seed_is_not_fatal() {
    let dead_seed = {
        let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.local_addr().unwrap()
    };
    let membership = start(1, vec![dead_seed]).await;
    assert!(membership.current_members().is_empty());
}

#[tokio::test]
async fn leave_is_seen_by_peers() {
    let seed = start(1, vec![]).await;
    let other = start(2, vec![seed.local_addr()]).await;
    wait_for_view(&seed, &[2]).await;
    wait_for_view(&other, &[1]).await;

    other.leave().await;
    wait_for_view(&seed, &[]).await;
}

#[tokio::test]
async fn silent_member_is_eventually_dropped() {
    let seed = start(1, vec![]).await;
    let other = start(2, vec![seed.local_addr()]).await;
    wait_for_view(&seed, &[2]).await;

    // Stop the loops without announcing anything
    other.inner.stop.send_replace(true);
    wait_for_view(&seed, &[]).await;
}

#[tokio::test]
async fn bind_failure_is_reported() {
    let taken = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = taken.local_addr().unwrap();
    let err = GossipMembership::start(NodeIdentity::new(1, "n1"), rpc(9001), GossipConfig::new(addr))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, MembershipError::Bind(at, _) if at == addr));
}
