// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn node(id: u64) -> NodeIdentity {
    NodeIdentity::new(id, format!("n{id}"))
}

#[test]
fn empty_snapshot_is_satisfied() {
    let barrier = QuorumBarrier::new(Vec::new());
    assert!(barrier.is_satisfied());
    assert_eq!(barrier.required(), 0);
}

#[test]
fn needs_a_grant_from_every_peer() {
    let mut barrier = QuorumBarrier::new(vec![node(1), node(2)]);
    assert!(barrier.record_grant(&node(1)));
    assert!(!barrier.is_satisfied());
    assert!(barrier.record_grant(&node(2)));
    assert!(barrier.is_satisfied());
    assert_eq!(barrier.granted(), 2);
}

#[test]
fn duplicate_and_unknown_grants_are_ignored() {
    let mut barrier = QuorumBarrier::new(vec![node(1), node(2)]);
    assert!(barrier.record_grant(&node(1)));
    assert!(!barrier.record_grant(&node(1)));
    assert!(!barrier.record_grant(&node(9)));
    assert!(!barrier.is_satisfied());
    assert_eq!(barrier.missing(), vec![node(2)]);
}

#[test]
fn failure_does_not_count_as_grant() {
    let mut barrier = QuorumBarrier::new(vec![node(1)]);
    barrier.record_failure(&node(1), PeerError::Timeout("n1".to_string()));
    assert!(!barrier.is_satisfied());
    assert_eq!(barrier.failures().len(), 1);
    assert_eq!(barrier.missing(), vec![node(1)]);
}

#[test]
fn departure_shrinks_quorum() {
    let mut barrier = QuorumBarrier::new(vec![node(1), node(2)]);
    barrier.record_grant(&node(1));
    assert!(barrier.forget(&node(2)));
    assert!(barrier.is_satisfied());
}

#[test]
fn forgetting_granted_peer_reports_not_needed() {
    let mut barrier = QuorumBarrier::new(vec![node(1)]);
    barrier.record_grant(&node(1));
    assert!(!barrier.forget(&node(1)));
}

#[test]
fn required_peer_starts_undispatched() {
    let mut barrier = QuorumBarrier::new(vec![node(1)]);
    assert!(barrier.require(node(2)));
    assert!(!barrier.require(node(1)));
    assert!(barrier.needs_dispatch(&node(2)));
    assert!(!barrier.needs_dispatch(&node(1)));
    barrier.mark_dispatched(&node(2));
    assert!(!barrier.needs_dispatch(&node(2)));
    assert!(!barrier.is_satisfied());
}

#[test]
fn failed_peer_needs_dispatch_again() {
    let mut barrier = QuorumBarrier::new(vec![node(1)]);
    barrier.record_failure(&node(1), PeerError::Timeout("n1".to_string()));
    assert!(barrier.needs_dispatch(&node(1)));

    barrier.mark_dispatched(&node(1));
    assert!(!barrier.needs_dispatch(&node(1)));
    assert!(barrier.failures().is_empty());

    barrier.record_grant(&node(1));
    assert!(!barrier.needs_dispatch(&node(1)));
    assert!(barrier.is_satisfied());
}
