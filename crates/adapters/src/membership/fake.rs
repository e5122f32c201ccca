// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scriptable membership for tests

use dimutex_core::{Member, MembershipView, NodeIdentity};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::watch;

/// Membership view driven by the test
#[derive(Clone)]
pub struct FakeMembership {
    tx: Arc<watch::Sender<BTreeSet<Member>>>,
}

impl Default for FakeMembership {
    fn default() -> Self {
        let (tx, _) = watch::channel(BTreeSet::new());
        Self { tx: Arc::new(tx) }
    }
}

impl FakeMembership {
    pub fn new(members: impl IntoIterator<Item = Member>) -> Self {
        let fake = Self::default();
        fake.set(members);
        fake
    }

    pub fn set(&self, members: impl IntoIterator<Item = Member>) {
        self.tx.send_replace(members.into_iter().collect());
    }

    pub fn join(&self, member: Member) {
        self.tx.send_modify(|members| {
            members.insert(member);
        });
    }

    pub fn leave(&self, identity: &NodeIdentity) {
        self.tx.send_modify(|members| members.retain(|m| m.identity != *identity));
    }
}

impl MembershipView for FakeMembership {
    fn current_members(&self) -> BTreeSet<Member> {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<BTreeSet<Member>> {
        self.tx.subscribe()
    }
}
