// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed membership from configuration

use dimutex_core::{Member, MembershipView, NodeIdentity};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::watch;

/// Membership that never changes after startup
#[derive(Clone)]
pub struct StaticMembership {
    tx: Arc<watch::Sender<BTreeSet<Member>>>,
}

impl StaticMembership {
    /// `local` is filtered out so a shared peer list can be used on every node
    pub fn new(local: &NodeIdentity, members: impl IntoIterator<Item = Member>) -> Self {
        let members = members
            .into_iter()
            .filter(|m| m.identity != *local)
            .collect();
        let (tx, _) = watch::channel(members);
        Self { tx: Arc::new(tx) }
    }
}

impl MembershipView for StaticMembership {
    fn current_members(&self) -> BTreeSet<Member> {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<BTreeSet<Member>> {
        self.tx.subscribe()
    }
}
