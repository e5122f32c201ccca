// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deferred-reply queue

use crate::id::NodeIdentity;
use crate::message::{AccessGrant, AccessRequest};
use std::collections::VecDeque;
use tokio::sync::oneshot;

/// Requests received while the local claim took precedence.
///
/// Every entry is answered exactly once, in arrival order, when the local
/// node releases or abandons its claim.
#[derive(Debug, Default)]
pub(crate) struct DeferredReplies {
    queue: VecDeque<(AccessRequest, oneshot::Sender<AccessGrant>)>,
}

impl DeferredReplies {
    pub(crate) fn push(&mut self, request: AccessRequest, reply: oneshot::Sender<AccessGrant>) {
        self.queue.push_back((request, reply));
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn requesters(&self) -> Vec<NodeIdentity> {
        self.queue
            .iter()
            .map(|(request, _)| request.requester.clone())
            .collect()
    }

    /// Grant every queued request and empty the queue.
    ///
    /// Returns the requests in the order they were answered.
    pub(crate) fn flush(&mut self) -> Vec<AccessRequest> {
        let mut answered = Vec::with_capacity(self.queue.len());
        while let Some((request, reply)) = self.queue.pop_front() {
            if reply.send(AccessGrant {}).is_err() {
                // Requester hung up; its claim is gone either way
                tracing::debug!(requester = %request.requester, "deferred requester no longer waiting");
            }
            answered.push(request);
        }
        answered
    }
}
