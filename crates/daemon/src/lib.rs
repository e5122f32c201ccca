// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dimutex-daemon: one node of the distributed mutex, served over TCP

pub mod client;
pub mod config;
pub mod lifecycle;
pub mod protocol;
pub mod server;

pub use client::{TcpConnector, TcpPeerLink};
pub use config::Config;
pub use lifecycle::{startup, Daemon, LifecycleError, Node};
