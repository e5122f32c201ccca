//! Behavioral specifications for the dimutexd binary.
//!
//! These tests are black-box: they invoke the daemon binary and verify
//! stdout, stderr, exit codes and the log it writes.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

// cli/
#[path = "specs/cli/config.rs"]
mod cli_config;
#[path = "specs/cli/help.rs"]
mod cli_help;

// daemon/
#[path = "specs/daemon/lifecycle.rs"]
mod daemon_lifecycle;
