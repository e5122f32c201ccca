// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Critical section runners

mod command;
mod hold;

pub use command::CommandRunner;
pub use hold::{HoldRunner, DEFAULT_HOLD};

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{Ledger, LedgerEntry, LedgerRunner};
