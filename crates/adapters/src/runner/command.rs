// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runner executing a shell command while access is held

use async_trait::async_trait;
use dimutex_core::{CriticalSectionRunner, RunnerError};
use tokio::process::Command;

/// Runs `sh -c <command>` once per critical section.
///
/// The command sees the node name in `DIMUTEX_NODE`. A non-zero exit is a
/// failure; the section is released either way.
#[derive(Clone, Debug)]
pub struct CommandRunner {
    node: String,
    command: String,
}

impl CommandRunner {
    pub fn new(node: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

#[async_trait]
impl CriticalSectionRunner for CommandRunner {
    async fn run(&self) -> Result<(), RunnerError> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .env("DIMUTEX_NODE", &self.node)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RunnerError::Failed(format!(
                "`{}` exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        tracing::debug!(command = %self.command, stdout = %stdout.trim(), "command finished");
        Ok(())
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
