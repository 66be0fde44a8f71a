// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Container lifecycle control for cold-start measurements.

use std::future::Future;

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("Failed to run {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{binary} {action} {container} failed: {stderr}")]
    CommandFailed {
        binary: String,
        action: &'static str,
        container: String,
        stderr: String,
    },
}

/// Stop/start of a named container.
pub trait ContainerRuntime: Send + Sync {
    fn stop(&self, container: &str) -> impl Future<Output = Result<(), ContainerError>> + Send;
    fn start(&self, container: &str) -> impl Future<Output = Result<(), ContainerError>> + Send;
}

/// The container CLI (`docker` by default).
#[derive(Debug, Clone)]
pub struct ContainerCli {
    binary: String,
}

impl ContainerCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, action: &'static str, container: &str) -> Result<(), ContainerError> {
        debug!(binary = %self.binary, action, container, "Container command");
        let output = Command::new(&self.binary)
            .args([action, container])
            .output()
            .await
            .map_err(|source| ContainerError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(ContainerError::CommandFailed {
                binary: self.binary.clone(),
                action,
                container: container.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

impl ContainerRuntime for ContainerCli {
    async fn stop(&self, container: &str) -> Result<(), ContainerError> {
        self.run("stop", container).await
    }

    async fn start(&self, container: &str) -> Result<(), ContainerError> {
        self.run("start", container).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let cli = ContainerCli::new("ecobench-no-such-binary");
        assert!(matches!(
            cli.stop("gin-carbon-test").await,
            Err(ContainerError::Spawn { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_command_reports_stderr() {
        // `false` ignores its arguments and exits 1.
        let cli = ContainerCli::new("false");
        assert!(matches!(
            cli.start("gin-carbon-test").await,
            Err(ContainerError::CommandFailed { action: "start", .. })
        ));
    }
}
