// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Launching the selected binary

use crate::store::set_executable;
use async_trait::async_trait;
use std::path::Path;

/// How a launch ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchResult {
    /// Ran and exited 0
    Succeeded,
    /// Ran and exited nonzero (or was killed by a signal, `code` is `None`)
    Failed { code: Option<i32> },
    /// Never started
    SpawnFailed { reason: String },
}

#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self, binary: &Path, args: &[String], source_label: &str) -> LaunchResult;
}

/// Runs the binary in its own directory and waits for it to exit
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

#[async_trait]
impl Launcher for ProcessLauncher {
    async fn launch(&self, binary: &Path, args: &[String], source_label: &str) -> LaunchResult {
        if let Err(e) = set_executable(binary) {
            tracing::warn!("Could not chmod {}: {e}", binary.display());
        }

        let mut command = tokio::process::Command::new(binary);
        command.args(args);
        if let Some(dir) = binary.parent() {
            command.current_dir(dir);
        }

        tracing::info!(
            "Running {source_label} binary: {} {}",
            binary.display(),
            args.join(" ")
        );

        let status = match command.status().await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!("Error running {source_label} binary: {e}");
                return LaunchResult::SpawnFailed {
                    reason: e.to_string(),
                };
            }
        };

        if status.success() {
            tracing::info!("{source_label} binary exited cleanly");
            LaunchResult::Succeeded
        } else {
            tracing::warn!("{source_label} binary exited with {status}");
            LaunchResult::Failed {
                code: status.code(),
            }
        }
    }
}
