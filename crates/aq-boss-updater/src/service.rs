// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Consumer service control
//!
//! Best effort on both sides: failures are logged and never retried.

use async_trait::async_trait;
use std::process::Stdio;

#[async_trait]
pub trait ServiceControl: Send + Sync {
    async fn stop(&self, service: &str);
    async fn start(&self, service: &str);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Systemctl;

async fn systemctl(args: &[&str]) {
    let result = tokio::process::Command::new("systemctl")
        .args(args)
        .stdin(Stdio::null())
        .status()
        .await;

    match result {
        Ok(status) if status.success() => {}
        Ok(status) => tracing::warn!("systemctl {} exited with {status}", args.join(" ")),
        Err(e) => tracing::warn!("Failed to run systemctl {}: {e}", args.join(" ")),
    }
}

#[async_trait]
impl ServiceControl for Systemctl {
    async fn stop(&self, service: &str) {
        systemctl(&["stop", service]).await;
    }

    /// Reload units first: the package may have replaced the unit file
    async fn start(&self, service: &str) {
        systemctl(&["daemon-reload"]).await;
        systemctl(&["start", service]).await;
    }
}
