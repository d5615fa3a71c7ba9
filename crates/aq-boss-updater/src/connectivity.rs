// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Connectivity pre-check before the remote tier

use crate::config::ConnectivityConfig;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;

#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// One bounded attempt; true when the network answered
    async fn probe(&self) -> bool;
}

/// Single ICMP echo through the system `ping`
#[derive(Debug, Clone)]
pub struct PingProbe {
    target: String,
    attempt_timeout: Duration,
}

impl PingProbe {
    pub fn new(config: &ConnectivityConfig) -> Self {
        Self {
            target: config.target.clone(),
            attempt_timeout: Duration::from_secs(config.attempt_timeout_secs.max(1)),
        }
    }
}

#[async_trait]
impl ConnectivityProbe for PingProbe {
    async fn probe(&self) -> bool {
        let status = tokio::process::Command::new("ping")
            .args(["-c", "1", "-W"])
            .arg(self.attempt_timeout.as_secs().to_string())
            .arg(&self.target)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        // ping honours -W itself; this only guards against a hung resolver.
        let grace = self.attempt_timeout + Duration::from_secs(1);
        match tokio::time::timeout(grace, status).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                tracing::debug!("ping could not be started: {e}");
                false
            }
            Err(_) => false,
        }
    }
}

/// Probe until the network answers or the policy's budget is spent
pub async fn wait_for_connectivity(probe: &dyn ConnectivityProbe, policy: &RetryPolicy) -> bool {
    tracing::info!("Checking internet connectivity...");
    let attempts = policy.attempts();

    let result = policy
        .run(|attempt| async move {
            if probe.probe().await {
                return Some(());
            }
            if attempt < attempts {
                tracing::info!(
                    "No internet yet, retrying in {}s (attempt {attempt}/{attempts})",
                    policy.interval.as_secs()
                );
            }
            None
        })
        .await;

    if result.is_some() {
        tracing::info!("Internet is available");
        true
    } else {
        tracing::info!("No internet after {}s", policy.max_wait.as_secs());
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    struct ScriptedProbe {
        succeed_on: Option<u32>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ConnectivityProbe for ScriptedProbe {
        async fn probe(&self) -> bool {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.succeed_on.is_some_and(|k| n >= k)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_connectivity_detected_on_later_attempt() {
        let probe = ScriptedProbe {
            succeed_on: Some(3),
            calls: AtomicU32::new(0),
        };
        let start = Instant::now();

        assert!(wait_for_connectivity(&probe, &RetryPolicy::from_secs(60, 10)).await);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_connectivity_gives_up_within_budget() {
        let probe = ScriptedProbe {
            succeed_on: None,
            calls: AtomicU32::new(0),
        };
        let start = Instant::now();

        assert!(!wait_for_connectivity(&probe, &RetryPolicy::from_secs(60, 10)).await);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 6);
        assert!(start.elapsed() <= Duration::from_secs(60));
    }

    /// Each probe takes as long as a ping that never gets an answer
    struct SlowPing;

    #[async_trait]
    impl ConnectivityProbe for SlowPing {
        async fn probe(&self) -> bool {
            tokio::time::sleep(Duration::from_secs(3)).await;
            false
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_pings_stay_within_cap() {
        let start = Instant::now();

        assert!(!wait_for_connectivity(&SlowPing, &RetryPolicy::from_secs(60, 10)).await);
        assert!(start.elapsed() <= Duration::from_secs(60));
    }
}
