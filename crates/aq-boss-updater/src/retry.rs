// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Bounded retry policy shared by the connectivity probe and the USB scan
//!
//! Sleeps go through `tokio::time`, so tests drive the policy with a paused clock.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Fixed-interval retry capped by a total wait budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PolicySecs", into = "PolicySecs")]
pub struct RetryPolicy {
    pub max_wait: Duration,
    pub interval: Duration,
}

#[derive(Serialize, Deserialize)]
struct PolicySecs {
    max_wait_secs: u64,
    interval_secs: u64,
}

impl From<PolicySecs> for RetryPolicy {
    fn from(p: PolicySecs) -> Self {
        Self::from_secs(p.max_wait_secs, p.interval_secs)
    }
}

impl From<RetryPolicy> for PolicySecs {
    fn from(p: RetryPolicy) -> Self {
        Self {
            max_wait_secs: p.max_wait.as_secs(),
            interval_secs: p.interval.as_secs(),
        }
    }
}

impl RetryPolicy {
    pub const fn new(max_wait: Duration, interval: Duration) -> Self {
        Self { max_wait, interval }
    }

    pub const fn from_secs(max_wait_secs: u64, interval_secs: u64) -> Self {
        Self::new(
            Duration::from_secs(max_wait_secs),
            Duration::from_secs(interval_secs),
        )
    }

    /// Number of attempts the budget allows, never less than one
    pub fn attempts(&self) -> u32 {
        let interval = self.interval.as_millis();
        if interval == 0 {
            return 1;
        }
        let n = self.max_wait.as_millis().div_ceil(interval);
        u32::try_from(n).unwrap_or(u32::MAX).max(1)
    }

    /// Call `op` until it yields `Some`, the attempts run out, or `max_wait`
    /// has elapsed since the first call.
    ///
    /// `op` receives the 1-based attempt number. The first attempt always runs
    /// to completion; later ones are cut off at the deadline. There is no sleep
    /// after the final attempt, and no sleep that would end past the deadline.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Option<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Option<T>>,
    {
        let deadline = Instant::now() + self.max_wait;
        let attempts = self.attempts();

        for attempt in 1..=attempts {
            let result = if attempt == 1 {
                op(attempt).await
            } else {
                match tokio::time::timeout_at(deadline, op(attempt)).await {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::debug!(
                            "Attempt {attempt} cut off at the {}s deadline",
                            self.max_wait.as_secs()
                        );
                        return None;
                    }
                }
            };
            if result.is_some() {
                return result;
            }
            if attempt == attempts || Instant::now() + self.interval >= deadline {
                break;
            }
            tokio::time::sleep(self.interval).await;
        }
        None
    }
}
