// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Run cycle: remote -> last-known-local -> bundled default
//!
//! Each tier is tried only when the one before it was unavailable or could
//! not launch a binary. A binary that launched ends the cycle whatever its
//! exit code. A host config without its binary aborts the whole cycle.

use crate::config::RunConfig;
use crate::connectivity::{ConnectivityProbe, wait_for_connectivity};
use crate::error::{Result, UpdaterError};
use crate::launcher::{LaunchResult, Launcher};
use crate::remote::RemoteSource;
use crate::resolver::{LocalLookup, Selection, VersionResolver, resolve_default};
use crate::state::{LastRun, RunStatus, load_last_run, save_last_run};
use crate::store::VersionStore;
use std::fmt;
use std::path::PathBuf;

pub use crate::resolver::Tier;

/// Exactly one of these per cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded {
        tier: Tier,
        version: String,
    },
    BinaryFailed {
        tier: Tier,
        version: String,
        code: Option<i32>,
    },
    NoRunnableVersion,
    /// A local config was found without its binary; no further tier was tried
    MissingBinary {
        version: String,
        config: PathBuf,
        binary: PathBuf,
    },
}

impl RunOutcome {
    pub fn tier(&self) -> Option<Tier> {
        match self {
            Self::Succeeded { tier, .. } | Self::BinaryFailed { tier, .. } => Some(*tier),
            Self::NoRunnableVersion | Self::MissingBinary { .. } => None,
        }
    }
}

/// Hostname keying the per-host config files
pub fn resolve_hostname(config: &RunConfig) -> Result<String> {
    if let Some(ref name) = config.hostname {
        return Ok(name.clone());
    }
    let name = nix::unistd::gethostname()
        .map_err(|e| UpdaterError::Process(format!("gethostname failed: {e}")))?;
    name.into_string()
        .map_err(|_| UpdaterError::Process("hostname is not valid UTF-8".to_owned()))
}

pub struct RunOrchestrator {
    config: RunConfig,
    store: VersionStore,
    hostname: Option<String>,
    remote: Option<Box<dyn RemoteSource>>,
    probe: Box<dyn ConnectivityProbe>,
    launcher: Box<dyn Launcher>,
}

impl fmt::Debug for RunOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOrchestrator")
            .field("store", &self.store)
            .field("hostname", &self.hostname)
            .finish_non_exhaustive()
    }
}

impl RunOrchestrator {
    pub fn new(
        config: RunConfig,
        hostname: Option<String>,
        remote: Option<Box<dyn RemoteSource>>,
        probe: Box<dyn ConnectivityProbe>,
        launcher: Box<dyn Launcher>,
    ) -> Self {
        let store = VersionStore::new(&config);
        Self {
            config,
            store,
            hostname,
            remote,
            probe,
            launcher,
        }
    }

    /// One full cycle: pick a tier, launch, then prune and record.
    pub async fn run_cycle(&self) -> RunOutcome {
        if let Err(e) = self.store.ensure_layout() {
            tracing::warn!(
                "Could not prepare {}: {e}",
                self.store.base().display()
            );
        }
        self.log_previous_run();

        let outcome = self.select_and_launch().await;

        match outcome {
            RunOutcome::MissingBinary {
                ref version,
                ref config,
                ref binary,
            } => {
                tracing::error!(
                    "Conf found for {version} at {} but binary missing at {}. Not running default, fix this.",
                    config.display(),
                    binary.display()
                );
            }
            RunOutcome::NoRunnableVersion => {
                tracing::error!("Could not run AQ Boss binary (remote, local, or default)");
                self.finish(&outcome);
            }
            RunOutcome::Succeeded { .. } | RunOutcome::BinaryFailed { .. } => {
                self.finish(&outcome);
            }
        }

        outcome
    }

    async fn select_and_launch(&self) -> RunOutcome {
        match self.hostname.as_deref() {
            Some(hostname) => {
                if let Some(outcome) = self.remote_then_local(hostname).await {
                    return outcome;
                }
            }
            None => tracing::warn!("Hostname unknown, skipping remote and local versions"),
        }

        match resolve_default(&self.store) {
            Some(selection) => self
                .launch(selection)
                .await
                .unwrap_or(RunOutcome::NoRunnableVersion),
            None => RunOutcome::NoRunnableVersion,
        }
    }

    /// `None` when neither tier launched anything and default should run
    async fn remote_then_local(&self, hostname: &str) -> Option<RunOutcome> {
        let resolver = VersionResolver::new(
            &self.store,
            self.remote.as_deref(),
            &self.config.artifact_prefix,
            hostname,
        );

        if self.remote.is_none() {
            tracing::warn!("No remote source, skipping remote configuration");
        } else if wait_for_connectivity(self.probe.as_ref(), &self.config.connectivity.retry).await
        {
            match resolver.resolve_remote().await {
                Ok(selection) => {
                    if let Some(outcome) = self.launch(selection).await {
                        return Some(outcome);
                    }
                    tracing::warn!("Online binary did not start, trying previously downloaded version");
                }
                Err(e) => {
                    tracing::warn!("Online fetch failed ({e}), trying previously downloaded version");
                }
            }
        } else {
            tracing::info!("Offline, skipping remote configuration");
        }

        match resolver.resolve_local() {
            LocalLookup::Found(selection) => self.launch(selection).await,
            LocalLookup::MissingBinary {
                version,
                config,
                binary,
            } => Some(RunOutcome::MissingBinary {
                version,
                config,
                binary,
            }),
            LocalLookup::NotFound => {
                tracing::info!("No previously downloaded version for {hostname}");
                None
            }
        }
    }

    /// `None` when the binary never started and the next tier should run
    async fn launch(&self, selection: Selection) -> Option<RunOutcome> {
        let label = selection.label();
        let args = selection
            .host_config
            .launch_args(&self.config.bridge_flag, &label);

        match self.launcher.launch(&selection.binary, &args, &label).await {
            LaunchResult::Succeeded => Some(RunOutcome::Succeeded {
                tier: selection.tier,
                version: selection.version,
            }),
            LaunchResult::Failed { code } => Some(RunOutcome::BinaryFailed {
                tier: selection.tier,
                version: selection.version,
                code,
            }),
            LaunchResult::SpawnFailed { .. } => None,
        }
    }

    fn finish(&self, outcome: &RunOutcome) {
        let report = self.store.prune(self.config.retain_versions);

        let (status, version, exit_code) = match outcome {
            RunOutcome::Succeeded { version, .. } => {
                (RunStatus::Succeeded, Some(version.clone()), None)
            }
            RunOutcome::BinaryFailed { version, code, .. } => {
                (RunStatus::BinaryFailed, Some(version.clone()), *code)
            }
            RunOutcome::NoRunnableVersion | RunOutcome::MissingBinary { .. } => {
                (RunStatus::NoRunnableVersion, None, None)
            }
        };
        let record = LastRun {
            finished_at: chrono::Utc::now(),
            status,
            tier: outcome.tier(),
            version,
            exit_code,
            pruned: report.removed,
        };

        if let Err(e) = save_last_run(&self.config.state_path(), &record) {
            tracing::warn!("Could not record last run: {e}");
        }
    }

    fn log_previous_run(&self) {
        match load_last_run(&self.config.state_path()) {
            Ok(Some(prev)) => tracing::info!(
                "Previous run at {}: {:?} via {:?} {}",
                prev.finished_at,
                prev.status,
                prev.tier,
                prev.version.as_deref().unwrap_or("-")
            ),
            Ok(None) => {}
            Err(e) => tracing::debug!("Ignoring unreadable last-run record: {e}"),
        }
    }
}
