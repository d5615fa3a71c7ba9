// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! USB install transaction
//!
//! lock -> scan -> validate -> compare -> stop service -> install -> start service

use crate::config::UsbConfig;
use crate::error::Result;
use crate::lock::LockToken;
use crate::package::{PackageManager, PackageValidator};
use crate::scanner::UpdateScanner;
use crate::service::ServiceControl;
use crate::version::is_newer;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Another transaction holds the lock; nothing was attempted
    Contended,
    NoUpdateFolder,
    NoCandidate,
    /// The candidate failed validation
    Rejected { path: PathBuf, reason: String },
    NotNewer { candidate: String, installed: String },
    /// The medium was removed between validation and install
    CandidateVanished { path: PathBuf },
    /// The service was cycled around an install attempt
    Installed { version: String, succeeded: bool },
}

pub struct UpdateInstaller {
    config: UsbConfig,
    packages: Box<dyn PackageManager>,
    services: Box<dyn ServiceControl>,
}

impl fmt::Debug for UpdateInstaller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateInstaller")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl UpdateInstaller {
    pub fn new(
        config: UsbConfig,
        packages: Box<dyn PackageManager>,
        services: Box<dyn ServiceControl>,
    ) -> Self {
        Self {
            config,
            packages,
            services,
        }
    }

    /// Run one transaction. Contention is a normal outcome, not an error.
    pub async fn run(&self) -> Result<InstallOutcome> {
        let Some(_token) = LockToken::try_acquire(&self.config.lock_path)? else {
            tracing::info!("Another update process is already running, exiting");
            return Ok(InstallOutcome::Contended);
        };
        tracing::info!("Checkpoint 1: Lock acquired, starting update process");

        Ok(self.transaction().await)
    }

    async fn transaction(&self) -> InstallOutcome {
        let scanner = UpdateScanner::new(&self.config);

        let Some(update_dir) = scanner.find_update_folder().await else {
            return InstallOutcome::NoUpdateFolder;
        };
        let Some(path) = scanner.find_candidate(&update_dir) else {
            return InstallOutcome::NoCandidate;
        };

        let validator = PackageValidator::new(self.packages.as_ref(), &self.config.package_name);
        let candidate = match validator.validate(&path).await {
            Ok(candidate) => candidate,
            Err(e) => {
                tracing::info!("Skipping {}: {e}", path.display());
                return InstallOutcome::Rejected {
                    path,
                    reason: e.to_string(),
                };
            }
        };

        let installed = match self.packages.installed_version(&self.config.package_name).await {
            Some(version) => {
                tracing::info!("Checkpoint 3: Detected currently installed version {version}");
                version
            }
            None => {
                tracing::info!("Checkpoint 3: Package not installed");
                String::new()
            }
        };
        tracing::info!(
            "Checkpoint 7: Current version: {}, USB version: {}",
            if installed.is_empty() { "none" } else { installed.as_str() },
            candidate.version
        );

        if !is_newer(&candidate.version, &installed) {
            tracing::info!("No newer package found");
            return InstallOutcome::NotNewer {
                candidate: candidate.version,
                installed,
            };
        }

        if !candidate.path.is_file() {
            tracing::warn!(
                "Update package {} disappeared before install, was the medium removed?",
                candidate.path.display()
            );
            return InstallOutcome::CandidateVanished {
                path: candidate.path,
            };
        }

        tracing::info!(
            "Found newer {} version {}, proceeding with update",
            candidate.name,
            candidate.version
        );

        tracing::info!("Checkpoint 7: Stopping {}...", self.config.service_name);
        self.services.stop(&self.config.service_name).await;
        tokio::time::sleep(Duration::from_secs(self.config.service_settle_secs)).await;

        tracing::info!(
            "Installing {} from {}...",
            candidate.version,
            candidate.path.display()
        );
        let succeeded = match self.packages.install(&candidate.path).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Install of {} failed: {e}", candidate.version);
                false
            }
        };

        tracing::info!("Checkpoint 8: Restarting {}...", self.config.service_name);
        self.services.start(&self.config.service_name).await;

        if succeeded {
            tracing::info!("Update complete: now running {}", candidate.version);
        } else {
            tracing::warn!("Update to {} did not complete", candidate.version);
        }
        InstallOutcome::Installed {
            version: candidate.version,
            succeeded,
        }
    }
}
