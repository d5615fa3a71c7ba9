// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Version directory tree
//!
//! Layout under the base path:
//!
//! ```text
//! <base>/default/azq_boss_pc        bundled binary, never pruned
//! <base>/default/default.conf       optional bundled config
//! <base>/<version>/azq_boss_pc
//! <base>/<version>/<hostname>.conf
//! ```
//!
//! Version identifiers must sort byte-wise in the order they were released
//! (e.g. zero-padded or date-based). That order picks the most recent local
//! version and decides what pruning keeps.

use crate::config::RunConfig;
use crate::error::{Result, UpdaterError};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct VersionStore {
    base: PathBuf,
    default_version: String,
    binary_name: String,
    default_config_name: String,
}

/// A non-default version directory holding a config for this host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
    pub version: String,
    pub config: PathBuf,
    pub binary: PathBuf,
    pub has_binary: bool,
}

#[derive(Debug, Default)]
pub struct PruneReport {
    pub removed: Vec<String>,
    pub failed: Vec<String>,
}

impl VersionStore {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            base: config.base_path.clone(),
            default_version: config.default_version.clone(),
            binary_name: config.binary_name.clone(),
            default_config_name: config.default_config_name.clone(),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Create the base and default directories if absent
    pub fn ensure_layout(&self) -> Result<()> {
        fs::create_dir_all(self.default_dir())?;
        Ok(())
    }

    pub fn default_dir(&self) -> PathBuf {
        self.base.join(&self.default_version)
    }

    pub fn default_binary(&self) -> PathBuf {
        self.binary_path(&self.default_version)
    }

    pub fn default_config(&self) -> PathBuf {
        self.default_dir().join(&self.default_config_name)
    }

    pub fn version_dir(&self, id: &str) -> PathBuf {
        self.base.join(id)
    }

    pub fn binary_path(&self, id: &str) -> PathBuf {
        self.version_dir(id).join(&self.binary_name)
    }

    pub fn config_path(&self, id: &str, hostname: &str) -> PathBuf {
        self.version_dir(id).join(format!("{hostname}.conf"))
    }

    fn validate_id(&self, id: &str) -> Result<()> {
        let invalid = id.is_empty()
            || id == "."
            || id == ".."
            || id.contains(['/', '\\', '\0'])
            || id == self.default_version;
        if invalid {
            return Err(UpdaterError::InvalidVersion(id.to_owned()));
        }
        Ok(())
    }

    /// Directory for `id`, created if absent
    pub fn materialize(&self, id: &str) -> Result<PathBuf> {
        self.validate_id(id)?;
        let dir = self.version_dir(id);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Persist the host config text verbatim
    pub fn write_config(&self, id: &str, hostname: &str, text: &str) -> Result<PathBuf> {
        self.materialize(id)?;
        let path = self.config_path(id, hostname);
        fs::write(&path, text)?;
        Ok(path)
    }

    /// Write the binary next to its final name, then rename over it.
    ///
    /// A failed write never leaves a truncated executable under the final name.
    pub fn write_binary(&self, id: &str, bytes: &[u8]) -> Result<PathBuf> {
        self.materialize(id)?;
        let path = self.binary_path(id);
        let part = path.with_extension("part");

        let written = write_executable(&part, bytes).and_then(|()| {
            fs::rename(&part, &path)?;
            Ok(())
        });
        if let Err(e) = written {
            let _ = fs::remove_file(&part);
            return Err(e);
        }

        let sha256 = format!("{:x}", Sha256::digest(bytes));
        tracing::info!(
            "Stored binary {} ({} bytes, sha256 {sha256})",
            path.display(),
            bytes.len()
        );
        Ok(path)
    }

    /// Non-default version directories in ascending name order
    pub fn versions(&self) -> Result<Vec<String>> {
        let mut versions = Vec::new();
        for entry in fs::read_dir(&self.base)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if name != self.default_version {
                versions.push(name);
            }
        }
        versions.sort();
        Ok(versions)
    }

    /// Versions holding a config for `hostname`, most recent first
    pub fn local_candidates(&self, hostname: &str) -> Result<Vec<LocalEntry>> {
        let mut entries = Vec::new();
        for version in self.versions()?.into_iter().rev() {
            let config = self.config_path(&version, hostname);
            if !config.is_file() {
                continue;
            }
            let binary = self.binary_path(&version);
            let has_binary = binary.is_file();
            entries.push(LocalEntry {
                version,
                config,
                binary,
                has_binary,
            });
        }
        Ok(entries)
    }

    /// Remove every non-default version except the `retain` greatest.
    ///
    /// Best effort: a directory that cannot be removed is reported and the
    /// rest are still attempted.
    pub fn prune(&self, retain: usize) -> PruneReport {
        let mut report = PruneReport::default();
        let versions = match self.versions() {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("Cleanup failed, could not list {}: {e}", self.base.display());
                return report;
            }
        };

        let excess = versions.len().saturating_sub(retain);
        for version in versions.into_iter().take(excess) {
            let dir = self.version_dir(&version);
            tracing::info!("Removing old version: {version}");
            match fs::remove_dir_all(&dir) {
                Ok(()) => report.removed.push(version),
                Err(e) => {
                    tracing::warn!("Failed to remove {}: {e}", dir.display());
                    report.failed.push(version);
                }
            }
        }
        report
    }
}

fn write_executable(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    set_executable(path)?;
    file.sync_all()?;
    Ok(())
}

/// chmod 0755
pub fn set_executable(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms)?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
