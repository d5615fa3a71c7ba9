// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Picking the version directory and host config for each tier

use crate::error::{Result, UpdaterError};
use crate::host_config::{ConfigRecord, HostConfig, KEY_BRIDGE_MODE};
use crate::remote::{RemoteSource, artifact_name};
use crate::store::VersionStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Remote,
    Local,
    Default,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Remote => "remote",
            Self::Local => "local",
            Self::Default => "default",
        })
    }
}

/// A runnable binary and the config it is launched with
#[derive(Debug, Clone)]
pub struct Selection {
    pub tier: Tier,
    pub version: String,
    pub binary: PathBuf,
    pub host_config: HostConfig,
}

impl Selection {
    /// `remote:2.1`, `local:2.0`, `default`
    pub fn label(&self) -> String {
        match self.tier {
            Tier::Default => self.tier.to_string(),
            Tier::Remote | Tier::Local => format!("{}:{}", self.tier, self.version),
        }
    }
}

#[derive(Debug)]
pub enum LocalLookup {
    Found(Selection),
    NotFound,
    /// A host config without its binary: the cycle must stop here
    MissingBinary {
        version: String,
        config: PathBuf,
        binary: PathBuf,
    },
}

pub struct VersionResolver<'a> {
    store: &'a VersionStore,
    remote: Option<&'a dyn RemoteSource>,
    artifact_prefix: &'a str,
    hostname: &'a str,
}

impl fmt::Debug for VersionResolver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionResolver")
            .field("store", &self.store)
            .field("hostname", &self.hostname)
            .finish_non_exhaustive()
    }
}

impl<'a> VersionResolver<'a> {
    pub fn new(
        store: &'a VersionStore,
        remote: Option<&'a dyn RemoteSource>,
        artifact_prefix: &'a str,
        hostname: &'a str,
    ) -> Self {
        Self {
            store,
            remote,
            artifact_prefix,
            hostname,
        }
    }

    /// Fetch the host config and its binary into the store.
    ///
    /// Nothing is written unless the config names both a version and an arch.
    /// The config is persisted before the binary is fetched, so a failed
    /// download leaves the config behind on purpose.
    pub async fn resolve_remote(&self) -> Result<Selection> {
        let remote = self
            .remote
            .ok_or_else(|| UpdaterError::Fetch("no remote source available".to_owned()))?;
        tracing::info!("Fetching configuration for {}...", self.hostname);
        let text = remote.fetch_config(self.hostname).await?;
        let host_config = HostConfig::parse(&text);
        let target = host_config.remote_target()?;

        self.store.write_config(&target.version, self.hostname, &text)?;

        let name = artifact_name(self.artifact_prefix, &target.arch, &target.version);
        tracing::info!("Downloading binary version {} ({name})...", target.version);
        let bytes = remote.fetch_artifact(&name).await?;
        let binary = self.store.write_binary(&target.version, &bytes)?;

        Ok(Selection {
            tier: Tier::Remote,
            version: target.version,
            binary,
            host_config,
        })
    }

    /// Most recent local version with a config for this host.
    pub fn resolve_local(&self) -> LocalLookup {
        let entries = match self.store.local_candidates(self.hostname) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Failed to list local versions: {e}");
                return LocalLookup::NotFound;
            }
        };

        for entry in entries {
            if !entry.has_binary {
                return LocalLookup::MissingBinary {
                    version: entry.version,
                    config: entry.config,
                    binary: entry.binary,
                };
            }

            let text = match std::fs::read_to_string(&entry.config) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(
                        "Failed to read local config {}: {e}",
                        entry.config.display()
                    );
                    continue;
                }
            };

            tracing::info!("Using previously downloaded version: {}", entry.version);
            return LocalLookup::Found(Selection {
                tier: Tier::Local,
                version: entry.version,
                binary: entry.binary,
                host_config: HostConfig::parse(&text),
            });
        }

        LocalLookup::NotFound
    }
}

/// The bundled binary, with its bundled config layered over `BRIDGE_MODE=n`
pub fn resolve_default(store: &VersionStore) -> Option<Selection> {
    let mut record = ConfigRecord::parse(&format!("{KEY_BRIDGE_MODE}=n"));
    let conf_path = store.default_config();
    if conf_path.is_file() {
        match std::fs::read_to_string(&conf_path) {
            Ok(text) => record.merge(ConfigRecord::parse(&text)),
            Err(e) => tracing::warn!(
                "Failed to read default config {}: {e}",
                conf_path.display()
            ),
        }
    }

    let binary = store.default_binary();
    if !binary.is_file() {
        tracing::error!("Default binary missing at {}", binary.display());
        return None;
    }

    tracing::info!("Using bundled default binary (offline fallback)");
    Some(Selection {
        tier: Tier::Default,
        version: store
            .default_dir()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        binary,
        host_config: HostConfig::from(&record),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use async_trait::async_trait;
    use std::fs;
    use tempfile::TempDir;

    struct StaticRemote {
        config: Option<&'static str>,
        artifact: Option<&'static [u8]>,
    }

    #[async_trait]
    impl RemoteSource for StaticRemote {
        async fn fetch_config(&self, _hostname: &str) -> Result<String> {
            self.config
                .map(str::to_owned)
                .ok_or_else(|| UpdaterError::Fetch("offline".to_owned()))
        }

        async fn fetch_artifact(&self, name: &str) -> Result<Vec<u8>> {
            assert_eq!(name, "azq_boss_pc_linux_x64-2.1");
            self.artifact
                .map(<[u8]>::to_vec)
                .ok_or_else(|| UpdaterError::Fetch("404".to_owned()))
        }
    }

    fn store_in(dir: &TempDir) -> VersionStore {
        let store = VersionStore::new(&RunConfig {
            base_path: dir.path().to_path_buf(),
            ..Default::default()
        });
        store.ensure_layout().unwrap();
        store
    }

    #[tokio::test]
    async fn test_remote_persists_config_and_binary() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let remote = StaticRemote {
            config: Some("AQ_BOSS_VER=2.1\nARCH=x64\n"),
            artifact: Some(b"bin"),
        };
        let resolver = VersionResolver::new(&store, Some(&remote), "azq_boss_pc_linux", "dev01");

        let selection = resolver.resolve_remote().await.unwrap();

        assert_eq!(selection.tier, Tier::Remote);
        assert_eq!(selection.version, "2.1");
        assert_eq!(selection.label(), "remote:2.1");
        assert_eq!(selection.binary, dir.path().join("2.1/azq_boss_pc"));
        assert_eq!(
            fs::read_to_string(dir.path().join("2.1/dev01.conf")).unwrap(),
            "AQ_BOSS_VER=2.1\nARCH=x64\n"
        );
    }

    #[tokio::test]
    async fn test_remote_missing_arch_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let remote = StaticRemote {
            config: Some("AQ_BOSS_VER=2.1\n"),
            artifact: Some(b"bin"),
        };
        let resolver = VersionResolver::new(&store, Some(&remote), "azq_boss_pc_linux", "dev01");

        let result = resolver.resolve_remote().await;

        assert!(matches!(result, Err(UpdaterError::MissingField("ARCH"))));
        assert!(store.versions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remote_download_failure_keeps_config() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let remote = StaticRemote {
            config: Some("AQ_BOSS_VER=2.1\nARCH=x64\n"),
            artifact: None,
        };
        let resolver = VersionResolver::new(&store, Some(&remote), "azq_boss_pc_linux", "dev01");

        assert!(resolver.resolve_remote().await.is_err());
        assert!(dir.path().join("2.1/dev01.conf").is_file());
        assert!(!dir.path().join("2.1/azq_boss_pc").exists());
    }

    #[test]
    fn test_local_picks_newest_with_binary() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        for v in ["2.0", "2.1"] {
            store
                .write_config(v, "dev01", &format!("AQ_BOSS_VER={v}\nBRIDGE_MODE=y\nDEST_IP=10.0.0.9"))
                .unwrap();
            store.write_binary(v, b"bin").unwrap();
        }
        let remote = StaticRemote {
            config: None,
            artifact: None,
        };
        let resolver = VersionResolver::new(&store, Some(&remote), "azq_boss_pc_linux", "dev01");

        let LocalLookup::Found(selection) = resolver.resolve_local() else {
            panic!("expected a local selection");
        };
        assert_eq!(selection.version, "2.1");
        assert_eq!(selection.label(), "local:2.1");
        assert_eq!(selection.host_config.dest_ip.as_deref(), Some("10.0.0.9"));
    }

    #[test]
    fn test_local_config_without_binary_is_missing_binary() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.write_config("2.0", "dev01", "AQ_BOSS_VER=2.0").unwrap();
        store.write_binary("2.0", b"bin").unwrap();
        store.write_config("2.1", "dev01", "AQ_BOSS_VER=2.1").unwrap();
        let remote = StaticRemote {
            config: None,
            artifact: None,
        };
        let resolver = VersionResolver::new(&store, Some(&remote), "azq_boss_pc_linux", "dev01");

        match resolver.resolve_local() {
            LocalLookup::MissingBinary { version, .. } => assert_eq!(version, "2.1"),
            other => panic!("expected MissingBinary, got {other:?}"),
        }
    }

    #[test]
    fn test_local_ignores_other_hosts() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.write_config("2.1", "dev02", "AQ_BOSS_VER=2.1").unwrap();
        let remote = StaticRemote {
            config: None,
            artifact: None,
        };
        let resolver = VersionResolver::new(&store, Some(&remote), "azq_boss_pc_linux", "dev01");

        assert!(matches!(resolver.resolve_local(), LocalLookup::NotFound));
    }

    #[test]
    fn test_default_uses_bundled_config() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(store.default_binary(), b"bin").unwrap();
        fs::write(store.default_config(), "BRIDGE_MODE=y\nDEST_IP=192.168.1.2\n").unwrap();
        let selection = resolve_default(&store).unwrap();
        assert_eq!(selection.tier, Tier::Default);
        assert_eq!(selection.label(), "default");
        assert!(selection.host_config.bridge_mode);
        assert_eq!(selection.host_config.dest_ip.as_deref(), Some("192.168.1.2"));
    }

    #[test]
    fn test_default_without_config_is_not_bridged() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::write(store.default_binary(), b"bin").unwrap();
        let selection = resolve_default(&store).unwrap();
        assert!(!selection.host_config.bridge_mode);
    }

    #[test]
    fn test_default_without_binary_is_none() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(resolve_default(&store).is_none());
    }

    #[tokio::test]
    async fn test_remote_without_source_is_error() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let resolver = VersionResolver::new(&store, None, "azq_boss_pc_linux", "dev01");

        assert!(matches!(
            resolver.resolve_remote().await,
            Err(UpdaterError::Fetch(_))
        ));
        assert!(store.versions().unwrap().is_empty());
    }
}
