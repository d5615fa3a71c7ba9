// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Configuration module for the updater
//!
//! Loaded once at startup and handed to every component by reference.

use crate::error::{Result, UpdaterError};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/aq-boss-linux/updater.json";

fn default_base_path() -> PathBuf {
    PathBuf::from("/opt/aq-boss-linux/binaries")
}

fn default_version_id() -> String {
    "default".to_owned()
}

fn default_binary_name() -> String {
    "azq_boss_pc".to_owned()
}

fn default_config_name() -> String {
    "default.conf".to_owned()
}

fn default_config_base_url() -> String {
    "https://raw.githubusercontent.com/AmulyaX/aq_boss_conf/refs/heads/main/conf".to_owned()
}

fn default_artifact_base_url() -> String {
    "https://fw.azenqos.com/boss-local".to_owned()
}

fn default_artifact_prefix() -> String {
    "azq_boss_pc_linux".to_owned()
}

fn default_10() -> u64 {
    10
}

fn default_30() -> u64 {
    30
}

fn default_bridge_flag() -> String {
    "--bridge".to_owned()
}

fn default_2() -> usize {
    2
}

fn default_state_file() -> String {
    "last_run.json".to_owned()
}

fn default_dependencies() -> Vec<Dependency> {
    vec![
        Dependency::new("adb", "adb"),
        Dependency::new("ifconfig", "net-tools"),
    ]
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdaterConfig {
    #[serde(default)]
    pub run: RunConfig,

    #[serde(default)]
    pub usb: UsbConfig,
}

/// Settings for the run path (remote / local / default tiers)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Root of the per-version directory tree
    #[serde(default = "default_base_path")]
    pub base_path: PathBuf,

    /// Reserved identifier of the bundled version directory, never pruned
    #[serde(default = "default_version_id")]
    pub default_version: String,

    /// File name of the binary inside each version directory
    #[serde(default = "default_binary_name")]
    pub binary_name: String,

    /// Config file bundled next to the default binary
    #[serde(default = "default_config_name")]
    pub default_config_name: String,

    /// `<config_base_url>/<hostname>.conf`
    #[serde(default = "default_config_base_url")]
    pub config_base_url: String,

    /// `<artifact_base_url>/<artifact_prefix>_<arch>-<version>`
    #[serde(default = "default_artifact_base_url")]
    pub artifact_base_url: String,

    #[serde(default = "default_artifact_prefix")]
    pub artifact_prefix: String,

    /// Overrides the system hostname used to key host configs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    #[serde(default = "default_10")]
    pub config_timeout_secs: u64,

    #[serde(default = "default_30")]
    pub artifact_timeout_secs: u64,

    #[serde(default)]
    pub connectivity: ConnectivityConfig,

    /// Flag placed before `DEST_IP` when bridge mode is on
    #[serde(default = "default_bridge_flag")]
    pub bridge_flag: String,

    /// Number of non-default version directories kept after a cycle
    #[serde(default = "default_2")]
    pub retain_versions: usize,

    /// Last-run record, relative to `base_path`
    #[serde(default = "default_state_file")]
    pub state_file: String,

    /// Commands the launched binary relies on
    #[serde(default = "default_dependencies")]
    pub dependencies: Vec<Dependency>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
            default_version: default_version_id(),
            binary_name: default_binary_name(),
            default_config_name: default_config_name(),
            config_base_url: default_config_base_url(),
            artifact_base_url: default_artifact_base_url(),
            artifact_prefix: default_artifact_prefix(),
            hostname: None,
            config_timeout_secs: 10,
            artifact_timeout_secs: 30,
            connectivity: ConnectivityConfig::default(),
            bridge_flag: default_bridge_flag(),
            retain_versions: 2,
            state_file: default_state_file(),
            dependencies: default_dependencies(),
        }
    }
}

impl RunConfig {
    pub fn state_path(&self) -> PathBuf {
        self.base_path.join(&self.state_file)
    }
}

fn default_ping_target() -> String {
    "8.8.8.8".to_owned()
}

fn default_probe_timeout() -> u64 {
    2
}

fn default_connectivity_retry() -> RetryPolicy {
    RetryPolicy::from_secs(60, 10)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    /// Host pinged to decide whether the remote tier is worth trying
    #[serde(default = "default_ping_target")]
    pub target: String,

    /// Upper bound for a single probe
    #[serde(default = "default_probe_timeout")]
    pub attempt_timeout_secs: u64,

    #[serde(default = "default_connectivity_retry")]
    pub retry: RetryPolicy,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            target: default_ping_target(),
            attempt_timeout_secs: 2,
            retry: default_connectivity_retry(),
        }
    }
}

/// A command checked on `PATH` and the package that provides it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub command: String,
    pub package: String,
}

impl Dependency {
    pub fn new(command: &str, package: &str) -> Self {
        Self {
            command: command.to_owned(),
            package: package.to_owned(),
        }
    }
}

fn default_package_name() -> String {
    "aq-boss-linux".to_owned()
}

fn default_package_extension() -> String {
    ".deb".to_owned()
}

fn default_service_name() -> String {
    "aq-boss-linux.service".to_owned()
}

fn default_update_folder() -> String {
    "aq_boss_update".to_owned()
}

fn default_mount_roots() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/media"),
        PathBuf::from("/mnt"),
        PathBuf::from("/run/media"),
    ]
}

fn default_3() -> usize {
    3
}

fn default_scan_retry() -> RetryPolicy {
    RetryPolicy::from_secs(60, 5)
}

fn default_lock_path() -> PathBuf {
    PathBuf::from("/tmp/aq_boss_update.lock")
}

fn default_log_file() -> PathBuf {
    PathBuf::from("/var/log/aq_boss_usb_update.log")
}

fn default_1() -> u64 {
    1
}

/// Settings for the removable-media install path
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsbConfig {
    /// Package identity a candidate must declare
    #[serde(default = "default_package_name")]
    pub package_name: String,

    /// Substring a candidate file name must contain; falls back to `package_name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_file_hint: Option<String>,

    #[serde(default = "default_package_extension")]
    pub package_extension: String,

    /// Consumer service stopped around the install
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Directory name searched for on removable media
    #[serde(default = "default_update_folder")]
    pub update_folder: String,

    #[serde(default = "default_mount_roots")]
    pub mount_roots: Vec<PathBuf>,

    /// Deepest level below a mount root at which `update_folder` may sit
    #[serde(default = "default_3")]
    pub max_depth: usize,

    #[serde(default = "default_scan_retry")]
    pub scan: RetryPolicy,

    #[serde(default = "default_lock_path")]
    pub lock_path: PathBuf,

    /// Install log, written in addition to stdout
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,

    /// Pause after stopping the service before installing
    #[serde(default = "default_1")]
    pub service_settle_secs: u64,
}

impl Default for UsbConfig {
    fn default() -> Self {
        Self {
            package_name: default_package_name(),
            package_file_hint: None,
            package_extension: default_package_extension(),
            service_name: default_service_name(),
            update_folder: default_update_folder(),
            mount_roots: default_mount_roots(),
            max_depth: 3,
            scan: default_scan_retry(),
            lock_path: default_lock_path(),
            log_file: default_log_file(),
            service_settle_secs: 1,
        }
    }
}

impl UsbConfig {
    pub fn file_hint(&self) -> &str {
        self.package_file_hint
            .as_deref()
            .unwrap_or(&self.package_name)
    }
}

/// Load the config file, falling back to defaults when it does not exist
pub fn load_config(path: &Path) -> Result<UpdaterConfig> {
    if !path.exists() {
        tracing::debug!("No config at {}, using defaults", path.display());
        return Ok(UpdaterConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| {
        UpdaterError::Config(format!("Failed to parse {}: {e}", path.display()))
    })
}

/// Like [`load_config`], but an unreadable or malformed file yields the
/// defaults too. The error comes back alongside so the caller can log it
/// once logging is set up.
pub fn load_config_or_default(path: &Path) -> (UpdaterConfig, Option<UpdaterError>) {
    match load_config(path) {
        Ok(config) => (config, None),
        Err(e) => (UpdaterConfig::default(), Some(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = UpdaterConfig::default();
        assert_eq!(
            config.run.base_path,
            PathBuf::from("/opt/aq-boss-linux/binaries")
        );
        assert_eq!(config.run.default_version, "default");
        assert_eq!(config.run.retain_versions, 2);
        assert_eq!(config.run.connectivity.retry.max_wait, Duration::from_secs(60));
        assert_eq!(config.run.connectivity.retry.interval, Duration::from_secs(10));
        assert_eq!(config.usb.scan.interval, Duration::from_secs(5));
        assert_eq!(config.usb.max_depth, 3);
        assert_eq!(config.usb.file_hint(), "aq-boss-linux");
    }

    #[test]
    fn test_empty_object_matches_default() {
        let parsed: UpdaterConfig = serde_json::from_str("{}").unwrap();
        let defaults = UpdaterConfig::default();
        assert_eq!(
            serde_json::to_value(&parsed).unwrap(),
            serde_json::to_value(&defaults).unwrap()
        );
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.usb.package_name, "aq-boss-linux");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("updater.json");
        std::fs::write(
            &path,
            r#"{
                "run": { "base_path": "/srv/boss", "hostname": "dev01" },
                "usb": { "scan": { "max_wait_secs": 30, "interval_secs": 3 } }
            }"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.run.base_path, PathBuf::from("/srv/boss"));
        assert_eq!(config.run.hostname.as_deref(), Some("dev01"));
        assert_eq!(config.run.binary_name, "azq_boss_pc");
        assert_eq!(config.usb.scan.max_wait, Duration::from_secs(30));
        assert_eq!(config.usb.scan.interval, Duration::from_secs(3));
        assert_eq!(config.usb.service_name, "aq-boss-linux.service");
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("updater.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result = load_config(&path);
        assert!(matches!(result, Err(UpdaterError::Config(_))));
    }

    #[test]
    fn test_file_hint_override() {
        let usb = UsbConfig {
            package_file_hint: Some("pkg".to_owned()),
            ..Default::default()
        };
        assert_eq!(usb.file_hint(), "pkg");
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("updater.json");
        std::fs::write(&path, "{ not json").unwrap();

        let (config, error) = load_config_or_default(&path);
        assert!(matches!(error, Some(UpdaterError::Config(_))));
        assert_eq!(config.run.binary_name, "azq_boss_pc");
        assert_eq!(config.usb.lock_path, PathBuf::from("/tmp/aq_boss_update.lock"));
    }

    #[test]
    fn test_valid_file_has_no_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("updater.json");
        std::fs::write(&path, r#"{ "run": { "retain_versions": 3 } }"#).unwrap();

        let (config, error) = load_config_or_default(&path);
        assert!(error.is_none());
        assert_eq!(config.run.retain_versions, 3);
    }
}
