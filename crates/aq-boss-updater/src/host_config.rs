// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Per-host `KEY=VALUE` configuration
//!
//! The raw text is what gets persisted next to a binary; `HostConfig` is the
//! typed view the resolver works with.

use crate::error::{Result, UpdaterError};
use std::collections::BTreeMap;

pub const KEY_VERSION: &str = "AQ_BOSS_VER";
pub const KEY_ARCH: &str = "ARCH";
pub const KEY_BRIDGE_MODE: &str = "BRIDGE_MODE";
pub const KEY_DEST_IP: &str = "DEST_IP";

/// Parsed key/value pairs. Keys are case-sensitive, the last duplicate wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigRecord {
    entries: BTreeMap<String, String>,
}

impl ConfigRecord {
    pub fn parse(text: &str) -> Self {
        let mut entries = BTreeMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            entries.insert(key.to_owned(), value.trim().to_owned());
        }
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Overlay `other` on top of `self`
    pub fn merge(&mut self, other: ConfigRecord) {
        self.entries.extend(other.entries);
    }
}

/// What the remote tier needs to locate an artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub version: String,
    pub arch: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostConfig {
    pub version: Option<String>,
    pub arch: Option<String>,
    pub bridge_mode: bool,
    pub dest_ip: Option<String>,
}

fn non_empty(record: &ConfigRecord, key: &str) -> Option<String> {
    record
        .get(key)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

impl From<&ConfigRecord> for HostConfig {
    fn from(record: &ConfigRecord) -> Self {
        Self {
            version: non_empty(record, KEY_VERSION),
            arch: non_empty(record, KEY_ARCH),
            bridge_mode: record
                .get(KEY_BRIDGE_MODE)
                .is_some_and(|v| v.eq_ignore_ascii_case("y")),
            dest_ip: non_empty(record, KEY_DEST_IP),
        }
    }
}

impl HostConfig {
    pub fn parse(text: &str) -> Self {
        Self::from(&ConfigRecord::parse(text))
    }

    /// Version and arch, both required before the remote tier touches disk
    pub fn remote_target(&self) -> Result<RemoteTarget> {
        let version = self
            .version
            .clone()
            .ok_or(UpdaterError::MissingField(KEY_VERSION))?;
        let arch = self
            .arch
            .clone()
            .ok_or(UpdaterError::MissingField(KEY_ARCH))?;
        Ok(RemoteTarget { version, arch })
    }

    /// Arguments passed to the binary.
    ///
    /// Bridge mode without a destination is not fatal: the binary still runs,
    /// just without the bridge flag.
    pub fn launch_args(&self, bridge_flag: &str, source_label: &str) -> Vec<String> {
        if !self.bridge_mode {
            return Vec::new();
        }
        match self.dest_ip {
            Some(ref dest) => vec![bridge_flag.to_owned(), dest.clone()],
            None => {
                tracing::warn!(
                    "BRIDGE_MODE is enabled but DEST_IP missing in {source_label} config, running without bridge"
                );
                Vec::new()
            }
        }
    }
}
