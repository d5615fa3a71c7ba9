// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Last-run record, kept next to the version tree for operators

use crate::error::{Result, UpdaterError};
use crate::resolver::Tier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    BinaryFailed,
    NoRunnableVersion,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastRun {
    pub finished_at: DateTime<Utc>,

    pub status: RunStatus,

    /// Tier that launched the binary, if any
    pub tier: Option<Tier>,

    pub version: Option<String>,

    /// Exit code reported by the binary on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    /// Removed by the pruning pass that followed the run
    #[serde(default)]
    pub pruned: Vec<String>,
}

pub fn load_last_run(path: &Path) -> Result<Option<LastRun>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| UpdaterError::Config(format!("Failed to parse {}: {e}", path.display())))
}

pub fn save_last_run(path: &Path, run: &LastRun) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    let content = serde_json::to_string_pretty(run)?;

    // Atomic write
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_record_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(load_last_run(&dir.path().join("last_run.json")).unwrap().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("last_run.json");
        let run = LastRun {
            finished_at: Utc::now(),
            status: RunStatus::BinaryFailed,
            tier: Some(Tier::Local),
            version: Some("2.0".to_owned()),
            exit_code: Some(2),
            pruned: vec!["1.8".to_owned()],
        };

        save_last_run(&path, &run).unwrap();
        let loaded = load_last_run(&path).unwrap().unwrap();

        assert_eq!(loaded.status, RunStatus::BinaryFailed);
        assert_eq!(loaded.tier, Some(Tier::Local));
        assert_eq!(loaded.exit_code, Some(2));
        assert_eq!(loaded.pruned, vec!["1.8"]);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_serialized_names() {
        let run = LastRun {
            finished_at: Utc::now(),
            status: RunStatus::NoRunnableVersion,
            tier: None,
            version: None,
            exit_code: None,
            pruned: Vec::new(),
        };
        let json = serde_json::to_string(&run).unwrap();
        assert!(json.contains("\"no_runnable_version\""));
        assert!(!json.contains("exit_code"));
    }
}
