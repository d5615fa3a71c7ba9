// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Removable-media scan for the update folder and its package

use crate::config::UsbConfig;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug)]
pub struct UpdateScanner<'a> {
    config: &'a UsbConfig,
}

impl<'a> UpdateScanner<'a> {
    pub fn new(config: &'a UsbConfig) -> Self {
        Self { config }
    }

    /// Poll the mount roots until the update folder shows up or the scan
    /// budget runs out.
    pub async fn find_update_folder(&self) -> Option<PathBuf> {
        let policy = &self.config.scan;
        tracing::info!(
            "Checkpoint 2: Scanning for '{}' folder (up to {}s, max depth {})...",
            self.config.update_folder,
            policy.max_wait.as_secs(),
            self.config.max_depth
        );

        let attempts = policy.attempts();
        let found = policy
            .run(|attempt| async move {
                let found = self.scan_once();
                if let Some(first) = found.first() {
                    tracing::info!("Found update folder(s): {found:?}");
                    return Some(first.clone());
                }
                if attempt < attempts {
                    tracing::info!(
                        "Waiting... ({attempt}/{attempts}), still looking for '{}'",
                        self.config.update_folder
                    );
                }
                None
            })
            .await;

        if found.is_none() {
            tracing::info!(
                "Timeout reached ({}s), no '{}' folder found",
                policy.max_wait.as_secs(),
                self.config.update_folder
            );
        }
        found
    }

    /// Single pass over every mount root
    pub fn scan_once(&self) -> Vec<PathBuf> {
        let mut found = Vec::new();
        for root in &self.config.mount_roots {
            if !root.is_dir() {
                continue;
            }
            tracing::debug!("Scanning under {}...", root.display());
            self.scan_root(root, &mut found);
        }
        found
    }

    fn scan_root(&self, root: &Path, found: &mut Vec<PathBuf>) {
        let mut walker = WalkDir::new(root)
            .min_depth(1)
            .max_depth(self.config.max_depth)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let at = e
                        .path()
                        .map_or_else(|| root.display().to_string(), |p| p.display().to_string());
                    if e.io_error().map(std::io::Error::kind) == Some(ErrorKind::PermissionDenied) {
                        tracing::info!("Permission denied scanning {at}, skipping");
                    } else {
                        tracing::info!("Error scanning {at}: {e}");
                    }
                    continue;
                }
            };

            if entry.file_type().is_dir() && entry.file_name() == self.config.update_folder.as_str()
            {
                found.push(entry.into_path());
                walker.skip_current_dir();
            }
        }
    }

    /// The package file inside `update_dir`, searched recursively.
    ///
    /// Matches on extension and on the configured name hint. If several
    /// files match, the first by path order wins.
    pub fn find_candidate(&self, update_dir: &Path) -> Option<PathBuf> {
        tracing::info!(
            "Checkpoint 4: Searching for {} inside {}...",
            self.config.package_extension,
            update_dir.display()
        );

        let hint = self.config.file_hint();
        let mut matches: Vec<PathBuf> = WalkDir::new(update_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::info!("Error scanning {}: {e}", update_dir.display());
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry.file_name().to_str().is_some_and(|name| {
                    name.ends_with(&self.config.package_extension) && name.contains(hint)
                })
            })
            .map(walkdir::DirEntry::into_path)
            .collect();

        if matches.is_empty() {
            tracing::info!(
                "No matching {} file found inside update folder",
                self.config.package_extension
            );
            return None;
        }
        if matches.len() > 1 {
            tracing::warn!("Several update packages found, using the first: {matches:?}");
        }

        let candidate = matches.swap_remove(0);
        tracing::info!("Found update candidate: {}", candidate.display());
        Some(candidate)
    }
}
