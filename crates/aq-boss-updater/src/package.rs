// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Package tooling and candidate validation

use crate::error::{Result, UpdaterError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;

pub const FIELD_PACKAGE: &str = "Package";
pub const FIELD_VERSION: &str = "Version";

#[async_trait]
pub trait PackageManager: Send + Sync {
    /// Read one control field from a package archive without installing it
    async fn field(&self, archive: &Path, name: &str) -> Result<String>;

    /// Installed version of `package`, `None` when it is not installed
    async fn installed_version(&self, package: &str) -> Option<String>;

    /// Install a package archive
    async fn install(&self, archive: &Path) -> Result<()>;

    /// Install packages from the configured repositories
    async fn install_packages(&self, packages: &[String]) -> Result<()>;
}

/// dpkg / apt-get backed implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct Dpkg;

async fn output_of(program: &str, args: &[&str]) -> Result<String> {
    let output = tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| UpdaterError::Process(format!("Failed to run {program}: {e}")))?;

    if !output.status.success() {
        return Err(UpdaterError::PackageQuery(format!(
            "{program} {} exited with {}",
            args.join(" "),
            output.status
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
}

async fn run_status(program: &str, args: &[&str]) -> Result<()> {
    let status = tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .status()
        .await
        .map_err(|e| UpdaterError::Process(format!("Failed to run {program}: {e}")))?;

    if status.success() {
        Ok(())
    } else {
        Err(UpdaterError::Process(format!(
            "{program} {} exited with {status}",
            args.join(" ")
        )))
    }
}

#[async_trait]
impl PackageManager for Dpkg {
    async fn field(&self, archive: &Path, name: &str) -> Result<String> {
        let archive = archive.to_string_lossy();
        output_of("dpkg-deb", &["-f", &*archive, name]).await
    }

    async fn installed_version(&self, package: &str) -> Option<String> {
        output_of("dpkg-query", &["-W", "-f=${Version}", package])
            .await
            .ok()
            .filter(|v| !v.is_empty())
    }

    async fn install(&self, archive: &Path) -> Result<()> {
        let archive = archive.to_string_lossy();
        run_status("dpkg", &["-i", &*archive]).await
    }

    async fn install_packages(&self, packages: &[String]) -> Result<()> {
        run_status("apt-get", &["update", "-y"]).await?;
        let mut args = vec!["install", "-y"];
        args.extend(packages.iter().map(String::as_str));
        run_status("apt-get", &args).await
    }
}

/// A package found on removable media. Only valid until install time: the
/// medium may be pulled at any point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCandidate {
    pub path: PathBuf,
    pub name: String,
    pub version: String,
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("could not read {field} field from {path}: {source}")]
    Unreadable {
        field: &'static str,
        path: PathBuf,
        source: UpdaterError,
    },

    #[error("package name mismatch: expected {expected}, found {found}")]
    NameMismatch { expected: String, found: String },
}

/// Checks a candidate's declared identity before anything is installed
pub struct PackageValidator<'a> {
    packages: &'a dyn PackageManager,
    expected_name: &'a str,
}

impl std::fmt::Debug for PackageValidator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageValidator")
            .field("expected_name", &self.expected_name)
            .finish_non_exhaustive()
    }
}

impl<'a> PackageValidator<'a> {
    pub fn new(packages: &'a dyn PackageManager, expected_name: &'a str) -> Self {
        Self {
            packages,
            expected_name,
        }
    }

    pub async fn validate(
        &self,
        path: &Path,
    ) -> std::result::Result<UpdateCandidate, ValidationError> {
        let name = self.read(path, FIELD_PACKAGE).await?;
        tracing::info!("Checkpoint 5: Package name inside archive: {name}");
        if name != self.expected_name {
            return Err(ValidationError::NameMismatch {
                expected: self.expected_name.to_owned(),
                found: name,
            });
        }

        let version = self.read(path, FIELD_VERSION).await?;
        tracing::info!("Checkpoint 6: Version inside archive: {version}");

        Ok(UpdateCandidate {
            path: path.to_path_buf(),
            name,
            version,
        })
    }

    async fn read(
        &self,
        path: &Path,
        field: &'static str,
    ) -> std::result::Result<String, ValidationError> {
        self.packages
            .field(path, field)
            .await
            .map_err(|source| ValidationError::Unreadable {
                field,
                path: path.to_path_buf(),
                source,
            })
    }
}
