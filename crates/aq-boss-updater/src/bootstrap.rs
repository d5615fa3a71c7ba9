// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Install the system commands the launched binary relies on

use crate::config::Dependency;
use crate::package::PackageManager;

/// Dependencies whose command is not on `PATH`
pub fn missing_dependencies(deps: &[Dependency]) -> Vec<&Dependency> {
    deps.iter()
        .filter(|dep| which::which(&dep.command).is_err())
        .collect()
}

/// Best effort: a failed install is logged and the run continues.
pub async fn ensure_dependencies(deps: &[Dependency], packages: &dyn PackageManager) {
    let missing = missing_dependencies(deps);
    if missing.is_empty() {
        tracing::debug!("All {} dependencies present", deps.len());
        return;
    }

    let mut names: Vec<String> = missing.iter().map(|dep| dep.package.clone()).collect();
    names.dedup();
    tracing::info!("Installing missing dependencies: {}", names.join(", "));

    match packages.install_packages(&names).await {
        Ok(()) => tracing::info!("Dependencies installed"),
        Err(e) => tracing::warn!("Failed to install dependencies {}: {e}", names.join(", ")),
    }
}
