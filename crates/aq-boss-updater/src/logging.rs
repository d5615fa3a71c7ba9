// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Tracing setup shared by both subcommands
//!
//! Logs go to stdout. The USB path also appends to a log file so field
//! technicians can read what happened after the stick was pulled.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

pub const DEFAULT_DIRECTIVE: &str = "aq_boss_updater=info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Install the global subscriber. Calling it twice is harmless.
pub fn init(log_file: Option<&Path>) {
    let (file, file_error) = match log_file.map(open_log_file) {
        Some(Ok(file)) => (Some(file), None),
        Some(Err(e)) => (None, Some(e)),
        None => (None, None),
    };

    let file_layer = file.map(|file| {
        fmt::layer()
            .with_ansi(false)
            .with_target(false)
            .with_writer(Mutex::new(file))
    });

    let installed = tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init();

    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
    if let (Some(path), Some(e)) = (log_file, file_error) {
        tracing::warn!("Cannot open log file {}: {e}, logging to stdout only", path.display());
    }
}
