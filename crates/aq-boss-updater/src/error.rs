// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Error types for the updater crate

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpdaterError {
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("invalid version identifier: {0:?}")]
    InvalidVersion(String),

    #[error("{0} missing in host config")]
    MissingField(&'static str),

    #[error("package query failed: {0}")]
    PackageQuery(String),

    #[error("process error: {0}")]
    Process(String),

    #[error("lock error: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, UpdaterError>;
