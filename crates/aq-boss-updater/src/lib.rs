// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! AQ Boss updater - keeps the field appliance running the right `azq_boss_pc` build
//!
//! Two independent pipelines live here:
//! - the run path picks a binary (remote, last-known-local, bundled default) and launches it;
//! - the USB path installs a newer package found on removable media under an exclusive lock.

pub mod bootstrap;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod host_config;
pub mod installer;
pub mod launcher;
pub mod lock;
pub mod logging;
pub mod orchestrator;
pub mod package;
pub mod remote;
pub mod resolver;
pub mod retry;
pub mod scanner;
pub mod service;
pub mod state;
pub mod store;
pub mod version;

pub use config::{RunConfig, UpdaterConfig, UsbConfig, load_config, load_config_or_default};
pub use error::UpdaterError;
pub use orchestrator::{RunOrchestrator, RunOutcome, Tier};
pub use version::{is_newer, version_key};
