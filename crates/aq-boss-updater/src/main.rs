// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! AQ Boss updater - entry point
//!
//! `run` is invoked at boot to pick and launch a binary; `usb-update` is
//! invoked when removable media shows up.

use aq_boss_updater::bootstrap::ensure_dependencies;
use aq_boss_updater::config::DEFAULT_CONFIG_PATH;
use aq_boss_updater::connectivity::PingProbe;
use aq_boss_updater::installer::{InstallOutcome, UpdateInstaller};
use aq_boss_updater::launcher::ProcessLauncher;
use aq_boss_updater::orchestrator::resolve_hostname;
use aq_boss_updater::package::Dpkg;
use aq_boss_updater::remote::{HttpRemote, RemoteSource};
use aq_boss_updater::service::Systemctl;
use aq_boss_updater::{
    RunOrchestrator, RunOutcome, UpdaterConfig, load_config_or_default, logging,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "aq-boss-updater", version, about = "Keeps AQ Boss running the right build")]
struct Cli {
    /// Updater config file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Pick a binary (remote, local, default) and run it
    Run,
    /// Install a newer package from removable media
    UsbUpdate,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let (config, config_error) = load_config_or_default(&cli.config);
    match cli.command {
        Command::Run => logging::init(None),
        Command::UsbUpdate => logging::init(Some(&config.usb.log_file)),
    }
    if let Some(e) = config_error {
        error!("{e}, continuing with built-in defaults");
    }

    match cli.command {
        Command::Run => run(config).await,
        Command::UsbUpdate => usb_update(config).await,
    }
}

async fn run(config: UpdaterConfig) -> ExitCode {
    if !nix::unistd::geteuid().is_root() {
        error!("This must be run as root");
        return ExitCode::FAILURE;
    }

    info!("Starting AQ Boss updater");
    let run = config.run;

    ensure_dependencies(&run.dependencies, &Dpkg).await;

    let hostname = match resolve_hostname(&run) {
        Ok(hostname) => {
            info!("Hostname: {hostname}");
            Some(hostname)
        }
        Err(e) => {
            error!("Cannot determine hostname: {e}");
            None
        }
    };

    let remote = match HttpRemote::new(&run) {
        Ok(remote) => Some(Box::new(remote) as Box<dyn RemoteSource>),
        Err(e) => {
            error!("Cannot build HTTP client: {e}");
            None
        }
    };
    let probe = PingProbe::new(&run.connectivity);
    let orchestrator = RunOrchestrator::new(
        run,
        hostname,
        remote,
        Box::new(probe),
        Box::new(ProcessLauncher),
    );

    match orchestrator.run_cycle().await {
        RunOutcome::Succeeded { tier, version } => {
            info!("Cycle finished: {version} ({tier}) exited cleanly");
        }
        RunOutcome::BinaryFailed {
            tier,
            version,
            code,
        } => {
            info!("Cycle finished: {version} ({tier}) exited with {code:?}");
        }
        RunOutcome::NoRunnableVersion | RunOutcome::MissingBinary { .. } => {}
    }

    ExitCode::SUCCESS
}

async fn usb_update(config: UpdaterConfig) -> ExitCode {
    info!("Starting USB update check");
    let installer = UpdateInstaller::new(config.usb, Box::new(Dpkg), Box::new(Systemctl));

    match installer.run().await {
        Ok(InstallOutcome::Installed { version, succeeded }) => {
            info!("USB update finished: {version} installed={succeeded}");
        }
        Ok(outcome) => info!("USB update finished: {outcome:?}"),
        Err(e) => error!("USB update aborted: {e}"),
    }

    ExitCode::SUCCESS
}
