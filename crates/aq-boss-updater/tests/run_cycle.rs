// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Run path against a real HTTP server and a real launched binary

use aq_boss_updater::connectivity::ConnectivityProbe;
use aq_boss_updater::launcher::ProcessLauncher;
use aq_boss_updater::remote::{HttpRemote, RemoteSource};
use aq_boss_updater::retry::RetryPolicy;
use aq_boss_updater::state::{RunStatus, load_last_run};
use aq_boss_updater::{
    RunConfig, RunOrchestrator, RunOutcome, Tier, UpdaterError, load_config_or_default,
};
use async_trait::async_trait;
use mockito::{Server, ServerGuard};
use std::fs;
use tempfile::TempDir;

/// Writes one argument per line into `args.txt` next to itself
const RECORDING_BINARY: &str = "#!/bin/sh\nfor a in \"$@\"; do echo \"$a\"; done > args.txt\n";

struct AlwaysOnline;

#[async_trait]
impl ConnectivityProbe for AlwaysOnline {
    async fn probe(&self) -> bool {
        true
    }
}

struct Device {
    base: TempDir,
    server: ServerGuard,
}

impl Device {
    async fn new() -> Self {
        Self {
            base: TempDir::new().unwrap(),
            server: Server::new_async().await,
        }
    }

    async fn serve(&mut self, host_config: &str, artifact: &str) {
        self.server
            .mock("GET", "/conf/dev01.conf")
            .with_status(200)
            .with_body(host_config)
            .create_async()
            .await;
        self.server
            .mock("GET", format!("/fw/{artifact}").as_str())
            .with_status(200)
            .with_body(RECORDING_BINARY)
            .create_async()
            .await;
    }

    fn config(&self) -> RunConfig {
        let mut config = RunConfig {
            base_path: self.base.path().to_path_buf(),
            config_base_url: format!("{}/conf", self.server.url()),
            artifact_base_url: format!("{}/fw", self.server.url()),
            hostname: Some("dev01".to_owned()),
            ..Default::default()
        };
        config.connectivity.retry = RetryPolicy::from_secs(0, 1);
        config
    }

    async fn run(&self) -> RunOutcome {
        let config = self.config();
        let remote = HttpRemote::new(&config).unwrap();
        RunOrchestrator::new(
            config,
            Some("dev01".to_owned()),
            Some(Box::new(remote)),
            Box::new(AlwaysOnline),
            Box::new(ProcessLauncher),
        )
        .run_cycle()
        .await
    }

    fn launch_args(&self, version: &str) -> Vec<String> {
        fs::read_to_string(self.base.path().join(version).join("args.txt"))
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }
}

fn remote_success(version: &str) -> RunOutcome {
    RunOutcome::Succeeded {
        tier: Tier::Remote,
        version: version.to_owned(),
    }
}

#[tokio::test]
async fn test_remote_config_without_bridge() {
    let mut device = Device::new().await;
    device
        .serve("AQ_BOSS_VER=2.1\nARCH=x64\n", "azq_boss_pc_linux_x64-2.1")
        .await;

    let outcome = device.run().await;

    assert_eq!(outcome, remote_success("2.1"));
    let version_dir = device.base.path().join("2.1");
    assert!(version_dir.join("azq_boss_pc").is_file());
    assert!(version_dir.join("dev01.conf").is_file());
    assert!(device.launch_args("2.1").is_empty());

    let record = load_last_run(&device.config().state_path())
        .unwrap()
        .unwrap();
    assert_eq!(record.status, RunStatus::Succeeded);
    assert_eq!(record.tier, Some(Tier::Remote));
}

#[tokio::test]
async fn test_remote_config_with_bridge() {
    let mut device = Device::new().await;
    device
        .serve(
            "AQ_BOSS_VER=2.1\nARCH=x64\nBRIDGE_MODE=y\nDEST_IP=10.0.0.5\n",
            "azq_boss_pc_linux_x64-2.1",
        )
        .await;

    let outcome = device.run().await;

    assert_eq!(outcome, remote_success("2.1"));
    assert_eq!(device.launch_args("2.1"), vec!["--bridge", "10.0.0.5"]);
}

#[tokio::test]
async fn test_bridge_without_dest_ip_runs_plain() {
    let mut device = Device::new().await;
    device
        .serve(
            "AQ_BOSS_VER=2.1\nARCH=x64\nBRIDGE_MODE=y\n",
            "azq_boss_pc_linux_x64-2.1",
        )
        .await;

    let outcome = device.run().await;

    assert_eq!(outcome, remote_success("2.1"));
    assert!(device.launch_args("2.1").is_empty());
}

#[tokio::test]
async fn test_failed_download_leaves_orphaned_config_and_aborts() {
    let mut device = Device::new().await;
    device
        .server
        .mock("GET", "/conf/dev01.conf")
        .with_status(200)
        .with_body("AQ_BOSS_VER=2.2\nARCH=x64\n")
        .create_async()
        .await;
    device
        .server
        .mock("GET", "/fw/azq_boss_pc_linux_x64-2.2")
        .with_status(404)
        .create_async()
        .await;
    let default_dir = device.base.path().join("default");
    fs::create_dir_all(&default_dir).unwrap();
    fs::write(default_dir.join("azq_boss_pc"), RECORDING_BINARY).unwrap();

    let outcome = device.run().await;

    assert!(matches!(
        outcome,
        RunOutcome::MissingBinary { ref version, .. } if version == "2.2"
    ));
    assert!(device.base.path().join("2.2/dev01.conf").is_file());
    assert!(!device.base.path().join("2.2/azq_boss_pc").exists());
    assert!(!default_dir.join("args.txt").exists());
    assert!(load_last_run(&device.config().state_path()).unwrap().is_none());
}

#[tokio::test]
async fn test_unreachable_config_server_uses_default() {
    let mut device = Device::new().await;
    device
        .server
        .mock("GET", "/conf/dev01.conf")
        .with_status(500)
        .create_async()
        .await;
    let default_dir = device.base.path().join("default");
    fs::create_dir_all(&default_dir).unwrap();
    fs::write(default_dir.join("azq_boss_pc"), RECORDING_BINARY).unwrap();
    fs::write(default_dir.join("default.conf"), "BRIDGE_MODE=y\nDEST_IP=192.168.1.9\n").unwrap();

    let outcome = device.run().await;

    assert_eq!(
        outcome,
        RunOutcome::Succeeded {
            tier: Tier::Default,
            version: "default".to_owned()
        }
    );
    assert_eq!(device.launch_args("default"), vec!["--bridge", "192.168.1.9"]);
}

#[tokio::test]
async fn test_malformed_updater_config_still_reaches_default() {
    let base = TempDir::new().unwrap();
    let config_path = base.path().join("updater.json");
    fs::write(&config_path, "{ not json").unwrap();

    let (config, error) = load_config_or_default(&config_path);
    assert!(matches!(error, Some(UpdaterError::Config(_))));

    let mut run = config.run;
    run.base_path = base.path().join("binaries");
    run.connectivity.retry = RetryPolicy::from_secs(0, 1);
    let default_dir = run.base_path.join("default");
    fs::create_dir_all(&default_dir).unwrap();
    fs::write(default_dir.join("azq_boss_pc"), RECORDING_BINARY).unwrap();

    // Hostname lookup failed as well: only the default tier is left
    let remote = HttpRemote::new(&run)
        .ok()
        .map(|r| Box::new(r) as Box<dyn RemoteSource>);
    let outcome = RunOrchestrator::new(
        run,
        None,
        remote,
        Box::new(AlwaysOnline),
        Box::new(ProcessLauncher),
    )
    .run_cycle()
    .await;

    assert_eq!(
        outcome,
        RunOutcome::Succeeded {
            tier: Tier::Default,
            version: "default".to_owned()
        }
    );
    assert!(default_dir.join("args.txt").is_file());
}
