//! System gateway tests with a scripted command runner and a temporary
//! device layout

use std::time::Duration;

use tempfile::TempDir;

use mapiod::errors::AgentError;
use mapiod::gateway::command::CommandOutput;
use mapiod::gateway::system::{Options, SystemGateway};
use mapiod::gateway::ToolGateway;
use mapiod::models::report::StepOutcome;
use mapiod::models::service::{RuntimeAction, SshKey, WifiCredential};
use mapiod::storage::layout::DeviceLayout;

use crate::support::ScriptedRunner;

fn gateway(dir: &TempDir, runner: ScriptedRunner) -> SystemGateway<ScriptedRunner> {
    let options = Options {
        layout: DeviceLayout::rooted_at(dir.path()),
        interface: "wlan0".to_string(),
        settle: Duration::ZERO,
    };
    SystemGateway::with_runner(runner, options)
}

fn manifest(dir: &TempDir) -> String {
    dir.path()
        .join("mapio/docker-compose.yml")
        .to_string_lossy()
        .into_owned()
}

// ================================== NETWORK ===================================== //

#[tokio::test]
async fn test_network_sequence_runs_in_order() {
    let dir = TempDir::new().unwrap();
    let gateway = gateway(&dir, ScriptedRunner::new());

    let report = gateway.apply_network_config().await;

    let expected = vec![
        "systemctl daemon-reload",
        "systemctl stop wpa_supplicant-ap.service",
        "systemctl enable --now wpa_supplicant.service",
        "systemctl enable wpa_supplicant@wlan0.service",
        "systemctl restart wpa_supplicant@wlan0.service",
    ];
    assert_eq!(gateway.runner().calls(), expected);
    assert!(report.is_success());
    assert_eq!(report.steps().len(), 5);
}

#[tokio::test]
async fn test_failed_network_step_does_not_abort_sequence() {
    let dir = TempDir::new().unwrap();
    let runner = ScriptedRunner::new().on(
        "systemctl stop wpa_supplicant-ap.service",
        CommandOutput::failed(5, "Unit not loaded"),
    );
    let gateway = gateway(&dir, runner);

    let report = gateway.apply_network_config().await;

    assert_eq!(gateway.runner().calls().len(), 5);
    assert_eq!(report.failures().count(), 1);
    assert!(matches!(
        report.outcome_of("systemctl stop wpa_supplicant-ap.service"),
        Some(StepOutcome::Failed(_))
    ));
    assert_eq!(
        report.outcome_of("systemctl restart wpa_supplicant@wlan0.service"),
        Some(&StepOutcome::Ok)
    );
}

#[tokio::test]
async fn test_write_network_config_replaces_file() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("wpa_supplicant")).unwrap();
    let path = dir.path().join("wpa_supplicant/wpa_supplicant-wlan0.conf");
    std::fs::write(&path, "stale").unwrap();
    let gateway = gateway(&dir, ScriptedRunner::new());

    let credential = WifiCredential {
        ssid: "Home".to_string(),
        passphrase: "password1".to_string(),
    };
    gateway.write_network_config(&credential).await.unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.starts_with("ctrl_interface=/var/run/wpa_supplicant\n"));
    assert!(contents.contains("  ssid=\"Home\"\n"));
    assert!(contents.contains("  psk=\"password1\"\n"));
    assert!(!contents.contains("stale"));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[tokio::test]
async fn test_scan_returns_sorted_unique_names() {
    let dir = TempDir::new().unwrap();
    let scan = "BSS 00:11:22:33:44:55(on wlan0)\n\
                \tSSID: Home\n\
                BSS 66:77:88:99:aa:bb(on wlan0)\n\
                \tSSID: Cafe Wifi\n\
                BSS cc:dd:ee:ff:00:11(on wlan0)\n\
                \tSSID: \n\
                BSS 22:33:44:55:66:77(on wlan0)\n\
                \tSSID: Home\n";
    let runner = ScriptedRunner::new().on("iw wlan0 scan", CommandOutput::ok(scan));
    let gateway = gateway(&dir, runner);

    let networks = gateway.scan_wifi_networks().await.unwrap();

    assert_eq!(networks, vec!["Cafe Wifi", "Home"]);
    assert_eq!(
        gateway.runner().calls(),
        vec!["ifconfig wlan0 up", "iw wlan0 scan"]
    );
}

#[tokio::test]
async fn test_scan_failure_is_an_execution_error() {
    let dir = TempDir::new().unwrap();
    let runner = ScriptedRunner::new().on("iw", CommandOutput::failed(240, "Device busy"));
    let gateway = gateway(&dir, runner);

    let result = gateway.scan_wifi_networks().await;

    assert!(matches!(
        result,
        Err(AgentError::ExecutionError {
            exit_status: Some(240),
            ..
        })
    ));
}

// ================================= SERVICES ===================================== //

#[tokio::test]
async fn test_pull_recreates_then_prunes() {
    let dir = TempDir::new().unwrap();
    let runner = ScriptedRunner::new().on(
        "docker system prune",
        CommandOutput::failed(1, "prune failed"),
    );
    let gateway = gateway(&dir, runner);

    gateway.pull_and_recreate_service("web").await.unwrap();

    let manifest = manifest(&dir);
    assert_eq!(
        gateway.runner().calls(),
        vec![
            format!("docker compose -f {} pull web", manifest),
            format!("docker compose -f {} up -d --force-recreate web", manifest),
            "docker system prune -f".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_failed_pull_skips_recreate() {
    let dir = TempDir::new().unwrap();
    let runner = ScriptedRunner::new().on("docker compose", CommandOutput::failed(1, "denied"));
    let gateway = gateway(&dir, runner);

    let result = gateway.pull_and_recreate_service("web").await;

    assert!(matches!(result, Err(AgentError::ExecutionError { .. })));
    assert_eq!(gateway.runner().calls().len(), 1);
}

#[tokio::test]
async fn test_runtime_actions_map_to_docker_subcommands() {
    let dir = TempDir::new().unwrap();
    let gateway = gateway(&dir, ScriptedRunner::new());

    gateway.runtime_action("web", RuntimeAction::Stop).await.unwrap();
    gateway.runtime_action("web", RuntimeAction::Remove).await.unwrap();

    assert_eq!(gateway.runner().calls(), vec!["docker stop web", "docker rm web"]);
}

#[tokio::test]
async fn test_desired_services_come_from_manifest() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("mapio")).unwrap();
    std::fs::write(
        dir.path().join("mapio/docker-compose.yml"),
        "services:\n  web:\n    image: registry/web:1.2\n  db:\n    image: postgres\n  build-only:\n    build: .\n",
    )
    .unwrap();
    let gateway = gateway(&dir, ScriptedRunner::new());

    let services = gateway.list_desired_services().await.unwrap();

    let summary: Vec<(&str, &str, &str)> = services
        .iter()
        .map(|s| (s.name.as_str(), s.image.as_str(), s.version.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("web", "registry/web", "1.2"),
            ("db", "postgres", "latest"),
            ("build-only", "None", "latest"),
        ]
    );
}

#[tokio::test]
async fn test_missing_manifest_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let gateway = gateway(&dir, ScriptedRunner::new());

    let result = gateway.list_desired_services().await;

    assert!(matches!(result, Err(AgentError::IoError(_))));
}

#[tokio::test]
async fn test_published_ports_use_scan_helper() {
    let dir = TempDir::new().unwrap();
    let helper = dir
        .path()
        .join("tools/docker_scan_port.sh")
        .to_string_lossy()
        .into_owned();
    let runner = ScriptedRunner::new().on(
        &helper,
        CommandOutput::ok("web 80\nweb 443\ndb 5432\n"),
    );
    let gateway = gateway(&dir, runner);

    let ports = gateway.list_published_ports().await.unwrap();

    assert_eq!(ports["web"], vec!["80", "443"]);
    assert_eq!(ports["db"], vec!["5432"]);
    assert_eq!(gateway.runner().calls(), vec![helper]);
}

#[tokio::test]
async fn test_malformed_update_output_is_an_execution_error() {
    let dir = TempDir::new().unwrap();
    let helper = dir
        .path()
        .join("tools/docker_check_versions.sh")
        .to_string_lossy()
        .into_owned();
    let runner = ScriptedRunner::new().on(&helper, CommandOutput::ok("web\n"));
    let gateway = gateway(&dir, runner);

    let result = gateway.list_update_candidates().await;

    assert!(matches!(result, Err(AgentError::ExecutionError { .. })));
}

#[tokio::test]
async fn test_logs_request_tail_and_keep_last_lines() {
    let dir = TempDir::new().unwrap();
    let runner = ScriptedRunner::new().on(
        "docker compose",
        CommandOutput::ok("web  | one\n\nweb  | two\ndb   | three\n"),
    );
    let gateway = gateway(&dir, runner);

    let lines = gateway.tail_compose_logs(2).await.unwrap();

    let data: Vec<&str> = lines.iter().map(|l| l.data.as_str()).collect();
    assert_eq!(data, vec!["web  | two", "db   | three"]);
    assert_eq!(
        gateway.runner().calls(),
        vec![format!("docker compose -f {} logs --tail=2", manifest(&dir))]
    );
}

// ================================= FIRMWARE ===================================== //

#[tokio::test]
async fn test_install_reboots_even_when_installer_fails() {
    let dir = TempDir::new().unwrap();
    let upload = dir.path().join("upload-1.raucb");
    std::fs::write(&upload, b"RAUC").unwrap();
    let runner = ScriptedRunner::new().on("rauc install", CommandOutput::failed(1, "bad bundle"));
    let gateway = gateway(&dir, runner);

    let report = gateway.install_firmware_bundle(&upload).await.unwrap();

    let bundle = dir.path().join("volatile/bundle.raucb");
    assert_eq!(std::fs::read(&bundle).unwrap(), b"RAUC");
    assert!(!upload.exists());
    assert_eq!(
        gateway.runner().calls(),
        vec![
            format!("rauc install {}", bundle.to_string_lossy()),
            "reboot".to_string(),
        ]
    );
    assert_eq!(report.failures().count(), 1);
    assert_eq!(report.outcome_of("reboot"), Some(&StepOutcome::Ok));
}

#[tokio::test]
async fn test_missing_upload_is_not_installed() {
    let dir = TempDir::new().unwrap();
    let gateway = gateway(&dir, ScriptedRunner::new());

    let result = gateway
        .install_firmware_bundle(&dir.path().join("missing.raucb"))
        .await;

    assert!(matches!(result, Err(AgentError::IoError(_))));
    assert!(gateway.runner().calls().is_empty());
}

// =================================== SSH ======================================= //

#[tokio::test]
async fn test_authorized_keys_are_appended() {
    let dir = TempDir::new().unwrap();
    let gateway = gateway(&dir, ScriptedRunner::new());

    gateway
        .append_authorized_key(&SshKey("ssh-ed25519 AAAA one@host".to_string()))
        .await
        .unwrap();
    gateway
        .append_authorized_key(&SshKey("ssh-ed25519 BBBB two@host".to_string()))
        .await
        .unwrap();

    let path = dir.path().join(".ssh/authorized_keys");
    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        contents.lines().collect::<Vec<_>>(),
        vec!["ssh-ed25519 AAAA one@host", "ssh-ed25519 BBBB two@host"]
    );

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

// ================================== VERSION ===================================== //

#[tokio::test]
async fn test_os_version_is_read_from_release_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("os-release"),
        "ID=mapio\nMAPIO_OS_VERSION_PRETTY=\"MAPIO OS 1.4.2\"\n",
    )
    .unwrap();
    let gateway = gateway(&dir, ScriptedRunner::new());

    assert_eq!(gateway.read_os_version().await.unwrap(), "MAPIO OS 1.4.2");
}
