//! Gateway backed by the real system tools

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use tracing::{debug, error, info, warn};

use crate::errors::AgentError;
use crate::filesys::file::File;
use crate::gateway::command::{display_command, CommandRunner, ProcessRunner};
use crate::gateway::compose::Compose;
use crate::gateway::network::{post_settle_steps, pre_settle_steps, render_wpa_config, NetworkStep};
use crate::gateway::ToolGateway;
use crate::inventory::parse::{
    extract_ssid_lines, normalize_ssids, parse_compose_manifest, parse_log_lines, parse_os_version,
    parse_port_scan, parse_runtime_status, parse_update_candidates,
};
use crate::models::report::StepReport;
use crate::models::service::{
    DesiredService, LogLine, RuntimeAction, RuntimeEntry, SshKey, UpdateCandidate, WifiCredential,
};
use crate::storage::layout::DeviceLayout;

const SYSTEMCTL: &str = "systemctl";
const IFCONFIG: &str = "ifconfig";
const IW: &str = "iw";
const RAUC: &str = "rauc";
const REBOOT: &str = "reboot";

/// Gateway options
#[derive(Debug, Clone)]
pub struct Options {
    /// Device artifact locations
    pub layout: DeviceLayout,

    /// Wireless interface
    pub interface: String,

    /// Settle interval inside the network activation sequence
    pub settle: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            layout: DeviceLayout::default(),
            interface: "wlan0".to_string(),
            settle: Duration::from_secs(5),
        }
    }
}

/// [`ToolGateway`] running the device's command line tools through a
/// [`CommandRunner`]
pub struct SystemGateway<R: CommandRunner = ProcessRunner> {
    runner: R,
    options: Options,
}

impl SystemGateway<ProcessRunner> {
    pub fn new(options: Options) -> Self {
        Self::with_runner(ProcessRunner, options)
    }
}

impl<R: CommandRunner> SystemGateway<R> {
    pub fn with_runner(runner: R, options: Options) -> Self {
        Self { runner, options }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn compose(&self) -> Compose<'_, R> {
        Compose::new(&self.runner, &self.options.layout.compose_file)
    }

    async fn run_network_steps(&self, steps: Vec<NetworkStep>, report: &mut StepReport) {
        for step in steps {
            let result = self
                .runner
                .run_checked(SYSTEMCTL, &step.arg_refs())
                .await
                .map(|_| ());
            if let Err(e) = &result {
                warn!("Network step `{}` failed: {}", step.name(), e);
            }
            report.record(step.name(), result);
        }
    }

    async fn run_helper(&self, helper: &Path) -> Result<(String, String), AgentError> {
        let program = helper.to_string_lossy().into_owned();
        let stdout = self.runner.run_checked(&program, &[]).await?;
        Ok((stdout, program))
    }
}

#[async_trait]
impl<R: CommandRunner> ToolGateway for SystemGateway<R> {
    async fn write_network_config(&self, credential: &WifiCredential) -> Result<(), AgentError> {
        let file = self.options.layout.wpa_config_file(&self.options.interface);
        info!("Writing network configuration to {:?}", file.path());
        file.write_string(&render_wpa_config(credential)).await?;
        file.set_permissions_600().await
    }

    async fn apply_network_config(&self) -> StepReport {
        let mut report = StepReport::new();
        self.run_network_steps(pre_settle_steps(), &mut report).await;

        debug!("Waiting {:?} for wpa_supplicant to settle", self.options.settle);
        tokio::time::sleep(self.options.settle).await;

        self.run_network_steps(post_settle_steps(&self.options.interface), &mut report)
            .await;
        report
    }

    async fn scan_wifi_networks(&self) -> Result<Vec<String>, AgentError> {
        let interface = self.options.interface.as_str();
        if let Err(e) = self.runner.run_checked(IFCONFIG, &[interface, "up"]).await {
            warn!("Could not bring {} up before scanning: {}", interface, e);
        }
        let output = self.runner.run_checked(IW, &[interface, "scan"]).await?;
        Ok(normalize_ssids(extract_ssid_lines(&output)))
    }

    async fn pull_and_recreate_service(&self, name: &str) -> Result<(), AgentError> {
        let compose = self.compose();
        compose.pull(name).await?;
        compose.force_recreate(name).await?;
        compose.prune().await;
        Ok(())
    }

    async fn recreate_service(&self, name: &str) -> Result<(), AgentError> {
        self.compose().force_recreate(name).await
    }

    async fn runtime_action(&self, name: &str, action: RuntimeAction) -> Result<(), AgentError> {
        self.compose().container_action(name, action).await
    }

    async fn list_desired_services(&self) -> Result<Vec<DesiredService>, AgentError> {
        let manifest = self.options.layout.compose_file().read_string().await?;
        parse_compose_manifest(&manifest)
    }

    async fn list_runtime_status(&self) -> Result<Vec<RuntimeEntry>, AgentError> {
        let output = self.compose().ps_all().await?;
        Ok(parse_runtime_status(&output))
    }

    async fn list_published_ports(&self) -> Result<IndexMap<String, Vec<String>>, AgentError> {
        let (output, program) = self.run_helper(&self.options.layout.port_scan_script).await?;
        parse_port_scan(&output, &program)
    }

    async fn list_update_candidates(&self) -> Result<Vec<UpdateCandidate>, AgentError> {
        let (output, program) = self
            .run_helper(&self.options.layout.version_check_script)
            .await?;
        parse_update_candidates(&output, &program)
    }

    async fn install_firmware_bundle(&self, upload: &Path) -> Result<StepReport, AgentError> {
        let upload = File::new(upload);
        let bundle_file = self.options.layout.bundle_file();
        let size = upload.size().await?;
        let digest = upload.sha256_hex().await?;
        info!(
            "Staging firmware bundle ({} bytes, sha256 {}) at {:?}",
            size,
            digest,
            bundle_file.path()
        );
        if let Some(dir) = bundle_file.parent() {
            dir.create().await?;
        }
        if upload.path() != bundle_file.path() {
            upload.move_to(bundle_file.path()).await?;
        }

        let mut report = StepReport::new();
        let path = bundle_file.path().to_string_lossy().into_owned();
        let install_args = ["install", path.as_str()];
        let install = self.runner.run_checked(RAUC, &install_args).await.map(|_| ());
        match &install {
            Ok(()) => info!("Firmware bundle installed"),
            Err(e) => error!("Firmware installation failed, rebooting anyway: {}", e),
        }
        report.record(display_command(RAUC, &install_args), install);

        info!("Rebooting device");
        let reboot = self.runner.run_checked(REBOOT, &[]).await.map(|_| ());
        if let Err(e) = &reboot {
            error!("Reboot request failed: {}", e);
        }
        report.record(REBOOT, reboot);
        Ok(report)
    }

    async fn append_authorized_key(&self, key: &SshKey) -> Result<(), AgentError> {
        let layout = &self.options.layout;
        layout.ssh_dir().create_private().await?;
        let keys = layout.authorized_keys_file();
        keys.append_line(key.as_str()).await?;
        keys.set_permissions_600().await?;
        info!("Appended SSH key to {:?}", keys.path());
        Ok(())
    }

    async fn tail_compose_logs(&self, max_lines: usize) -> Result<Vec<LogLine>, AgentError> {
        let output = self.compose().logs(max_lines).await?;
        Ok(parse_log_lines(&output, max_lines))
    }

    async fn read_os_version(&self) -> Result<String, AgentError> {
        let release = self.options.layout.os_release_file().read_string().await?;
        Ok(parse_os_version(&release))
    }
}
