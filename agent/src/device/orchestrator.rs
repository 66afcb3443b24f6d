//! Orchestrator: the single entry point for device operations
//!
//! Mutating operations (network apply, service actions, firmware install,
//! SSH key append) run under the state machine's mutation lock so their
//! external commands never interleave. Reads go straight to the gateway.

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::device::state::{DeviceStateMachine, InstallToken, UpdateState};
use crate::errors::AgentError;
use crate::filesys::file::File;
use crate::gateway::ToolGateway;
use crate::inventory::{InventoryMode, ServiceInventory};
use crate::models::report::StepReport;
use crate::models::service::{
    ActionScope, LogLine, ManagedService, ServiceAction, SshKey, UpdateCandidate, WifiCredential,
};

/// Default number of log lines returned by [`Orchestrator::tail_logs`]
pub const DEFAULT_LOG_TAIL: usize = 20;

pub struct Orchestrator {
    gateway: Arc<dyn ToolGateway>,
    state: Arc<DeviceStateMachine>,
    inventory: ServiceInventory,
}

impl Orchestrator {
    pub fn new(gateway: Arc<dyn ToolGateway>, state: Arc<DeviceStateMachine>) -> Self {
        let inventory = ServiceInventory::new(gateway.clone());
        Self {
            gateway,
            state,
            inventory,
        }
    }

    // ================================ READS ===================================== //

    pub fn get_status(&self) -> UpdateState {
        self.state.current_state()
    }

    pub async fn get_os_version(&self) -> Result<String, AgentError> {
        self.gateway.read_os_version().await
    }

    pub async fn scan_wifi(&self) -> Result<Vec<String>, AgentError> {
        let networks = self.gateway.scan_wifi_networks().await?;
        info!("Found {} wifi networks", networks.len());
        Ok(networks)
    }

    pub async fn list_services(
        &self,
        mode: InventoryMode,
    ) -> Result<Vec<ManagedService>, AgentError> {
        self.inventory.list(mode).await
    }

    pub async fn list_update_candidates(&self) -> Result<Vec<UpdateCandidate>, AgentError> {
        self.inventory.build_update_view().await
    }

    pub async fn tail_logs(&self, max_lines: usize) -> Result<Vec<LogLine>, AgentError> {
        self.gateway.tail_compose_logs(max_lines).await
    }

    // =============================== MUTATIONS ================================== //

    /// Write and activate client-mode wifi credentials
    pub async fn configure_wifi(
        &self,
        credential: WifiCredential,
    ) -> Result<StepReport, AgentError> {
        validate_credential(&credential)?;
        info!("Configuring wifi network {:?}", credential.ssid);

        self.state
            .with_mutation_lock(|| async {
                self.gateway.write_network_config(&credential).await?;

                let report = self.gateway.apply_network_config().await;
                if !report.is_success() {
                    warn!(
                        "Network activation finished with {} failed step(s)",
                        report.failures().count()
                    );
                }
                Ok::<_, AgentError>(report)
            })
            .await
    }

    /// Apply `action` to each of `names`, in order.
    ///
    /// Every entry is attempted: an unknown action or a failing tool call is
    /// recorded against that entry and the batch moves on.
    pub async fn apply_service_action(
        &self,
        names: &[String],
        action: &str,
        scope: ActionScope,
    ) -> Result<StepReport, AgentError> {
        let parsed = ServiceAction::parse(action, scope);
        if parsed.is_none() {
            error!("Unknown {:?} action {:?}", scope, action);
        }

        self.state
            .with_mutation_lock(|| async {
                let mut report = StepReport::new();
                for name in names {
                    let service = name.to_lowercase();
                    let step = format!("{} {}", action, service);
                    let result = match parsed {
                        None => Err(AgentError::ValidationError(format!(
                            "unknown action {:?}",
                            action
                        ))),
                        Some(_) if !is_valid_service_name(&service) => Err(
                            AgentError::ValidationError(format!("invalid service name {:?}", name)),
                        ),
                        Some(service_action) => self.run_service_action(&service, service_action).await,
                    };
                    match &result {
                        Ok(()) => info!("Service action `{}` done", step),
                        Err(e) => error!("Service action `{}` failed: {}", step, e),
                    }
                    report.record(step, result);
                }
                Ok::<_, AgentError>(report)
            })
            .await
    }

    async fn run_service_action(
        &self,
        service: &str,
        action: ServiceAction,
    ) -> Result<(), AgentError> {
        match action {
            ServiceAction::Pull => self.gateway.pull_and_recreate_service(service).await,
            ServiceAction::Create => self.gateway.recreate_service(service).await,
            ServiceAction::Runtime(action) => self.gateway.runtime_action(service, action).await,
        }
    }

    /// Start a firmware install from the bundle uploaded to `upload`. The
    /// device reboots at the end of it, so a caller normally never observes
    /// the returned token.
    pub async fn install_firmware(&self, upload: &Path) -> Result<InstallToken, AgentError> {
        if File::new(upload).size().await? == 0 {
            return Err(AgentError::ValidationError(
                "firmware bundle is empty".to_string(),
            ));
        }
        let token = self.state.begin_firmware_install()?;

        self.state
            .with_mutation_lock(|| async {
                let report = self.gateway.install_firmware_bundle(upload).await?;
                if !report.is_success() {
                    warn!("Firmware install {} reported failures: {:?}", token.id, report);
                }
                Ok::<_, AgentError>(token)
            })
            .await
    }

    /// Append a public key to the SSH authorized keys
    pub async fn add_ssh_key(&self, key: SshKey) -> Result<(), AgentError> {
        let key = SshKey(key.as_str().trim().to_string());
        if key.as_str().is_empty() {
            return Err(AgentError::ValidationError("SSH key is empty".to_string()));
        }
        if key.as_str().contains(['\n', '\r']) {
            return Err(AgentError::ValidationError(
                "SSH key must be a single line".to_string(),
            ));
        }

        self.state
            .with_mutation_lock(|| self.gateway.append_authorized_key(&key))
            .await
    }
}

fn validate_credential(credential: &WifiCredential) -> Result<(), AgentError> {
    if credential.passphrase.is_empty() {
        return Err(AgentError::ValidationError(
            "wifi passphrase is empty".to_string(),
        ));
    }
    if credential.ssid.is_empty() {
        return Err(AgentError::ValidationError("wifi SSID is empty".to_string()));
    }
    let forbidden = |s: &str| s.contains(['"', '\n', '\r']);
    if forbidden(&credential.ssid) || forbidden(&credential.passphrase) {
        return Err(AgentError::ValidationError(
            "wifi SSID and passphrase cannot contain quotes or line breaks".to_string(),
        ));
    }
    Ok(())
}

/// Service names are handed to docker as arguments and must not look like
/// options
fn is_valid_service_name(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('-') && !name.chars().any(char::is_whitespace)
}
