//! External tool gateway
//!
//! Every interaction with the operating system (systemd, wpa_supplicant,
//! docker, RAUC, the SSH key store) goes through [`ToolGateway`], so the
//! orchestration logic can be exercised against a fake.

pub mod command;
pub mod compose;
pub mod network;
pub mod system;

use std::path::Path;

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::errors::AgentError;
use crate::models::report::StepReport;
use crate::models::service::{
    DesiredService, LogLine, RuntimeAction, RuntimeEntry, SshKey, UpdateCandidate, WifiCredential,
};

pub use system::SystemGateway;

/// Named operations against the device's external tools
#[async_trait]
pub trait ToolGateway: Send + Sync {
    /// Replace the client network configuration with `credential`
    async fn write_network_config(&self, credential: &WifiCredential) -> Result<(), AgentError>;

    /// Activate the written network configuration. Every step runs even if a
    /// previous one failed.
    async fn apply_network_config(&self) -> StepReport;

    /// Names of the networks in range, sorted and de-duplicated
    async fn scan_wifi_networks(&self) -> Result<Vec<String>, AgentError>;

    /// Pull the newest image of `name`, recreate it, then prune
    async fn pull_and_recreate_service(&self, name: &str) -> Result<(), AgentError>;

    /// Recreate `name` from its current image
    async fn recreate_service(&self, name: &str) -> Result<(), AgentError>;

    /// Lifecycle action on one container
    async fn runtime_action(&self, name: &str, action: RuntimeAction) -> Result<(), AgentError>;

    /// Services of the desired-state manifest, in manifest order
    async fn list_desired_services(&self) -> Result<Vec<DesiredService>, AgentError>;

    /// All containers known to the runtime with their status text
    async fn list_runtime_status(&self) -> Result<Vec<RuntimeEntry>, AgentError>;

    /// Published ports grouped by container name
    async fn list_published_ports(&self) -> Result<IndexMap<String, Vec<String>>, AgentError>;

    /// Update availability per container
    async fn list_update_candidates(&self) -> Result<Vec<UpdateCandidate>, AgentError>;

    /// Move the uploaded bundle at `upload` to the staging path, run the
    /// installer, then reboot whatever the installer reported. Only a failure
    /// to stage the bundle is returned as an error.
    async fn install_firmware_bundle(&self, upload: &Path) -> Result<StepReport, AgentError>;

    /// Append `key` to the authorized keys store
    async fn append_authorized_key(&self, key: &SshKey) -> Result<(), AgentError>;

    /// Last `max_lines` lines of the managed services' logs
    async fn tail_compose_logs(&self, max_lines: usize) -> Result<Vec<LogLine>, AgentError>;

    /// Human readable OS version from the release metadata
    async fn read_os_version(&self) -> Result<String, AgentError>;
}
