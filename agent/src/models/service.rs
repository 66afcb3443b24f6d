//! Managed service and device input models

use serde::{Deserialize, Serialize};

/// Tag assumed for images referenced without one
pub const DEFAULT_TAG: &str = "latest";

/// One entry of the desired-state manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredService {
    pub name: String,
    pub image: String,
    pub version: String,
}

/// One container as reported by the runtime, running or stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeEntry {
    pub name: String,
    pub status: String,
}

/// Result of the version-check helper for one container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCandidate {
    pub name: String,
    pub update: String,
}

/// A service as seen through the inventory joins
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedService {
    pub name: String,
    pub image: String,
    pub version: String,
    /// Free-form status text from the runtime, empty when unknown
    pub status: String,
    pub ports: Vec<String>,
}

/// One line of compose log output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub data: String,
}

/// Client network credentials, written to the wpa_supplicant config and
/// then dropped
#[derive(Clone, PartialEq, Eq)]
pub struct WifiCredential {
    pub ssid: String,
    pub passphrase: String,
}

impl std::fmt::Debug for WifiCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WifiCredential")
            .field("ssid", &self.ssid)
            .field("passphrase", &"<redacted>")
            .finish()
    }
}

/// SSH public key material
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshKey(pub String);

impl SshKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Lifecycle action against one container of the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeAction {
    Start,
    Stop,
    Restart,
    Remove,
}

impl RuntimeAction {
    /// docker subcommand for this action
    pub fn subcommand(&self) -> &'static str {
        match self {
            RuntimeAction::Start => "start",
            RuntimeAction::Stop => "stop",
            RuntimeAction::Restart => "restart",
            RuntimeAction::Remove => "rm",
        }
    }
}

/// Action applied to each selected service of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    /// Pull the newest image then force-recreate the service
    Pull,
    /// Force-recreate the service from the current image
    Create,
    Runtime(RuntimeAction),
}

/// Which endpoint family an action request belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionScope {
    /// Manifest driven (`pull`, `create`)
    Compose,
    /// Container driven (`start`, `stop`, `restart`, `rm`)
    Runtime,
}

impl ServiceAction {
    /// Parse a client supplied action name within `scope`
    pub fn parse(action: &str, scope: ActionScope) -> Option<Self> {
        match (scope, action) {
            (ActionScope::Compose, "pull") => Some(ServiceAction::Pull),
            (ActionScope::Compose, "create") => Some(ServiceAction::Create),
            (ActionScope::Runtime, "start") => Some(ServiceAction::Runtime(RuntimeAction::Start)),
            (ActionScope::Runtime, "stop") => Some(ServiceAction::Runtime(RuntimeAction::Stop)),
            (ActionScope::Runtime, "restart") => {
                Some(ServiceAction::Runtime(RuntimeAction::Restart))
            }
            (ActionScope::Runtime, "rm" | "remove") => {
                Some(ServiceAction::Runtime(RuntimeAction::Remove))
            }
            _ => None,
        }
    }
}
