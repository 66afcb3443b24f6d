//! Settings file management

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::logs::LogLevel;
use crate::storage::layout::DeviceLayout;

/// Default location of the settings file
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/mapio/settings.json";

/// Control plane settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON formatted logs
    #[serde(default)]
    pub log_json: bool,

    /// Optional directory for rolling log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Wireless network configuration
    #[serde(default)]
    pub network: NetworkSettings,

    /// Device artifact locations
    #[serde(default)]
    pub layout: DeviceLayout,

    /// Number of compose log lines returned by `/logs`
    #[serde(default = "default_log_tail")]
    pub log_tail_lines: usize,
}

fn default_log_tail() -> usize {
    20
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_dir: None,
            server: ServerSettings::default(),
            network: NetworkSettings::default(),
            layout: DeviceLayout::default(),
            log_tail_lines: default_log_tail(),
        }
    }
}

impl Settings {
    /// Read settings from `path`, falling back to defaults when the file does
    /// not exist
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            warn!("Settings file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings file {:?}", path))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("parsing settings file {:?}", path))
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum accepted firmware upload in MiB
    #[serde(default = "default_max_bundle_mib")]
    pub max_bundle_mib: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_max_bundle_mib() -> usize {
    1024
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_bundle_mib: default_max_bundle_mib(),
        }
    }
}

/// Wireless network settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSettings {
    /// Wireless interface managed by wpa_supplicant
    #[serde(default = "default_interface")]
    pub interface: String,

    /// Delay between enabling wpa_supplicant and the interface service
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
}

fn default_interface() -> String {
    "wlan0".to_string()
}

fn default_settle_secs() -> u64 {
    5
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            settle_secs: default_settle_secs(),
        }
    }
}
