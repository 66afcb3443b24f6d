//! Filesystem layout of the device artifacts the control plane reads and writes

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// Locations of the externally owned files the control plane works with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceLayout {
    /// Desired-state service manifest (docker compose file)
    pub compose_file: PathBuf,

    /// wpa_supplicant client configuration; `None` derives it from the
    /// wireless interface name
    pub wpa_config: Option<PathBuf>,

    /// Staging path for uploaded firmware bundles
    pub bundle_file: PathBuf,

    /// SSH authorized keys store
    pub authorized_keys: PathBuf,

    /// OS release metadata
    pub os_release: PathBuf,

    /// Helper printing `<container> <port>` lines
    pub port_scan_script: PathBuf,

    /// Helper printing `<container> <update>` lines
    pub version_check_script: PathBuf,
}

impl DeviceLayout {
    pub fn compose_file(&self) -> File {
        File::new(&self.compose_file)
    }

    /// wpa_supplicant configuration for `interface`
    pub fn wpa_config_file(&self, interface: &str) -> File {
        match &self.wpa_config {
            Some(path) => File::new(path),
            None => File::new(format!(
                "/etc/wpa_supplicant/wpa_supplicant-{}.conf",
                interface
            )),
        }
    }

    pub fn bundle_file(&self) -> File {
        File::new(&self.bundle_file)
    }

    pub fn authorized_keys_file(&self) -> File {
        File::new(&self.authorized_keys)
    }

    /// Directory holding the authorized keys store
    pub fn ssh_dir(&self) -> Dir {
        self.authorized_keys_file()
            .parent()
            .unwrap_or_else(|| Dir::new("."))
    }

    pub fn os_release_file(&self) -> File {
        File::new(&self.os_release)
    }

    /// Lay out every artifact under `root`, used by tests and development
    /// setups that must not touch system paths
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            compose_file: root.join("mapio/docker-compose.yml"),
            wpa_config: Some(root.join("wpa_supplicant/wpa_supplicant-wlan0.conf")),
            bundle_file: root.join("volatile/bundle.raucb"),
            authorized_keys: root.join(".ssh/authorized_keys"),
            os_release: root.join("os-release"),
            port_scan_script: root.join("tools/docker_scan_port.sh"),
            version_check_script: root.join("tools/docker_check_versions.sh"),
        }
    }
}

impl Default for DeviceLayout {
    fn default() -> Self {
        Self {
            compose_file: PathBuf::from("/home/root/mapio/docker-compose.yml"),
            wpa_config: None,
            bundle_file: PathBuf::from("/var/volatile/bundle.raucb"),
            authorized_keys: PathBuf::from("/home/root/.ssh/authorized_keys"),
            os_release: PathBuf::from("/etc/os-release"),
            port_scan_script: PathBuf::from("/home/root/tools/docker_scan_port.sh"),
            version_check_script: PathBuf::from("/home/root/tools/docker_check_versions.sh"),
        }
    }
}
