//! Application configuration options

use std::path::PathBuf;
use std::time::Duration;

use crate::gateway::system;
use crate::storage::settings::Settings;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Server configuration
    pub server: ServerOptions,

    /// System gateway configuration
    pub gateway: system::Options,

    /// Number of log lines served by `/logs`
    pub log_tail_lines: usize,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            server: ServerOptions::default(),
            gateway: system::Options::default(),
            log_tail_lines: 20,
        }
    }
}

impl From<&Settings> for AppOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
                max_bundle_bytes: settings.server.max_bundle_mib.saturating_mul(1024 * 1024),
                upload_dir: settings
                    .layout
                    .bundle_file()
                    .parent()
                    .map(|dir| dir.path().to_path_buf())
                    .unwrap_or_else(default_upload_dir),
            },
            gateway: system::Options {
                layout: settings.layout.clone(),
                interface: settings.network.interface.clone(),
                settle: Duration::from_secs(settings.network.settle_secs),
            },
            log_tail_lines: settings.log_tail_lines,
        }
    }
}

/// Lifecycle options
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Local HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Largest accepted request body on the firmware upload route
    pub max_bundle_bytes: usize,

    /// Directory firmware uploads are streamed into before install. Kept on
    /// the staging path's filesystem so staging is a rename.
    pub upload_dir: PathBuf,
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("/var/volatile")
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_bundle_bytes: 1024 * 1024 * 1024,
            upload_dir: default_upload_dir(),
        }
    }
}
