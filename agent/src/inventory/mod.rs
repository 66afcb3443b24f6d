//! Service inventory: desired manifest, runtime state and published ports
//! joined into [`ManagedService`] views
//!
//! Views are rebuilt from the tools on every call and never cached.

pub mod parse;

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::errors::AgentError;
use crate::gateway::ToolGateway;
use crate::models::service::{DesiredService, ManagedService, RuntimeEntry, UpdateCandidate};

/// Frame of reference for a service listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryMode {
    /// Manifest entries joined with runtime status and ports
    Desired,
    /// Whatever the runtime currently knows about
    RuntimeOnly,
}

/// Left-join the manifest with runtime status and ports by service name.
///
/// Manifest entries without a runtime row or ports get an empty status or
/// port list.
pub fn join_desired(
    desired: Vec<DesiredService>,
    runtime: &[RuntimeEntry],
    ports: &IndexMap<String, Vec<String>>,
) -> Vec<ManagedService> {
    let status_by_name: HashMap<&str, &str> = runtime
        .iter()
        .map(|entry| (entry.name.as_str(), entry.status.as_str()))
        .collect();

    desired
        .into_iter()
        .map(|service| {
            let status = status_by_name
                .get(service.name.as_str())
                .map(|s| s.to_string())
                .unwrap_or_default();
            let ports = ports.get(&service.name).cloned().unwrap_or_default();
            ManagedService {
                name: service.name,
                image: service.image,
                version: service.version,
                status,
                ports,
            }
        })
        .collect()
}

/// Runtime rows joined with their published ports
pub fn join_runtime(
    runtime: Vec<RuntimeEntry>,
    ports: &IndexMap<String, Vec<String>>,
) -> Vec<ManagedService> {
    runtime
        .into_iter()
        .map(|entry| {
            let ports = ports.get(&entry.name).cloned().unwrap_or_default();
            ManagedService {
                name: entry.name,
                status: entry.status,
                ports,
                ..Default::default()
            }
        })
        .collect()
}

/// Builds service views from the gateway
#[derive(Clone)]
pub struct ServiceInventory {
    gateway: Arc<dyn ToolGateway>,
}

impl ServiceInventory {
    pub fn new(gateway: Arc<dyn ToolGateway>) -> Self {
        Self { gateway }
    }

    /// Manifest services with their runtime status and ports.
    ///
    /// The manifest is authoritative and its errors are returned; runtime
    /// or port queries that fail degrade to empty status / ports.
    pub async fn build_desired_vs_runtime(&self) -> Result<Vec<ManagedService>, AgentError> {
        let desired = self.gateway.list_desired_services().await?;
        let (runtime, ports) = tokio::join!(
            self.gateway.list_runtime_status(),
            self.gateway.list_published_ports()
        );
        let runtime = runtime.unwrap_or_else(|e| {
            warn!("Runtime status unavailable, reporting empty status: {}", e);
            Vec::new()
        });
        let ports = ports.unwrap_or_else(|e| {
            warn!("Published ports unavailable, reporting no ports: {}", e);
            IndexMap::new()
        });

        let services = join_desired(desired, &runtime, &ports);
        debug!("Desired services: {:?}", services);
        Ok(services)
    }

    /// What the runtime is running now, with ports
    pub async fn build_runtime_only_view(&self) -> Result<Vec<ManagedService>, AgentError> {
        let (runtime, ports) = tokio::join!(
            self.gateway.list_runtime_status(),
            self.gateway.list_published_ports()
        );
        let services = join_runtime(runtime?, &ports?);
        debug!("Runtime services: {:?}", services);
        Ok(services)
    }

    /// Update availability per container
    pub async fn build_update_view(&self) -> Result<Vec<UpdateCandidate>, AgentError> {
        self.gateway.list_update_candidates().await
    }

    pub async fn list(&self, mode: InventoryMode) -> Result<Vec<ManagedService>, AgentError> {
        match mode {
            InventoryMode::Desired => self.build_desired_vs_runtime().await,
            InventoryMode::RuntimeOnly => self.build_runtime_only_view().await,
        }
    }
}
