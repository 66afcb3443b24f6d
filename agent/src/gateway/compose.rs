//! docker / docker compose invocations for managed services

use std::path::Path;

use tracing::{debug, info, warn};

use crate::errors::AgentError;
use crate::gateway::command::CommandRunner;
use crate::models::service::RuntimeAction;

const DOCKER: &str = "docker";

/// Runs docker commands against one compose manifest
pub struct Compose<'a, R: CommandRunner + ?Sized> {
    runner: &'a R,
    manifest: String,
}

impl<'a, R: CommandRunner + ?Sized> Compose<'a, R> {
    pub fn new(runner: &'a R, manifest: &Path) -> Self {
        Self {
            runner,
            manifest: manifest.to_string_lossy().into_owned(),
        }
    }

    async fn compose(&self, args: &[&str]) -> Result<String, AgentError> {
        let mut full = vec!["compose", "-f", self.manifest.as_str()];
        full.extend_from_slice(args);
        self.runner.run_checked(DOCKER, &full).await
    }

    /// Pull the newest image of `service`
    pub async fn pull(&self, service: &str) -> Result<(), AgentError> {
        debug!("Pulling image for service: {}", service);
        self.compose(&["pull", service]).await?;
        Ok(())
    }

    /// Recreate `service` from its current image
    pub async fn force_recreate(&self, service: &str) -> Result<(), AgentError> {
        debug!("Recreating service: {}", service);
        self.compose(&["up", "-d", "--force-recreate", service]).await?;
        info!("Recreated service: {}", service);
        Ok(())
    }

    /// Remove dangling images and stopped resources; failures are only logged
    pub async fn prune(&self) {
        if let Err(e) = self.runner.run_checked(DOCKER, &["system", "prune", "-f"]).await {
            warn!("docker system prune failed: {}", e);
        }
    }

    /// Last `tail` log lines of every service
    pub async fn logs(&self, tail: usize) -> Result<String, AgentError> {
        let tail = format!("--tail={}", tail);
        self.compose(&["logs", tail.as_str()]).await
    }

    /// Lifecycle action on one container
    pub async fn container_action(
        &self,
        container: &str,
        action: RuntimeAction,
    ) -> Result<(), AgentError> {
        debug!("docker {} {}", action.subcommand(), container);
        self.runner
            .run_checked(DOCKER, &[action.subcommand(), container])
            .await?;
        Ok(())
    }

    /// `<name> <status>` for all containers, including stopped ones
    pub async fn ps_all(&self) -> Result<String, AgentError> {
        self.runner
            .run_checked(DOCKER, &["ps", "-a", "--format", "{{.Names}} {{.Status}}"])
            .await
    }
}
