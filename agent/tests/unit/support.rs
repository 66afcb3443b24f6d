//! Test doubles for the tool gateway and the command runner

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;

use mapiod::errors::AgentError;
use mapiod::gateway::command::{display_command, CommandOutput, CommandRunner};
use mapiod::gateway::ToolGateway;
use mapiod::models::report::StepReport;
use mapiod::models::service::{
    DesiredService, LogLine, RuntimeAction, RuntimeEntry, SshKey, UpdateCandidate, WifiCredential,
};

fn execution_error(command: &str) -> AgentError {
    AgentError::ExecutionError {
        command: command.to_string(),
        exit_status: Some(1),
        stderr: "boom".to_string(),
    }
}

// ================================ FAKE GATEWAY ================================== //

/// Gateway recording every call, with canned data and configurable failures
#[derive(Default)]
pub struct FakeGateway {
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,

    pub failing_services: HashSet<String>,
    pub desired: Vec<DesiredService>,
    pub runtime: Vec<RuntimeEntry>,
    pub ports: IndexMap<String, Vec<String>>,
    pub ports_fail: bool,
    pub candidates: Vec<UpdateCandidate>,
    pub networks: Vec<String>,
    pub logs: Vec<LogLine>,
    pub os_version: String,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Highest number of mutating calls observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    /// Record a mutating call and keep it in flight across a few yields so
    /// overlapping callers would be observed
    async fn mutate(&self, call: String) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.record(call);
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn service_result(&self, name: &str) -> Result<(), AgentError> {
        if self.failing_services.contains(name) {
            Err(execution_error(&format!("docker {}", name)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ToolGateway for FakeGateway {
    async fn write_network_config(&self, credential: &WifiCredential) -> Result<(), AgentError> {
        self.mutate(format!("write_network_config {}", credential.ssid))
            .await;
        Ok(())
    }

    async fn apply_network_config(&self) -> StepReport {
        self.mutate("apply_network_config".to_string()).await;
        let mut report = StepReport::new();
        report.record("systemctl daemon-reload", Ok::<(), AgentError>(()));
        report
    }

    async fn scan_wifi_networks(&self) -> Result<Vec<String>, AgentError> {
        self.record("scan_wifi_networks".to_string());
        Ok(self.networks.clone())
    }

    async fn pull_and_recreate_service(&self, name: &str) -> Result<(), AgentError> {
        self.mutate(format!("pull {}", name)).await;
        self.service_result(name)
    }

    async fn recreate_service(&self, name: &str) -> Result<(), AgentError> {
        self.mutate(format!("create {}", name)).await;
        self.service_result(name)
    }

    async fn runtime_action(&self, name: &str, action: RuntimeAction) -> Result<(), AgentError> {
        self.mutate(format!("{} {}", action.subcommand(), name)).await;
        self.service_result(name)
    }

    async fn list_desired_services(&self) -> Result<Vec<DesiredService>, AgentError> {
        Ok(self.desired.clone())
    }

    async fn list_runtime_status(&self) -> Result<Vec<RuntimeEntry>, AgentError> {
        Ok(self.runtime.clone())
    }

    async fn list_published_ports(&self) -> Result<IndexMap<String, Vec<String>>, AgentError> {
        if self.ports_fail {
            return Err(execution_error("docker_scan_port.sh"));
        }
        Ok(self.ports.clone())
    }

    async fn list_update_candidates(&self) -> Result<Vec<UpdateCandidate>, AgentError> {
        Ok(self.candidates.clone())
    }

    async fn install_firmware_bundle(&self, upload: &Path) -> Result<StepReport, AgentError> {
        let size = std::fs::metadata(upload)?.len();
        self.mutate(format!("install {} bytes", size)).await;
        Ok(StepReport::new())
    }

    async fn append_authorized_key(&self, key: &SshKey) -> Result<(), AgentError> {
        self.mutate(format!("append_authorized_key {}", key.as_str()))
            .await;
        Ok(())
    }

    async fn tail_compose_logs(&self, max_lines: usize) -> Result<Vec<LogLine>, AgentError> {
        self.record(format!("tail_compose_logs {}", max_lines));
        Ok(self.logs.iter().take(max_lines).cloned().collect())
    }

    async fn read_os_version(&self) -> Result<String, AgentError> {
        Ok(self.os_version.clone())
    }
}

// =============================== SCRIPTED RUNNER ================================ //

/// Command runner answering from a script keyed by command prefix
#[derive(Default)]
pub struct ScriptedRunner {
    calls: Mutex<Vec<String>>,
    script: Vec<(String, CommandOutput)>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands starting with `prefix` with `output`. The first
    /// matching entry wins; unmatched commands succeed with empty output.
    pub fn on(mut self, prefix: &str, output: CommandOutput) -> Self {
        self.script.push((prefix.to_string(), output));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, AgentError> {
        let command = display_command(program, args);
        self.calls.lock().unwrap().push(command.clone());
        let output = self
            .script
            .iter()
            .find(|(prefix, _)| command.starts_with(prefix.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_else(|| CommandOutput::ok(""));
        Ok(output)
    }
}
