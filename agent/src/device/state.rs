//! Device update state machine and the mutation lock

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::errors::AgentError;
use crate::utils::generate_uuid;

/// Firmware update state of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateState {
    /// No firmware install started in this process
    Idle,

    /// A firmware install has started; the device is expected to reboot
    Updating,
}

/// Proof of a successful `Idle -> Updating` transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallToken {
    pub id: String,
    pub started_at: DateTime<Utc>,
}

/// Owns the process-wide [`UpdateState`] and the lock serializing
/// state-changing operations.
///
/// There is no transition back to `Idle`: a successful install ends in a
/// reboot, and a failed one keeps the device `Updating` until the process
/// restarts.
#[derive(Debug, Default)]
pub struct DeviceStateMachine {
    updating: AtomicBool,
    mutation_lock: Mutex<()>,
}

impl DeviceStateMachine {
    /// Create a state machine in the `Idle` state
    pub fn new() -> Self {
        Self::default()
    }

    /// Current update state
    pub fn current_state(&self) -> UpdateState {
        if self.updating.load(Ordering::SeqCst) {
            UpdateState::Updating
        } else {
            UpdateState::Idle
        }
    }

    /// Move from `Idle` to `Updating`. Fails with
    /// [`AgentError::AlreadyUpdating`] if an install already started.
    pub fn begin_firmware_install(&self) -> Result<InstallToken, AgentError> {
        self.updating
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| AgentError::AlreadyUpdating)?;

        let token = InstallToken {
            id: generate_uuid(),
            started_at: Utc::now(),
        };
        info!("Device state: idle -> updating (install {})", token.id);
        Ok(token)
    }

    /// Run `op` while holding the mutation lock
    pub async fn with_mutation_lock<F, Fut, T>(&self, op: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.mutation_lock.lock().await;
        debug!("Mutation lock acquired");
        let result = op().await;
        debug!("Mutation lock released");
        result
    }
}
