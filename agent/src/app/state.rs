//! Application state management

use std::sync::Arc;

use tracing::info;

use crate::app::options::AppOptions;
use crate::device::orchestrator::Orchestrator;
use crate::device::state::DeviceStateMachine;
use crate::gateway::{SystemGateway, ToolGateway};

/// Main application state
pub struct AppState {
    /// Process-wide update state and mutation lock
    pub device_state: Arc<DeviceStateMachine>,

    /// Device operations
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    /// Build the state around the real system tools
    pub fn init(options: &AppOptions) -> Self {
        info!("Initializing application state...");
        let gateway: Arc<dyn ToolGateway> = Arc::new(SystemGateway::new(options.gateway.clone()));
        Self::with_gateway(gateway)
    }

    /// Build the state around an arbitrary gateway
    pub fn with_gateway(gateway: Arc<dyn ToolGateway>) -> Self {
        let device_state = Arc::new(DeviceStateMachine::new());
        let orchestrator = Arc::new(Orchestrator::new(gateway, device_state.clone()));
        Self {
            device_state,
            orchestrator,
        }
    }
}
