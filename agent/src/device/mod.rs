//! Device state and orchestration

pub mod orchestrator;
pub mod state;
