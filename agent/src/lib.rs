//! mapiod library
//!
//! Device-state orchestration for the MAPIO control plane: update state
//! machine, service inventory, serialized device mutations and the HTTP
//! surface exposing them.

pub mod app;
pub mod device;
pub mod errors;
pub mod filesys;
pub mod gateway;
pub mod inventory;
pub mod logs;
pub mod models;
pub mod server;
pub mod storage;
pub mod utils;
