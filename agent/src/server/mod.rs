//! Local HTTP server

pub mod handlers;
pub mod payload;
pub mod serve;
pub mod state;
