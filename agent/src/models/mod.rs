//! Data models

pub mod report;
pub mod service;
