//! Settings and device artifact layout

pub mod layout;
pub mod settings;
