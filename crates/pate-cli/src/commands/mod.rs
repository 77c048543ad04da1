//! Command implementations

pub mod config_cmd;
pub mod eval;
pub mod plugins;
