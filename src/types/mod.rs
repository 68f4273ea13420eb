//! Shared types: errors and configuration.

pub mod config;
pub mod errors;

pub use config::{GateConfig, HostConfig, LlmConfig, LogFormat, TimeoutConfig};
pub use errors::{Error, Result};
