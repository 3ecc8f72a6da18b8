//! Configuration Module
//!
//! Typed session configuration loaded from environment variables.

mod settings;

pub use settings::{
    ConfigError, ConnectionSettings, DEFAULT_CONFIG_URL, Environment, ProtocolSettings,
    SessionConfig, TimeoutSettings,
};
