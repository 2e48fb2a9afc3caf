//! Domain types for the relay.

pub mod config;

pub use config::{load_config, ConfigError, NetworkConfig, RelayConfig, RelaySettings, TransportKind};
