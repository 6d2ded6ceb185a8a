//! relay-core — shared configuration for standby-relay.
//!
//! Holds the TOML configuration model (`relay.toml`), the platform
//! environment the daemon runs under, and the configuration error type.

pub mod config;
pub mod duration;
pub mod error;
pub mod platform;

pub use config::{GatewayConfig, HealthPollConfig, ProxyConfig, RelayConfig};
pub use error::{ConfigError, ConfigResult};
pub use platform::PlatformEnv;
