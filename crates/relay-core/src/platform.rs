//! Platform environment the relay runs under.
//!
//! The hosting platform tells the process how it was started and which
//! port to serve on through environment variables.

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

pub const META_ORIGIN_VAR: &str = "APIFY_META_ORIGIN";
pub const STANDBY_PORT_VAR: &str = "ACTOR_STANDBY_PORT";

/// Meta origin reported when the platform runs the relay in standby mode.
pub const STANDBY_ORIGIN: &str = "STANDBY";
pub const DEFAULT_STANDBY_PORT: u16 = 4321;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformEnv {
    pub meta_origin: Option<String>,
    pub standby_port: u16,
}

impl PlatformEnv {
    /// Read from the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read through an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let meta_origin = lookup(META_ORIGIN_VAR).filter(|v| !v.is_empty());

        let standby_port = match lookup(STANDBY_PORT_VAR).filter(|v| !v.is_empty()) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| ConfigError::Env {
                name: STANDBY_PORT_VAR,
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_STANDBY_PORT,
        };

        debug!(?meta_origin, standby_port, "platform environment loaded");
        Ok(Self {
            meta_origin,
            standby_port,
        })
    }

    /// Whether the platform started us in standby mode.
    pub fn is_standby(&self) -> bool {
        self.meta_origin.as_deref() == Some(STANDBY_ORIGIN)
    }
}
