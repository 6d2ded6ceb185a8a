//! relay.toml configuration parser.
//!
//! Every section and field is optional; a missing file section falls back
//! to the defaults that launch the arXiv MCP server behind supergateway.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub gateway: GatewayConfig,
    pub health: HealthPollConfig,
    pub proxy: ProxyConfig,
}

/// The gateway process that hosts the backend MCP server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Gateway executable, resolved through `PATH`.
    pub program: String,
    /// Stdio server command the gateway wraps.
    pub server_command: String,
    /// Local port the gateway listens on.
    pub port: u16,
    pub sse_path: String,
    pub message_path: String,
    pub health_path: String,
    /// Grace period after SIGINT before the gateway is killed.
    #[serde(with = "crate::duration::serde_str")]
    pub stop_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            program: "supergateway".to_string(),
            server_command: "uv tool run arxiv-mcp-server".to_string(),
            port: 3000,
            sse_path: "/sse".to_string(),
            message_path: "/message".to_string(),
            health_path: "/health".to_string(),
            stop_timeout: Duration::from_secs(10),
        }
    }
}

impl GatewayConfig {
    /// Fixed argument list passed to the gateway program.
    pub fn args(&self) -> Vec<String> {
        vec![
            "--stdio".to_string(),
            self.server_command.clone(),
            "--port".to_string(),
            self.port.to_string(),
            "--ssePath".to_string(),
            self.sse_path.clone(),
            "--messagePath".to_string(),
            self.message_path.clone(),
            "--healthEndpoint".to_string(),
            self.health_path.clone(),
        ]
    }

    /// `host:port` of the backend, used as the proxy's upstream.
    pub fn backend_authority(&self) -> String {
        format!("localhost:{}", self.port)
    }

    /// Full URL of the backend's health endpoint.
    pub fn health_url(&self) -> String {
        format!("http://{}{}", self.backend_authority(), self.health_path)
    }
}

/// Startup health polling budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthPollConfig {
    #[serde(with = "crate::duration::serde_str")]
    pub timeout: Duration,
    #[serde(with = "crate::duration::serde_str")]
    pub interval: Duration,
}

impl Default for HealthPollConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(30_000),
            interval: Duration::from_millis(1_000),
        }
    }
}

/// The externally facing listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub bind_address: String,
    /// Overrides the platform standby port when set.
    pub port: Option<u16>,
    /// Requests carrying this header are answered locally with `200 ok`.
    pub readiness_probe_header: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: None,
            readiness_probe_header: "x-apify-container-server-readiness-probe".to_string(),
        }
    }
}

impl RelayConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
