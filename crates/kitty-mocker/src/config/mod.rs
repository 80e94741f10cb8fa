//! Configuration types for the kitty-mocker root service.

mod range;

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub use range::PortRange;

/// Configuration validation failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid port range '{0}', expected '<start>-<end>' with 1 <= start <= end <= 65535")]
    InvalidRange(String),
    #[error("host must not be empty")]
    EmptyHost,
    #[error("server port must not be 0")]
    ZeroPort,
    #[error("port range {0} only contains the server port, no mocker can be allocated")]
    NoAllocatablePorts(PortRange),
}

/// Root service configuration.
///
/// ```yaml
/// host: 127.0.0.1
/// server_port: 4000
/// mockers_ports_range: 5000-6000
/// metrics_port: 9090
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Interface both the root dispatcher and every mocker bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Fixed port of the root dispatcher
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    /// Ports handed out to new mockers
    #[serde(default)]
    pub mockers_ports_range: PortRange,
    /// Prometheus exporter port, disabled when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_port: Option<u16>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    4000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            server_port: default_server_port(),
            mockers_ports_range: PortRange::default(),
            metrics_port: None,
        }
    }
}

impl ServerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: ServerConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.server_port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        let range = self.mockers_ports_range;
        if range.len() == 1 && range.contains(self.server_port) {
            return Err(ConfigError::NoAllocatablePorts(range));
        }
        Ok(())
    }
}
