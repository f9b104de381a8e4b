use crate::{ConfigError, ConfigErrorResult, DEFAULT_PORT_BACKOFF_MS, DEFAULT_PORT_MAX_RETRIES};

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounded retry loop used to free the listen port before launch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PortConfig {
    pub max_retries: u32,
    pub backoff_ms: u64,
    /// Other ports the server binary is known to grab, cleared alongside the main one
    pub extra_ports: Vec<u16>,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_PORT_MAX_RETRIES,
            backoff_ms: DEFAULT_PORT_BACKOFF_MS,
            extra_ports: Vec::new(),
        }
    }
}

impl PortConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn validate(&self, listen_port: u16) -> ConfigErrorResult<()> {
        if self.max_retries > 100 {
            return Err(ConfigError::port("max_retries must be <= 100"));
        }

        if self.extra_ports.contains(&0) {
            return Err(ConfigError::port("extra_ports must not contain 0"));
        }

        if self.extra_ports.contains(&listen_port) {
            return Err(ConfigError::port(format!(
                "extra_ports must not repeat the listen port {listen_port}"
            )));
        }

        Ok(())
    }
}
