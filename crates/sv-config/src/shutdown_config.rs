use crate::{ConfigError, ConfigErrorResult, DEFAULT_REAP_GRACE_MS, DEFAULT_SHUTDOWN_GRACE_MS};

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Time the child gets to exit after the graceful terminate signal
    pub grace_ms: u64,
    /// Time stray processes get between terminate and force-kill
    pub reap_grace_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
            reap_grace_ms: DEFAULT_REAP_GRACE_MS,
        }
    }
}

impl ShutdownConfig {
    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    pub fn reap_grace(&self) -> Duration {
        Duration::from_millis(self.reap_grace_ms)
    }

    pub fn validate(&self) -> ConfigErrorResult<()> {
        if self.grace_ms > 120_000 {
            return Err(ConfigError::shutdown("grace_ms must be <= 120000"));
        }

        if self.reap_grace_ms > 60_000 {
            return Err(ConfigError::shutdown("reap_grace_ms must be <= 60000"));
        }

        Ok(())
    }
}
