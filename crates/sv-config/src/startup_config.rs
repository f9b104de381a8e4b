use crate::{
    ConfigError, ConfigErrorResult, DEFAULT_HEALTH_INTERVAL_MS, DEFAULT_HEALTH_PATH,
    DEFAULT_OUTPUT_TAIL_LINES, DEFAULT_STARTUP_MARKER, DEFAULT_STARTUP_TIMEOUT_MS,
    MAX_OUTPUT_TAIL_LINES,
};

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the supervisor decides that the child has finished starting.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StartupConfig {
    /// Path polled on the child's port, e.g. `/health`
    pub health_path: String,
    /// Substring in the child's output that signals readiness
    pub marker: String,
    pub timeout_ms: u64,
    pub health_interval_ms: u64,
    /// Output lines kept for failure diagnostics
    pub output_tail_lines: usize,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            health_path: String::from(DEFAULT_HEALTH_PATH),
            marker: String::from(DEFAULT_STARTUP_MARKER),
            timeout_ms: DEFAULT_STARTUP_TIMEOUT_MS,
            health_interval_ms: DEFAULT_HEALTH_INTERVAL_MS,
            output_tail_lines: DEFAULT_OUTPUT_TAIL_LINES,
        }
    }
}

impl StartupConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_millis(self.health_interval_ms)
    }

    pub fn validate(&self) -> ConfigErrorResult<()> {
        if !self.health_path.starts_with('/') {
            return Err(ConfigError::startup(format!(
                "health_path must start with '/', got {:?}",
                self.health_path
            )));
        }

        if self.marker.trim().is_empty() {
            return Err(ConfigError::startup("marker must not be empty"));
        }

        if self.timeout_ms == 0 {
            return Err(ConfigError::startup("timeout_ms must be > 0"));
        }

        if self.health_interval_ms == 0 {
            return Err(ConfigError::startup("health_interval_ms must be > 0"));
        }

        if self.output_tail_lines == 0 || self.output_tail_lines > MAX_OUTPUT_TAIL_LINES {
            return Err(ConfigError::startup(format!(
                "output_tail_lines must be between 1 and {MAX_OUTPUT_TAIL_LINES}"
            )));
        }

        Ok(())
    }
}
