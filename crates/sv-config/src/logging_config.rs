use crate::{DEFAULT_LOG_DIRECTORY, DEFAULT_LOG_FILE_PREFIX, DEFAULT_LOG_LEVEL, LogLevel};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    /// Directory for rotated log files, relative to the config directory
    pub dir: String,
    pub file_prefix: String,
    pub colored: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel(DEFAULT_LOG_LEVEL),
            dir: String::from(DEFAULT_LOG_DIRECTORY),
            file_prefix: String::from(DEFAULT_LOG_FILE_PREFIX),
            colored: true,
        }
    }
}
