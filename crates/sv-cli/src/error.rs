use std::panic::Location;

use error_location::ErrorLocation;
use sv_config::ConfigError;
use sv_supervisor::SupervisorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {source}")]
    Config {
        #[source]
        source: ConfigError,
        location: ErrorLocation,
    },

    #[error("{source}")]
    Supervisor {
        #[source]
        source: SupervisorError,
        location: ErrorLocation,
    },

    #[error("Failed to set up logging: {message} {location}")]
    Logging {
        message: String,
        location: ErrorLocation,
    },

    #[error("Failed to register signal handlers: {source} {location}")]
    Signal {
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },

    #[error("Failed to serialize output: {source} {location}")]
    Output {
        #[source]
        source: serde_json::Error,
        location: ErrorLocation,
    },
}

impl CliError {
    #[track_caller]
    pub fn logging<S: Into<String>>(message: S) -> Self {
        Self::Logging {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Extra guidance printed under the error, if any.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Supervisor { source, .. } => Some(source.recovery_hint()),
            Self::Config { .. } => Some("Check config.toml in the config directory and SV_* variables."),
            _ => None,
        }
    }

    /// Captured server output that explains a failed start.
    pub fn excerpt(&self) -> &[String] {
        match self {
            Self::Supervisor { source, .. } => source.excerpt(),
            _ => &[],
        }
    }
}

impl From<ConfigError> for CliError {
    #[track_caller]
    fn from(source: ConfigError) -> Self {
        Self::Config {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<SupervisorError> for CliError {
    #[track_caller]
    fn from(source: SupervisorError) -> Self {
        Self::Supervisor {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<serde_json::Error> for CliError {
    #[track_caller]
    fn from(source: serde_json::Error) -> Self {
        Self::Output {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;
