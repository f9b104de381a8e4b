use crate::{FailureKind, FailureReason};

use std::panic::Location;
use std::path::PathBuf;

use error_location::ErrorLocation;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Configuration invalid: {source}")]
    ConfigInvalid {
        #[source]
        source: sv_config::ConfigError,
        location: ErrorLocation,
    },

    #[error("Failed to probe port {port}: {source} {location}")]
    ProbeFailure {
        port: u16,
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },

    #[error("Port {port} is still in use after {attempts} attempts to free it {location}")]
    PortUnavailable {
        port: u16,
        attempts: u32,
        location: ErrorLocation,
    },

    #[error("Failed to launch {command:?}: {source} {location}")]
    LaunchFailure {
        command: String,
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },

    #[error("Failed to write secret file {path}: {source} {location}")]
    SecretWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },

    #[error("Server start failed with {reason} {location}")]
    StartupFailed {
        reason: FailureReason,
        location: ErrorLocation,
    },

    #[error("Failed to reap stray processes: {message} {location}")]
    ReapFailure {
        message: String,
        location: ErrorLocation,
    },

    #[error("Startup was interrupted by a stop request {location}")]
    StartupInterrupted { location: ErrorLocation },

    #[error("HTTP client error: {source} {location}")]
    Http {
        #[source]
        source: reqwest::Error,
        location: ErrorLocation,
    },

    #[error("IO error: {source} {location}")]
    Io {
        #[source]
        source: std::io::Error,
        location: ErrorLocation,
    },
}

impl SupervisorError {
    #[track_caller]
    pub fn reap_failure<S: Into<String>>(message: S) -> Self {
        Self::ReapFailure {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Caller-facing error for a start cycle that ended in `Failed`.
    #[track_caller]
    pub fn startup_failed(reason: FailureReason) -> Self {
        Self::StartupFailed {
            reason,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Failure category reported through `SupervisorState::Failed`.
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            Self::ProbeFailure { .. } | Self::PortUnavailable { .. } => {
                Some(FailureKind::PortUnavailable)
            }
            Self::LaunchFailure { .. } | Self::SecretWrite { .. } => {
                Some(FailureKind::LaunchFailure)
            }
            Self::StartupFailed { reason, .. } => Some(reason.kind),
            Self::ReapFailure { .. } => Some(FailureKind::ReapFailure),
            _ => None,
        }
    }

    /// Tail of the child's output captured before the failure, if any.
    pub fn excerpt(&self) -> &[String] {
        match self {
            Self::StartupFailed { reason, .. } => &reason.excerpt,
            _ => &[],
        }
    }

    /// Whether this error is recoverable via retry
    pub fn is_transient(&self) -> bool {
        match self {
            Self::StartupFailed { reason, .. } => matches!(
                reason.kind,
                FailureKind::PortUnavailable | FailureKind::StartupTimeout
            ),
            _ => matches!(
                self,
                Self::PortUnavailable { .. } | Self::Http { .. } | Self::ReapFailure { .. }
            ),
        }
    }

    pub fn recovery_hint(&self) -> &'static str {
        match self {
            Self::ConfigInvalid { .. } => {
                "The server configuration has invalid settings. \
                   Check the logs for the offending field."
            }
            Self::ProbeFailure { .. } => {
                "The port could not be probed. \
                   Check that the port is unprivileged and permitted on this machine."
            }
            Self::PortUnavailable { .. } => {
                "Another application is holding the server port. \
                   Close it or choose a different port."
            }
            Self::LaunchFailure { .. } => {
                "The server binary could not be started. \
                   Check the command and working directory settings."
            }
            Self::SecretWrite { .. } => {
                "Unable to write the server secret file. \
                   Check permissions on the server config directory."
            }
            Self::StartupFailed { reason, .. } => match reason.kind {
                FailureKind::PortUnavailable => {
                    "Another application is holding the server port. \
                       Close it or choose a different port."
                }
                FailureKind::LaunchFailure => {
                    "The server binary could not be started. \
                       Check the command and working directory settings."
                }
                FailureKind::StartupTimeout => {
                    "The server is taking too long to start. \
                       It is still running; stop it or wait and check the logs."
                }
                FailureKind::UnexpectedExit => {
                    "The server exited on its own. \
                       The captured output usually explains why."
                }
                FailureKind::ReapFailure => {
                    "Stray server processes could not be cleaned up. \
                       Check for leftover processes holding the port."
                }
            },
            _ => "An unexpected error occurred. Please check the logs for details.",
        }
    }
}

impl From<std::io::Error> for SupervisorError {
    #[track_caller]
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<reqwest::Error> for SupervisorError {
    #[track_caller]
    fn from(source: reqwest::Error) -> Self {
        Self::Http {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<sv_config::ConfigError> for SupervisorError {
    #[track_caller]
    fn from(source: sv_config::ConfigError) -> Self {
        Self::ConfigInvalid {
            source,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
