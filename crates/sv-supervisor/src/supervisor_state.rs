use crate::{FailureKind, FailureReason};

use std::fmt;

use serde::Serialize;

/// Lifecycle state of the supervised server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SupervisorState {
    /// No process, nothing in flight
    Stopped,
    /// Port cleared and child spawned, waiting for a readiness signal
    Starting,
    /// A readiness signal fired
    Running,
    /// Tearing the child down
    Stopping,
    /// The last start cycle failed. The handle may still be live after a timeout.
    Failed { reason: FailureReason },
}

impl SupervisorState {
    /// `start` only does work from these states.
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Stopped | Self::Failed { .. })
    }

    /// States in which the child's output is watched for port conflicts.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Failed { reason } => Some(reason.kind),
            _ => None,
        }
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => f.write_str("stopped"),
            Self::Starting => f.write_str("starting"),
            Self::Running => f.write_str("running"),
            Self::Stopping => f.write_str("stopping"),
            Self::Failed { reason } => write!(f, "failed ({reason})"),
        }
    }
}
