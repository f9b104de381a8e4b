use std::fmt;

use serde::Serialize;

/// Why a start cycle ended in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The port could not be freed after the bounded retries
    PortUnavailable,
    /// Spawning the child failed at the OS level
    LaunchFailure,
    /// Neither the log marker nor the health endpoint signalled readiness in time
    StartupTimeout,
    /// The child exited with a nonzero status while not being stopped
    UnexpectedExit,
    /// Best-effort cleanup failed; logged, never surfaced as a state
    ReapFailure,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PortUnavailable => "port unavailable",
            Self::LaunchFailure => "launch failure",
            Self::StartupTimeout => "startup timeout",
            Self::UnexpectedExit => "unexpected exit",
            Self::ReapFailure => "reap failure",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureReason {
    pub kind: FailureKind,
    pub message: String,
    pub port: u16,
    /// Tail of the child's output at the time of failure
    pub excerpt: Vec<String>,
}

impl FailureReason {
    pub fn new(kind: FailureKind, message: impl Into<String>, port: u16) -> Self {
        Self {
            kind,
            message: message.into(),
            port,
            excerpt: Vec::new(),
        }
    }

    pub fn with_excerpt(mut self, excerpt: Vec<String>) -> Self {
        self.excerpt = excerpt;
        self
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
