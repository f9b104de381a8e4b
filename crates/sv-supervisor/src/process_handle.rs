//! Handle to the one live child process.

use std::fmt;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// How the child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    pub code: Option<i32>,
    /// Terminating signal on Unix
    pub signal: Option<i32>,
}

impl ExitInfo {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for ExitInfo {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(signal)) => write!(f, "signal {signal}"),
            (None, None) => f.write_str("unknown exit status"),
        }
    }
}

/// Live child owned by the supervisor.
///
/// The `tokio::process::Child` itself lives in the exit watcher task; the
/// handle only observes its exit through a watch channel.
pub struct ProcessHandle {
    pid: u32,
    generation: u64,
    exit_rx: watch::Receiver<Option<ExitInfo>>,
    pumps: Vec<JoinHandle<()>>,
}

impl ProcessHandle {
    pub(crate) fn new(
        pid: u32,
        generation: u64,
        exit_rx: watch::Receiver<Option<ExitInfo>>,
        pumps: Vec<JoinHandle<()>>,
    ) -> Self {
        Self {
            pid,
            generation,
            exit_rx,
            pumps,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Exit status, once the child has been reaped by its watcher.
    pub fn exit(&self) -> Option<ExitInfo> {
        *self.exit_rx.borrow()
    }

    /// Wait up to `timeout` for the child to exit. Returns whether it did.
    pub async fn wait_for_exit(&self, timeout: Duration) -> bool {
        let mut rx = self.exit_rx.clone();
        let exited = tokio::time::timeout(timeout, rx.wait_for(|exit| exit.is_some())).await;
        match exited {
            Ok(Ok(_)) => true,
            // Watcher gone without reporting; trust the last value
            Ok(Err(_)) => self.exit_rx.borrow().is_some(),
            Err(_) => false,
        }
    }

    /// Stop forwarding the child's output.
    pub(crate) fn abort_output(&mut self) {
        for pump in self.pumps.drain(..) {
            pump.abort();
        }
    }
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.pid)
            .field("generation", &self.generation)
            .field("exit", &self.exit())
            .finish()
    }
}
