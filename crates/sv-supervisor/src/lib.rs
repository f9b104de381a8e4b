//! Supervisor for one locally launched server process.
//!
//! The supervisor frees the listen port, launches the server binary with its
//! generated secret material, decides when it has finished starting (log
//! marker or health endpoint, whichever comes first) and tears it down again.

mod error;
mod failure_reason;
mod health_probe;
mod log_sink;
mod output;
mod port_allocator;
mod port_prober;
mod process_handle;
mod process_launcher;
mod process_reaper;
mod secret;
mod signal;
mod socket_table;
mod startup_monitor;
mod status_listener;
mod supervisor;
mod supervisor_state;

#[cfg(test)]
mod tests;

pub use error::{Result as SupervisorResult, SupervisorError};
pub use failure_reason::{FailureKind, FailureReason};
pub use health_probe::HealthProbe;
pub use log_sink::{LogSink, TracingLogSink};
pub use output::{OutputLine, OutputStream, OutputTail};
pub use port_allocator::PortAllocator;
pub use port_prober::{PortProber, TcpPortProber};
pub use process_handle::{ExitInfo, ProcessHandle};
pub use process_launcher::{CommandSpec, LaunchedProcess, ProcessLauncher};
pub use process_reaper::{ProcessReaper, ReapMatchers, ReapReport, SystemProcessReaper};
pub use secret::{Secret, generate_secret, write_secret_file};
pub use startup_monitor::{StartupMonitor, StartupOutcome};
pub use status_listener::StatusListener;
pub use supervisor::{ServerSupervisor, SupervisorBuilder};
pub use supervisor_state::SupervisorState;

pub use sv_config::ServerConfig;

/// Substring the server prints when its listen port is taken.
pub const PORT_CONFLICT_PATTERN: &str = "address already in use";
