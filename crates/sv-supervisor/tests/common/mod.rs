#![allow(dead_code)]

use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use error_location::ErrorLocation;
use sv_config::{SecretConfig, ServerConfig, ShutdownConfig, StartupConfig};
use sv_supervisor::{
    LogSink, PortProber, ProcessReaper, ReapMatchers, ReapReport, StatusListener,
    SupervisorError, SupervisorResult, SupervisorState,
};
use tempfile::TempDir;

pub const MARKER: &str = "Application startup complete";

/// Always reports the port free. Integration tests never touch real ports.
#[derive(Default)]
pub struct FreePortProber {
    calls: AtomicU32,
}

impl FreePortProber {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PortProber for FreePortProber {
    fn is_port_in_use(&self, _port: u16) -> SupervisorResult<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(false)
    }
}

/// Every probe fails as if the OS refused the bind test.
pub struct FailingPortProber;

impl PortProber for FailingPortProber {
    fn is_port_in_use(&self, port: u16) -> SupervisorResult<bool> {
        Err(SupervisorError::ProbeFailure {
            port,
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "bind denied"),
            location: ErrorLocation::from(Location::caller()),
        })
    }
}

#[derive(Default)]
pub struct RecordingReaper {
    requests: Mutex<Vec<ReapMatchers>>,
}

impl RecordingReaper {
    pub fn requests(&self) -> Vec<ReapMatchers> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessReaper for RecordingReaper {
    async fn reap(&self, matchers: &ReapMatchers) -> SupervisorResult<ReapReport> {
        self.requests.lock().unwrap().push(matchers.clone());
        Ok(ReapReport::default())
    }
}

#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<(SupervisorState, String)>>,
}

impl RecordingListener {
    pub fn states(&self) -> Vec<SupervisorState> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(state, _)| state.clone())
            .collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }
}

impl StatusListener for RecordingListener {
    fn on_status(&self, state: &SupervisorState, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push((state.clone(), message.to_string()));
    }
}

#[derive(Default)]
pub struct RecordingSink {
    lines: Mutex<Vec<(tracing::Level, String)>>,
}

impl RecordingSink {
    pub fn lines(&self) -> Vec<(tracing::Level, String)> {
        self.lines.lock().unwrap().clone()
    }
}

impl LogSink for RecordingSink {
    fn log(&self, level: tracing::Level, message: &str) {
        self.lines.lock().unwrap().push((level, message.to_string()));
    }
}

/// Shell-mode config running `script` as the server, secrets under `temp`.
pub fn mock_server_config(temp: &TempDir, port: u16, script: &str) -> ServerConfig {
    ServerConfig {
        port,
        command: script.to_string(),
        shell: true,
        process_name: None,
        startup: StartupConfig {
            timeout_ms: 10_000,
            health_interval_ms: 1_000,
            ..StartupConfig::default()
        },
        shutdown: ShutdownConfig {
            grace_ms: 2_000,
            reap_grace_ms: 500,
        },
        secret: SecretConfig {
            dir: Some(temp.path().join("secret")),
            ..SecretConfig::default()
        },
        ..ServerConfig::default()
    }
}

/// Shell snippet appending one line to `file` per launch.
pub fn count_launch(file: &Path) -> String {
    format!("echo launched >> '{}'", file.display())
}

pub fn launch_count(file: &PathBuf) -> usize {
    std::fs::read_to_string(file)
        .map(|contents| contents.lines().count())
        .unwrap_or(0)
}

/// Poll `condition` every 20ms for up to `timeout`.
pub async fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

pub fn process_exists(pid: u32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stderr(std::process::Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
