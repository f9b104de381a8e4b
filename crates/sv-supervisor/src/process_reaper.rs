//! Best-effort termination of stray server processes.

use crate::{SupervisorError, SupervisorResult, signal, socket_table};

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use sysinfo::{ProcessRefreshKind, System};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

const LIVENESS_POLL: Duration = Duration::from_millis(100);

/// What to reap: processes whose command line contains the pattern, and
/// whatever listens on the port.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReapMatchers {
    pub process_name_pattern: Option<String>,
    pub port: Option<u16>,
}

impl ReapMatchers {
    pub fn port(port: u16) -> Self {
        Self {
            process_name_pattern: None,
            port: Some(port),
        }
    }

    pub fn with_pattern(mut self, pattern: Option<String>) -> Self {
        self.process_name_pattern = pattern;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.process_name_pattern.is_none() && self.port.is_none()
    }
}

/// Outcome of one reap pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReapReport {
    /// Exited after the graceful signal
    pub terminated: Vec<u32>,
    /// Needed the forced kill
    pub killed: Vec<u32>,
}

impl ReapReport {
    pub fn is_empty(&self) -> bool {
        self.terminated.is_empty() && self.killed.is_empty()
    }
}

/// Terminates processes matching the target binary's name or occupying the target port.
///
/// Implementations must be idempotent: nothing matching is a trivial success.
#[async_trait]
pub trait ProcessReaper: Send + Sync {
    async fn reap(&self, matchers: &ReapMatchers) -> SupervisorResult<ReapReport>;
}

/// Reaper backed by the OS process and socket tables.
#[derive(Debug, Clone)]
pub struct SystemProcessReaper {
    grace: Duration,
}

impl SystemProcessReaper {
    pub fn new(grace: Duration) -> Self {
        Self { grace }
    }

    fn pids_by_pattern(pattern: &str) -> BTreeSet<u32> {
        // The default refresh leaves cmd() empty
        let mut system = System::new();
        system.refresh_processes_specifics(ProcessRefreshKind::everything());

        system
            .processes()
            .iter()
            .filter(|(_, process)| {
                process.name().contains(pattern) || process.cmd().join(" ").contains(pattern)
            })
            .map(|(pid, _)| pid.as_u32())
            .collect()
    }

    async fn wait_for_exit(&self, pids: &BTreeSet<u32>) -> BTreeSet<u32> {
        let deadline = Instant::now() + self.grace;
        loop {
            let alive: BTreeSet<u32> = pids
                .iter()
                .copied()
                .filter(|pid| signal::is_alive(*pid))
                .collect();

            if alive.is_empty() || Instant::now() >= deadline {
                return alive;
            }
            sleep(LIVENESS_POLL).await;
        }
    }
}

impl Default for SystemProcessReaper {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[async_trait]
impl ProcessReaper for SystemProcessReaper {
    async fn reap(&self, matchers: &ReapMatchers) -> SupervisorResult<ReapReport> {
        let mut targets = BTreeSet::new();
        let mut lookup_error = None;

        if let Some(pattern) = matchers.process_name_pattern.clone() {
            let found = tokio::task::spawn_blocking(move || Self::pids_by_pattern(&pattern))
                .await
                .map_err(|e| SupervisorError::reap_failure(format!("process scan failed: {e}")))?;
            targets.extend(found);
        }

        if let Some(port) = matchers.port {
            match socket_table::listening_pids(port).await {
                Ok(found) => targets.extend(found),
                Err(e) => lookup_error = Some(e),
            }
        }

        targets.remove(&std::process::id());

        if targets.is_empty() {
            debug!("Nothing to reap for {matchers:?}");
            return match lookup_error {
                Some(e) => Err(e),
                None => Ok(ReapReport::default()),
            };
        }

        info!("Reaping {} process(es): {targets:?}", targets.len());
        for pid in &targets {
            if let Err(e) = signal::terminate(*pid) {
                warn!("Failed to send terminate to pid {pid}: {e}");
            }
        }

        let survivors = self.wait_for_exit(&targets).await;
        let mut failed = Vec::new();
        for pid in &survivors {
            warn!("Pid {pid} ignored terminate, force killing");
            if let Err(e) = signal::force_kill(*pid) {
                failed.push(format!("pid {pid}: {e}"));
            }
        }

        if let Some(e) = lookup_error {
            warn!("Port lookup failed during reap: {e}");
        }

        if !failed.is_empty() {
            return Err(SupervisorError::reap_failure(failed.join(", ")));
        }

        Ok(ReapReport {
            terminated: targets.difference(&survivors).copied().collect(),
            killed: survivors.into_iter().collect(),
        })
    }
}
