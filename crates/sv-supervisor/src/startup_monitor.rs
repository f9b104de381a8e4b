//! Decides when the launched server has finished starting.

use crate::{HealthProbe, OutputLine, SupervisorResult};

use std::time::Duration;

use sv_config::ServerConfig;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

const MIN_PROBE_TIMEOUT: Duration = Duration::from_millis(200);

/// How a startup race ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupOutcome {
    /// The startup marker appeared in the output
    MarkerSeen,
    /// The health endpoint answered 2xx
    HealthReady,
    /// Neither signal fired within the startup timeout
    TimedOut,
    /// Stop was requested or the child exited
    Cancelled,
}

impl StartupOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::MarkerSeen | Self::HealthReady)
    }
}

/// Races the log marker against health polling, bounded by a timeout.
///
/// Whatever fires first ends the race; no probe is sent after `run` returns.
pub struct StartupMonitor {
    marker: String,
    probe: HealthProbe,
    interval: Duration,
    timeout: Duration,
}

impl StartupMonitor {
    pub fn new(
        marker: impl Into<String>,
        probe: HealthProbe,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            marker: marker.into(),
            probe,
            interval,
            timeout,
        }
    }

    pub fn from_config(config: &ServerConfig) -> SupervisorResult<Self> {
        let interval = config.startup.health_interval();
        let probe = HealthProbe::new(config.health_url(), interval.max(MIN_PROBE_TIMEOUT))?;
        Ok(Self::new(
            config.startup.marker.clone(),
            probe,
            interval,
            config.startup.timeout(),
        ))
    }

    /// Watch `lines` and poll health until one signal fires, the timeout
    /// elapses or `cancel` flips to `true` (a dropped sender also cancels).
    pub async fn run(
        &self,
        lines: &mut mpsc::UnboundedReceiver<OutputLine>,
        mut cancel: watch::Receiver<bool>,
    ) -> StartupOutcome {
        if *cancel.borrow() {
            return StartupOutcome::Cancelled;
        }

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut lines_open = true;

        loop {
            tokio::select! {
                biased;

                _ = cancelled(&mut cancel) => {
                    debug!("Startup monitor cancelled");
                    return StartupOutcome::Cancelled;
                }

                _ = &mut deadline => {
                    warn!("No startup signal within {:?}", self.timeout);
                    return StartupOutcome::TimedOut;
                }

                line = lines.recv(), if lines_open => {
                    if let Some(outcome) = self.on_line(line, &mut lines_open) {
                        return outcome;
                    }
                }

                _ = ticker.tick() => {
                    let check = self.probe.check();
                    tokio::pin!(check);

                    // Keep reading output while the request is in flight
                    loop {
                        tokio::select! {
                            biased;
                            _ = cancelled(&mut cancel) => return StartupOutcome::Cancelled,
                            _ = &mut deadline => {
                                warn!("No startup signal within {:?}", self.timeout);
                                return StartupOutcome::TimedOut;
                            }
                            line = lines.recv(), if lines_open => {
                                if let Some(outcome) = self.on_line(line, &mut lines_open) {
                                    return outcome;
                                }
                            }
                            ready = &mut check => {
                                if ready {
                                    info!("Health check passed at {}", self.probe.url());
                                    return StartupOutcome::HealthReady;
                                }
                                break;
                            }
                        }
                    }
                }
            }
        }
    }

    fn on_line(&self, line: Option<OutputLine>, lines_open: &mut bool) -> Option<StartupOutcome> {
        match line {
            Some(line) if line.text.contains(&self.marker) => {
                info!("Startup marker seen: {}", line.text);
                Some(StartupOutcome::MarkerSeen)
            }
            Some(_) => None,
            // Output closed; keep polling until exit cancels us
            None => {
                *lines_open = false;
                None
            }
        }
    }
}

async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    // Err means the sender is gone, which also ends the race
    let _ = cancel.wait_for(|cancelled| *cancelled).await;
}
