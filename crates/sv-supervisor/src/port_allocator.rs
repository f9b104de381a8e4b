//! Guarantees a port is free before launch.

use crate::{PortProber, ProcessReaper, ReapMatchers, SupervisorError, SupervisorResult};

use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

use error_location::ErrorLocation;
use tracing::{info, warn};

/// Bounded probe → reap → backoff loop.
///
/// The port is always probed before anything is reaped, so a free port never
/// costs a process its life.
pub struct PortAllocator {
    prober: Arc<dyn PortProber>,
    reaper: Arc<dyn ProcessReaper>,
    backoff: Duration,
    process_name_pattern: Option<String>,
}

impl PortAllocator {
    pub fn new(
        prober: Arc<dyn PortProber>,
        reaper: Arc<dyn ProcessReaper>,
        backoff: Duration,
    ) -> Self {
        Self {
            prober,
            reaper,
            backoff,
            process_name_pattern: None,
        }
    }

    /// Also reap processes whose command line contains `pattern` when the port is busy.
    pub fn with_process_name_pattern(mut self, pattern: Option<String>) -> Self {
        self.process_name_pattern = pattern;
        self
    }

    /// Free `port`, reaping its owner at most `max_retries` times.
    ///
    /// `max_retries == 0` probes once and never reaps.
    pub async fn ensure_port_available(&self, port: u16, max_retries: u32) -> SupervisorResult<()> {
        for attempt in 1..=max_retries {
            if !self.prober.is_port_in_use(port)? {
                return Ok(());
            }

            warn!("Port {port} is in use, attempt {attempt} of {max_retries} to free it");

            let matchers = ReapMatchers::port(port).with_pattern(self.process_name_pattern.clone());
            match self.reaper.reap(&matchers).await {
                Ok(report) if !report.is_empty() => info!("Reaped {report:?} for port {port}"),
                Ok(_) => {}
                Err(e) => warn!("Reaping port {port} failed: {e}"),
            }

            tokio::time::sleep(self.backoff).await;
        }

        if !self.prober.is_port_in_use(port)? {
            return Ok(());
        }

        Err(SupervisorError::PortUnavailable {
            port,
            attempts: max_retries,
            location: ErrorLocation::from(Location::caller()),
        })
    }
}
