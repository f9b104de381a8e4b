mod launcher;
mod startup_monitor;

use crate::{PortProber, ProcessReaper, ReapMatchers, ReapReport, SupervisorResult};

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use sv_config::{SecretConfig, ServerConfig};
use tempfile::TempDir;

/// Reports the port busy for the first `busy_probes` probes, then free.
pub(crate) struct FakePortProber {
    busy_probes: u32,
    calls: AtomicU32,
}

impl FakePortProber {
    pub(crate) fn free() -> Self {
        Self::busy_for(0)
    }

    pub(crate) fn busy_for(busy_probes: u32) -> Self {
        Self {
            busy_probes,
            calls: AtomicU32::new(0),
        }
    }

    pub(crate) fn always_busy() -> Self {
        Self::busy_for(u32::MAX)
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PortProber for FakePortProber {
    fn is_port_in_use(&self, _port: u16) -> SupervisorResult<bool> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(call < self.busy_probes)
    }
}

/// Records every reap request and reaps nothing.
#[derive(Default)]
pub(crate) struct FakeProcessReaper {
    requests: Mutex<Vec<ReapMatchers>>,
}

impl FakeProcessReaper {
    pub(crate) fn requests(&self) -> Vec<ReapMatchers> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessReaper for FakeProcessReaper {
    async fn reap(&self, matchers: &ReapMatchers) -> SupervisorResult<ReapReport> {
        self.requests.lock().unwrap().push(matchers.clone());
        Ok(ReapReport::default())
    }
}

/// Shell-mode config running `script`, with the secret written under `temp`.
pub(crate) fn mock_config(temp: &TempDir, script: &str) -> ServerConfig {
    ServerConfig {
        port: 8123,
        command: script.to_string(),
        shell: true,
        process_name: None,
        secret: SecretConfig {
            dir: Some(temp.path().to_path_buf()),
            ..SecretConfig::default()
        },
        ..ServerConfig::default()
    }
}
