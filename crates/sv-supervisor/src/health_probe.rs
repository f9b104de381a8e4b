//! HTTP readiness probe.

use crate::SupervisorResult;

use std::time::Duration;

use tracing::debug;

/// One GET against the server's health endpoint; any 2xx is ready.
pub struct HealthProbe {
    client: reqwest::Client,
    url: String,
}

impl HealthProbe {
    /// `timeout` bounds each request, not the whole startup.
    pub fn new(url: impl Into<String>, timeout: Duration) -> SupervisorResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(1)
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn check(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                debug!("Health check {} returned HTTP {}", self.url, resp.status());
                false
            }
            Err(e) => {
                debug!("Health check {} failed: {e}", self.url);
                false
            }
        }
    }
}
