//! # Connectivity Probe
//!
//! One HTTP GET against a configured target, no retry. Any response at all
//! (even an error status) means the network is up; only transport failures
//! and timeouts count as offline.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

/// Result of one connectivity check.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connectivity {
    pub online: bool,
    pub target: Option<String>,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
}

impl Connectivity {
    fn offline(target: Option<String>, error: impl Into<String>) -> Self {
        Connectivity {
            online: false,
            target,
            latency_ms: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectivityProbe {
    client: reqwest::Client,
    target: Option<String>,
    timeout: Duration,
}

impl ConnectivityProbe {
    pub fn new(target: Option<String>, timeout: Duration) -> Self {
        ConnectivityProbe {
            client: reqwest::Client::new(),
            target,
            timeout,
        }
    }

    /// A probe with nowhere to go; always reports offline.
    pub fn unconfigured() -> Self {
        Self::new(None, Duration::from_secs(5))
    }

    pub async fn check(&self) -> Connectivity {
        let Some(target) = self.target.clone() else {
            return Connectivity::offline(None, "no probe target configured");
        };

        let started = Instant::now();
        let outcome = self
            .client
            .get(&target)
            .timeout(self.timeout)
            .send()
            .await;

        match outcome {
            Ok(response) => {
                let latency_ms = started.elapsed().as_millis() as u64;
                debug!(target = %target, status = %response.status(), latency_ms, "Probe answered");
                Connectivity {
                    online: true,
                    target: Some(target),
                    latency_ms: Some(latency_ms),
                    error: None,
                }
            }
            Err(e) => {
                debug!(target = %target, error = %e, "Probe failed");
                let reason = if e.is_timeout() {
                    format!("timed out after {:?}", self.timeout)
                } else {
                    e.to_string()
                };
                Connectivity::offline(Some(target), reason)
            }
        }
    }
}
