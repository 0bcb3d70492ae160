//! Availability probing for tool providers.
//!
//! A [`Probe`] answers one question for one endpoint: is it accepting
//! requests right now? [`AvailabilityProbe`] runs it over the registry with a
//! bounded, cooperative retry loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use crate::error::Result;
use crate::registry::ProviderConfig;

/// Default timeout of a single liveness check.
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// A single liveness check.
///
/// Implementations never fail: any error collapses to `false`.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Returns `true` only if `endpoint` answered with a success status within `timeout`.
    async fn check(&self, endpoint: &Url, timeout: Duration) -> bool;
}

/// Liveness over HTTP: `GET <endpoint>`, success on any 2xx.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    /// Creates a probe with its own HTTP client.
    pub fn new() -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self { client })
    }

    /// Creates a probe sharing an existing HTTP client.
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn check(&self, endpoint: &Url, timeout: Duration) -> bool {
        match self
            .client
            .get(endpoint.clone())
            .timeout(timeout)
            .send()
            .await
        {
            Ok(response) => {
                let status = response.status();
                debug!(%endpoint, %status, "liveness check answered");
                status.is_success()
            }
            Err(e) => {
                debug!(%endpoint, error = %e, "liveness check failed");
                false
            }
        }
    }
}

/// Runs a [`Probe`] across providers.
#[derive(Clone)]
pub struct AvailabilityProbe {
    probe: Arc<dyn Probe>,
    timeout: Duration,
}

impl std::fmt::Debug for AvailabilityProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvailabilityProbe")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl AvailabilityProbe {
    /// Wraps a probe with the per-check timeout.
    #[must_use]
    pub fn new(probe: Arc<dyn Probe>, timeout: Duration) -> Self {
        Self { probe, timeout }
    }

    /// Per-check timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Checks a single provider.
    pub async fn check(&self, provider: &ProviderConfig) -> bool {
        self.probe.check(provider.probe_url(), self.timeout).await
    }

    /// Polls until every provider is reachable or the attempt budget runs out.
    ///
    /// Each round checks providers in order and stops at the first one that is
    /// down. Between failed rounds the task sleeps `retry_delay`; no sleep
    /// follows the last round. A budget of zero checks nothing and returns `false`.
    pub async fn wait_for_all(
        &self,
        providers: &[ProviderConfig],
        max_retries: u32,
        retry_delay: Duration,
    ) -> bool {
        for attempt in 1..=max_retries {
            match self.first_unreachable(providers).await {
                None => {
                    debug!(attempt, providers = providers.len(), "all providers reachable");
                    return true;
                }
                Some(provider) => {
                    warn!(
                        provider = %provider.name,
                        endpoint = %provider.probe_url(),
                        attempt,
                        max_retries,
                        "provider not reachable"
                    );
                    if attempt < max_retries {
                        tokio::time::sleep(retry_delay).await;
                    }
                }
            }
        }
        false
    }

    /// Checks every provider once and returns those that are down.
    pub async fn unreachable<'a>(&self, providers: &'a [ProviderConfig]) -> Vec<&'a ProviderConfig> {
        let mut down = Vec::new();
        for provider in providers {
            if !self.check(provider).await {
                down.push(provider);
            }
        }
        down
    }

    async fn first_unreachable<'a>(
        &self,
        providers: &'a [ProviderConfig],
    ) -> Option<&'a ProviderConfig> {
        for provider in providers {
            if !self.check(provider).await {
                return Some(provider);
            }
        }
        None
    }
}
