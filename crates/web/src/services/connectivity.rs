//! Connectivity probe.
//!
//! Every online-only behavior (model refresh, remote treatment lookup, cloud
//! sync) asks a [`Connectivity`] first. Results are never cached: each
//! decision point pays for a fresh probe.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

/// Answers "are we online right now?".
#[async_trait]
pub trait Connectivity: Send + Sync {
    /// Best-effort reachability check. Never fails; problems mean offline.
    async fn is_online(&self) -> bool;
}

/// Probes a fixed URL over HTTP.
///
/// Any transport error, timeout, or non-success status reports offline.
#[derive(Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    url: Url,
    timeout: Duration,
}

impl HttpProbe {
    /// Create a probe against `url` with a per-request `timeout`.
    #[must_use]
    pub fn new(client: reqwest::Client, url: Url, timeout: Duration) -> Self {
        Self {
            client,
            url,
            timeout,
        }
    }
}

#[async_trait]
impl Connectivity for HttpProbe {
    async fn is_online(&self) -> bool {
        match self
            .client
            .get(self.url.clone())
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::debug!(status = %response.status(), url = %self.url, "Probe returned non-success");
                false
            }
            Err(e) => {
                tracing::debug!(error = %e, url = %self.url, "Probe failed");
                false
            }
        }
    }
}

/// Connectivity with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct FixedConnectivity(pub bool);

#[async_trait]
impl Connectivity for FixedConnectivity {
    async fn is_online(&self) -> bool {
        self.0
    }
}

/// A probe filtered through the session's "Offline Mode" toggle.
///
/// With offline mode on, reports offline without touching the network.
pub struct SessionConnectivity<'a> {
    probe: &'a dyn Connectivity,
    offline_mode: bool,
}

impl<'a> SessionConnectivity<'a> {
    #[must_use]
    pub const fn new(probe: &'a dyn Connectivity, offline_mode: bool) -> Self {
        Self {
            probe,
            offline_mode,
        }
    }
}

#[async_trait]
impl Connectivity for SessionConnectivity<'_> {
    async fn is_online(&self) -> bool {
        if self.offline_mode {
            return false;
        }
        self.probe.is_online().await
    }
}
