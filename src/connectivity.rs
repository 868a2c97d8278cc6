//! "Are we online?" oracles.
//!
//! Every implementation answers `false` when it cannot tell, so a record is
//! never sent down the online path on a guess.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait Connectivity: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Reachability probe: online when `url` answers with any HTTP status in time.
///
/// A 4xx or 5xx still proves the network path works; only transport failures
/// count as offline.
pub struct HttpProbe {
    url: String,
    http_client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_timeout(url, Duration::from_secs(3))
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            url: url.into(),
            http_client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connectivity for HttpProbe {
    async fn is_online(&self) -> bool {
        match self.http_client.head(&self.url).send().await {
            Ok(resp) => {
                tracing::trace!("[NET] probe {} answered {}", self.url, resp.status());
                true
            }
            Err(e) => {
                tracing::debug!("[NET] probe {} failed: {}", self.url, e);
                false
            }
        }
    }
}

/// Connectivity driven by someone else, e.g. OS network-change events.
#[derive(Clone)]
pub struct ConnectivityFlag {
    online: Arc<AtomicBool>,
}

impl ConnectivityFlag {
    pub fn new(online: bool) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(online)),
        }
    }

    pub fn set(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl Default for ConnectivityFlag {
    fn default() -> Self {
        Self::new(false)
    }
}

#[async_trait]
impl Connectivity for ConnectivityFlag {
    async fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// Probe up to `attempts` times, sleeping `backoff * n` between tries.
pub async fn probe_with_retries(
    oracle: &dyn Connectivity,
    attempts: u32,
    backoff: Duration,
) -> bool {
    let attempts = attempts.max(1);
    for n in 1..=attempts {
        if oracle.is_online().await {
            return true;
        }
        if n < attempts {
            tokio::time::sleep(backoff * n).await;
        }
    }
    false
}
