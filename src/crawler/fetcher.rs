//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the harvester, including:
//! - Building HTTP clients with proper user agent strings
//! - Pacing requests with a minimum delay
//! - Retry logic for transient failures
//! - Error classification into `TransportFailure`

use crate::config::{FetchConfig, UserAgentConfig};
use reqwest::{Client, StatusCode};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// A network or HTTP level failure; always recoverable by skipping the page
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportFailure {
    #[error("{url}: HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{url}: request timeout")]
    Timeout { url: String },

    #[error("{url}: connection failed: {message}")]
    Connect { url: String, message: String },

    #[error("{url}: {message}")]
    Other { url: String, message: String },
}

impl TransportFailure {
    pub fn url(&self) -> &str {
        match self {
            Self::Status { url, .. }
            | Self::Timeout { url }
            | Self::Connect { url, .. }
            | Self::Other { url, .. } => url,
        }
    }

    /// Timeouts, 429 and 5xx responses are worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Status { status, .. } => {
                *status >= 500 || *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
            }
            Self::Connect { .. } | Self::Other { .. } => false,
        }
    }
}

/// Retrieves the body of a URL
///
/// The harvester only depends on this capability, so tests swap the network
/// for an in-memory page map.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, TransportFailure>> + Send;

    /// Spaces requests at least `delay` apart; fetchers without pacing ignore it
    fn raise_delay(&self, _delay: Duration) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use catalog_harvest::config::{FetchConfig, UserAgentConfig};
/// use catalog_harvest::crawler::build_http_client;
///
/// let user_agent = UserAgentConfig {
///     crawler_name: "CatalogHarvest".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&user_agent, &FetchConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    fetch: &FetchConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_secs(fetch.timeout_secs))
        .connect_timeout(Duration::from_secs(fetch.timeout_secs.min(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

#[derive(Debug)]
struct Pacer {
    delay: Duration,
    next_slot: Option<Instant>,
}

/// reqwest-backed `Fetcher` with pacing and retries
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | HTTP 2xx | Success |
/// | HTTP 429, 5xx | Retry up to `max-retries`, `retry-delay-ms` apart |
/// | Timeout | Retry up to `max-retries`, `retry-delay-ms` apart |
/// | Other HTTP status | Immediate failure |
/// | Connection refused | Immediate failure |
#[derive(Debug)]
pub struct HttpFetcher {
    client: Client,
    pacer: Mutex<Pacer>,
    max_retries: u32,
    retry_delay: Duration,
}

impl HttpFetcher {
    pub fn new(client: Client, fetch: &FetchConfig) -> Self {
        Self {
            client,
            pacer: Mutex::new(Pacer {
                delay: Duration::from_millis(fetch.request_delay_ms),
                next_slot: None,
            }),
            max_retries: fetch.max_retries,
            retry_delay: Duration::from_millis(fetch.retry_delay_ms),
        }
    }

    /// Builds the client and fetcher from configuration
    pub fn from_config(
        user_agent: &UserAgentConfig,
        fetch: &FetchConfig,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(user_agent, fetch)?, fetch))
    }

    pub async fn delay(&self) -> Duration {
        self.pacer.lock().await.delay
    }

    /// Waits for this request's slot; slots are `delay` apart
    ///
    /// A delay too large to add to the clock leaves the next slot unspaced.
    async fn pace(&self) {
        let wait_until = {
            let mut pacer = self.pacer.lock().await;
            let now = Instant::now();
            let slot = match pacer.next_slot {
                Some(next) if next > now => next,
                _ => now,
            };
            pacer.next_slot = Some(slot.checked_add(pacer.delay).unwrap_or(slot));
            slot
        };
        tokio::time::sleep_until(wait_until).await;
    }

    async fn fetch_once(&self, url: &str) -> Result<String, TransportFailure> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportFailure::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| classify_error(url, e))
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, TransportFailure>> + Send {
        async move {
            let mut attempt = 0;
            loop {
                self.pace().await;
                match self.fetch_once(url).await {
                    Ok(body) => return Ok(body),
                    Err(failure) if failure.is_retryable() && attempt < self.max_retries => {
                        attempt += 1;
                        tracing::debug!(
                            "Retrying {} ({}/{}): {}",
                            url,
                            attempt,
                            self.max_retries,
                            failure
                        );
                        tokio::time::sleep(self.retry_delay).await;
                    }
                    Err(failure) => return Err(failure),
                }
            }
        }
    }

    /// Raises the minimum spacing between requests (never lowers it)
    fn raise_delay(&self, delay: Duration) -> impl Future<Output = ()> + Send {
        async move {
            let mut pacer = self.pacer.lock().await;
            if delay > pacer.delay {
                tracing::info!("Request delay raised to {}ms", delay.as_millis());
                pacer.delay = delay;
            }
        }
    }
}

fn classify_error(url: &str, error: reqwest::Error) -> TransportFailure {
    if error.is_timeout() {
        TransportFailure::Timeout {
            url: url.to_string(),
        }
    } else if error.is_connect() {
        TransportFailure::Connect {
            url: url.to_string(),
            message: error.to_string(),
        }
    } else if let Some(status) = error.status() {
        TransportFailure::Status {
            url: url.to_string(),
            status: status.as_u16(),
        }
    } else {
        TransportFailure::Other {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}
