//! HTTP fetch with retry.
//!
//! ### URL Handling
//! - `extract_urls` finds candidate links in free text.
//! - `canonicalize` trims, defaults the scheme, lowercases the host and drops fragments.
//! - `normalize` builds cache keys on top of `canonicalize`.
//! - `DomainFilter` applies the configured allow/block lists.
//!
//! ### Fetching
//! - Hosts resolving to private or reserved addresses are refused unless
//!   `allow_private_hosts` is set (see [`ssrf`]).
//! - Max redirects: 5
//! - Max body bytes: 5MB
//! - Failed attempts are retried `retry_count` times, `retry_delay` apart.

pub mod domains;
pub mod ssrf;
pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use reqwest::{Client, StatusCode, header};
use std::time::{Duration, Instant};

pub use domains::DomainFilter;
pub use ssrf::is_private_or_reserved;
pub use url::{UrlError, canonicalize, extract_urls, is_valid_url, normalize};

use linkdigest_core::config::NetworkConfig;
use linkdigest_core::{Error, PageFetcher};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "linkdigest/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 30s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Extra attempts after a failure (default: 3)
    pub retry_count: u32,

    /// Pause between attempts (default: 2s)
    pub retry_delay: Duration,

    /// Skip the private address check (default: false)
    pub allow_private_hosts: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "linkdigest/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(30_000),
            max_redirects: 5,
            retry_count: 3,
            retry_delay: Duration::from_secs(2),
            allow_private_hosts: false,
        }
    }
}

impl From<&NetworkConfig> for FetchConfig {
    fn from(network: &NetworkConfig) -> Self {
        Self {
            user_agent: network.user_agent.clone(),
            timeout: network.timeout(),
            retry_count: network.retry_count,
            retry_delay: network.retry_delay(),
            allow_private_hosts: network.allow_private_hosts,
            ..Default::default()
        }
    }
}

/// Response from a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Response body bytes
    pub bytes: Bytes,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

impl FetchResponse {
    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// HTTP fetch client with size limits and retry.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let (max_redirects, allow_private) = (config.max_redirects, config.allow_private_hosts);
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() > max_redirects {
                return attempt.error("too many redirects");
            }
            let private_target = attempt
                .url()
                .host_str()
                .and_then(|h| h.trim_matches(['[', ']']).parse().ok())
                .is_some_and(ssrf::is_private_or_reserved);
            if !allow_private && private_target {
                attempt.error("redirect to a private address")
            } else {
                attempt.follow()
            }
        });

        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(policy)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::FetchFailed(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Fetch a URL once, returning raw bytes and metadata.
    pub async fn fetch_once(&self, url_str: &str) -> Result<FetchResponse, Error> {
        let start = Instant::now();
        let url = canonicalize(url_str).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        if !self.config.allow_private_hosts {
            ssrf::check_host(&url).await?;
        }

        let response = self
            .http
            .get(url.as_str())
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .send()
            .await
            .map_err(|e| Error::FetchFailed(format!("network error: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            return Err(Error::HttpError(format!("status {}", status.as_u16())));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchFailed(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::FetchFailed(format!("failed to read response: {}", e)))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchFailed(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!("fetched {} -> {} in {}ms ({} bytes)", url, final_url, fetch_ms, bytes.len());

        Ok(FetchResponse { final_url, status, content_type, bytes, fetch_ms })
    }

    /// Fetch a URL, retrying failed attempts.
    ///
    /// Invalid URLs fail immediately.
    pub async fn fetch_with_retry(&self, url: &str) -> Result<FetchResponse, Error> {
        let attempts = self.config.retry_count + 1;
        let mut attempt = 1;
        loop {
            match self.fetch_once(url).await {
                Ok(response) => return Ok(response),
                Err(e @ Error::InvalidUrl(_)) => return Err(e),
                Err(e) if attempt < attempts => {
                    tracing::warn!(url, attempt, attempts, error = %e, "fetch failed, retrying");
                    tokio::time::sleep(self.config.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::warn!(url, attempts, error = %e, "fetch failed, giving up");
                    return Err(e);
                }
            }
        }
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl PageFetcher for FetchClient {
    async fn fetch(&self, url: &str) -> Result<String, Error> {
        Ok(self.fetch_with_retry(url).await?.text())
    }
}
