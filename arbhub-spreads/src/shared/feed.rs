/// HTTP client for the spread backend
///
/// The backend aggregates quotes from every exchange and serves the computed
/// spreads at `GET {base}/api/spreads?mode=<mode>`.
use crate::shared::{
    error::FeedError,
    types::{ArbitrageMode, SpreadsResponse},
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Delay before re-polling a feed that answered with no spreads
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Spread feed client configuration
#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    /// Backend base URL
    pub base_url: String,
    /// Mode requested for the lifetime of the poll loop
    pub mode: ArbitrageMode,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Delay before retrying an empty response
    pub retry_delay: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            mode: ArbitrageMode::FuturesFutures,
            request_timeout: Duration::from_secs(10),
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl FeedConfig {
    /// Create a new configuration with custom base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Read configuration from the environment
    ///
    /// - `ARBHUB_API_URL` (default `http://127.0.0.1:8080`)
    /// - `ARBHUB_MODE` (default `futures-futures`)
    /// - `ARBHUB_RETRY_SECS` (default 5)
    ///
    /// Malformed values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("ARBHUB_API_URL").filter(|url| !url.trim().is_empty()) {
            config.base_url = url.trim().to_string();
        }

        if let Some(raw) = lookup("ARBHUB_MODE") {
            match raw.parse::<ArbitrageMode>() {
                Ok(mode) => config.mode = mode,
                Err(error) => warn!(%error, "ignoring ARBHUB_MODE, using {}", config.mode),
            }
        }

        if let Some(raw) = lookup("ARBHUB_RETRY_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.retry_delay = Duration::from_secs(secs),
                _ => warn!(value = %raw, "ignoring ARBHUB_RETRY_SECS, using {:?}", config.retry_delay),
            }
        }

        config
    }

    /// Set the requested mode
    pub fn with_mode(mut self, mode: ArbitrageMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set per-request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set empty-response retry delay
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Absolute URL of the spreads endpoint (without query)
    pub fn spreads_endpoint(&self) -> Result<Url, FeedError> {
        let invalid = |source: url::ParseError| FeedError::InvalidUrl {
            url: self.base_url.clone(),
            source,
        };

        // Url::join replaces the last path segment unless the base ends in '/'
        let mut base = self.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        Url::parse(&base)
            .and_then(|url| url.join("api/spreads"))
            .map_err(invalid)
    }
}

/// Source of spread snapshots
#[async_trait]
pub trait SpreadFeed: Send + Sync {
    /// Fetch the current spreads for `mode`
    async fn fetch(&self, mode: ArbitrageMode) -> Result<SpreadsResponse, FeedError>;
}

/// [`SpreadFeed`] backed by the HTTP API
#[derive(Debug, Clone)]
pub struct HttpSpreadFeed {
    client: reqwest::Client,
    endpoint: Url,
    timeout: Duration,
}

impl HttpSpreadFeed {
    pub fn new(config: &FeedConfig) -> Result<Self, FeedError> {
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: config.spreads_endpoint()?,
            timeout: config.request_timeout,
        })
    }

    /// Full request URL for `mode`
    pub fn request_url(&self, mode: ArbitrageMode) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("mode", mode.as_str());
        url
    }
}

#[async_trait]
impl SpreadFeed for HttpSpreadFeed {
    async fn fetch(&self, mode: ArbitrageMode) -> Result<SpreadsResponse, FeedError> {
        let url = self.request_url(mode);
        debug!(%url, "requesting spreads");

        let response = self.client.get(url).timeout(self.timeout).send().await?;

        if !response.status().is_success() {
            return Err(FeedError::Status(response.status()));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
