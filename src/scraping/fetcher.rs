//! Fetching with retries and escalating cooldowns
//!
//! The network is consumed through the [`Transport`] trait: a single GET
//! returning status and body, plus a session reset. [`HttpTransport`] is the
//! reqwest implementation with a persistent cookie store.
//!
//! [`CrawlContext`] wraps a transport with the retry policy and owns the
//! cooldown counter, so independent crawls never share backoff state.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use super::backoff::{Backoff, CooldownState, Failure, RetryPolicy};
use super::layout::CrawlLayout;

const NOT_FOUND: u16 = 404;
const GATEWAY_TIMEOUT: u16 = 504;

/// Errors raised by a transport
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Session bootstrap failed with status {0}")]
    Bootstrap(u16),
}

/// Raw response of a single GET
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A session able to GET URLs, keeping cookies between calls
#[async_trait]
pub trait Transport: Send {
    /// Perform one GET request
    async fn get(&mut self, url: &str) -> Result<RawResponse, TransportError>;

    /// Drop the current session (client and cookies) and start a fresh one
    async fn reset_session(&mut self) -> Result<(), TransportError>;
}

/// Configuration for the HTTP transport
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string
    pub user_agent: String,
    /// `Accept-Language` header value
    pub accept_language: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Page requested once per session to obtain cookies
    pub session_url: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: crate::config::DEFAULT_USER_AGENT.to_string(),
            accept_language: "en-US,en;q=0.5".to_string(),
            timeout: Duration::from_secs(120),
            connect_timeout: Duration::from_secs(30),
            session_url: None,
        }
    }
}

/// reqwest-backed transport with a cookie store
pub struct HttpTransport {
    client: reqwest::Client,
    config: FetchConfig,
}

impl HttpTransport {
    /// Create a transport and bootstrap its session cookies
    pub async fn connect(config: FetchConfig) -> Result<Self, TransportError> {
        let client = Self::build_client(&config)?;
        let mut transport = Self { client, config };
        transport.bootstrap().await?;
        Ok(transport)
    }

    fn build_client(config: &FetchConfig) -> Result<reqwest::Client, TransportError> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Ok(value) = reqwest::header::HeaderValue::from_str(&config.accept_language) {
            headers.insert(reqwest::header::ACCEPT_LANGUAGE, value);
        }

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .default_headers(headers)
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .gzip(true)
            .build()?;
        Ok(client)
    }

    async fn bootstrap(&mut self) -> Result<(), TransportError> {
        let Some(url) = self.config.session_url.clone() else {
            return Ok(());
        };
        let response = self.get(&url).await?;
        if !response.is_success() {
            return Err(TransportError::Bootstrap(response.status));
        }
        tracing::debug!("Session cookies initialized from {}", url);
        Ok(())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&mut self, url: &str) -> Result<RawResponse, TransportError> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(RawResponse { status, body })
    }

    async fn reset_session(&mut self) -> Result<(), TransportError> {
        tracing::warn!("Resetting session...");
        self.client = Self::build_client(&self.config)?;
        self.bootstrap().await
    }
}

/// Which call site a request comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Search-result page: connection errors and gateway timeouts are retried without limit
    SearchPage,
    /// Single document: every failure counts towards the retry limit
    Document,
}

/// Result of a fetch through the retry controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Response body of a successful request
    Ok(String),
    /// The server answered 404; recorded and not retried
    NotFound,
    /// The retry budget ran out; recorded in the error log
    Exhausted,
}

impl FetchOutcome {
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Ok(body) => Some(body),
            _ => None,
        }
    }
}

/// Fetch statistics
#[derive(Debug, Clone, Default)]
pub struct FetchStats {
    /// Requests sent, retries included
    pub requests: u64,
    /// Successful responses
    pub successes: u64,
    /// Failed attempts (transport or status)
    pub failures: u64,
    /// URLs answered with 404
    pub not_found: u64,
    /// URLs given up on
    pub exhausted: u64,
}

/// Per-crawl fetch context: transport, retry policy, and cooldown state
pub struct CrawlContext<T: Transport> {
    transport: T,
    policy: RetryPolicy,
    cooldowns: CooldownState,
    layout: CrawlLayout,
    stats: FetchStats,
}

impl<T: Transport> CrawlContext<T> {
    pub fn new(transport: T, policy: RetryPolicy, layout: CrawlLayout) -> Self {
        Self {
            transport,
            policy,
            cooldowns: CooldownState::default(),
            layout,
            stats: FetchStats::default(),
        }
    }

    /// Fetch `url`, retrying according to the policy.
    ///
    /// Gives up after `max_retries` counted failures, recording the URL in
    /// the error log. A 404 is recorded in the not-found log and never retried.
    pub async fn fetch(&mut self, url: &str, max_retries: u32, kind: RequestKind) -> FetchOutcome {
        let mut attempt: u32 = 0;

        loop {
            if attempt >= max_retries {
                tracing::error!("Max retries reached for {}", url);
                self.stats.exhausted += 1;
                self.layout.record_unreachable(url);
                return FetchOutcome::Exhausted;
            }

            self.stats.requests += 1;
            let failure = match self.transport.get(url).await {
                Ok(response) if response.is_success() => {
                    self.stats.successes += 1;
                    return FetchOutcome::Ok(response.body);
                }
                Ok(response) if response.status == NOT_FOUND => {
                    tracing::warn!("Page {} not found", url);
                    self.stats.not_found += 1;
                    self.layout.record_not_found(url);
                    return FetchOutcome::NotFound;
                }
                Ok(response) => {
                    tracing::error!(
                        "Error fetching {}. Status code: {}, trying again",
                        url,
                        response.status
                    );
                    Failure::Status(response.status)
                }
                Err(e) => {
                    tracing::error!("Error fetching {}: {}, trying again", url, e);
                    Failure::Connection
                }
            };
            self.stats.failures += 1;

            let uncounted = kind == RequestKind::SearchPage
                && matches!(failure, Failure::Connection | Failure::Status(GATEWAY_TIMEOUT));
            if uncounted {
                self.cool_down().await;
                continue;
            }

            attempt += 1;
            if attempt >= max_retries {
                continue;
            }
            match self.policy.backoff(&failure, attempt) {
                Backoff::Wait(delay) => tokio::time::sleep(delay).await,
                Backoff::Cooldown => self.cool_down().await,
            }
        }
    }

    /// Sleep for the cooldown period, resetting the session when cooldowns pile up
    pub async fn cool_down(&mut self) {
        tracing::warn!("Cooldown...");
        if self.cooldowns.escalate(self.policy.cooldown_threshold) {
            if let Err(e) = self.transport.reset_session().await {
                tracing::error!("Session reset failed: {}", e);
            }
        }
        tokio::time::sleep(self.policy.cooldown).await;
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn layout(&self) -> &CrawlLayout {
        &self.layout
    }

    pub fn cooldowns(&self) -> &CooldownState {
        &self.cooldowns
    }

    pub fn stats(&self) -> &FetchStats {
        &self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }
}
