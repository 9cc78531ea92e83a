//! Page fetching and text extraction.
//!
//! The pipeline only sees the [`Fetcher`] capability: given a URL it yields the
//! readable text of the page or a typed failure. [`HttpFetcher`] is the default
//! implementation (plain HTTP GET plus HTML-to-text extraction).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use url::Url;

use crate::error::ErrorCode;
use crate::util::text::char_len;

mod extract;
mod fetch;

pub use extract::extract_text;

/// Pages with less readable text than this are treated as boilerplate or error pages.
pub const MIN_CONTENT_CHARS: usize = 100;
pub const RETRY_PAUSE: Duration = Duration::from_secs(1);
const DEADLINE_SLACK: Duration = Duration::from_secs(5);

const USER_AGENT: &str = concat!("web-summarizer/", env!("CARGO_PKG_VERSION"));

#[derive(Clone, Debug, Error, PartialEq)]
#[error("{message}")]
pub struct FetchError {
    pub kind: ErrorCode,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: ErrorCode, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

pub type FetchResult = Result<String, FetchError>;

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `url` and returns its readable text.
    ///
    /// Each attempt is bounded by `timeout`; transient failures are retried up to
    /// `max_retries` times with a short fixed pause.
    async fn fetch(&self, url: &str, timeout: Duration, max_retries: u32) -> FetchResult;
}

/// Rejects anything that is not an absolute http(s) URL, before any network I/O.
pub fn validate_url(raw: &str) -> Result<Url, FetchError> {
    let invalid = || FetchError::new(ErrorCode::InvalidUrl, format!("Invalid URL: {raw}"));
    let url = Url::parse(raw.trim()).map_err(|_| invalid())?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(invalid()),
    }
}

/// Upper bound on a whole `fetch` call: every attempt timing out plus the pauses.
pub fn fetch_deadline(timeout: Duration, max_retries: u32) -> Duration {
    timeout
        .saturating_mul(max_retries.saturating_add(1))
        .saturating_add(RETRY_PAUSE.saturating_mul(max_retries))
        .saturating_add(DEADLINE_SLACK)
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration, max_retries: u32) -> FetchResult {
        let parsed = validate_url(url)?;
        let attempts = max_retries.saturating_add(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            tracing::info!(url, attempt, attempts, "crawling");
            match fetch::fetch_page(&self.client, &parsed, timeout).await {
                Ok(page) => {
                    let text = extract_text(&page.content_type, &page.body).unwrap_or_default();
                    let len = char_len(&text);
                    if len > MIN_CONTENT_CHARS {
                        tracing::info!(url, chars = len, "crawled");
                        return Ok(text);
                    }
                    tracing::warn!(url, chars = len, "content too short");
                    return Err(FetchError::new(
                        ErrorCode::CrawlError,
                        format!("Content too short or empty: {len} characters"),
                    ));
                }
                Err(failed) => {
                    tracing::warn!(url, attempt, error = %failed.error, "crawl attempt failed");
                    let retryable = failed.retryable;
                    last_error = Some(failed.error);
                    if !retryable {
                        break;
                    }
                    if attempt < attempts {
                        tokio::time::sleep(RETRY_PAUSE).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| FetchError::new(ErrorCode::CrawlError, "Unknown crawl error")))
    }
}
