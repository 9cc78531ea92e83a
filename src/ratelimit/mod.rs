//! Sliding-window token/request limiter for the summarization backend.
//!
//! The limiter tracks tokens and requests consumed over the trailing minute and
//! makes callers wait when the next request would cross the configured ceiling.
//! Accounting is best effort: the window is evaluated at check time and nothing
//! is reserved, so concurrent callers that pass `wait_if_needed` together may
//! overshoot by the sum of their estimates. The safety margin absorbs that slack.
//!
//! A separate semaphore bounds in-flight calls; it is independent of the window
//! and callers take it around the network call itself.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tokio::time::{sleep, Instant};

mod window;

use window::RateWindow;

pub const WINDOW: Duration = Duration::from_secs(60);
const WAIT_BUFFER: Duration = Duration::from_secs(1);

const DEFAULT_TOKENS_PER_MINUTE: u64 = 4_000_000;
const DEFAULT_REQUESTS_PER_MINUTE: u64 = 4_000;
const DEFAULT_MAX_CONCURRENT: usize = 5;
const DEFAULT_SAFETY_MARGIN: f64 = 0.9;

#[derive(Clone, Debug, PartialEq)]
pub struct RateLimiterConfig {
    pub max_tokens_per_minute: u64,
    pub max_requests_per_minute: u64,
    pub max_concurrent: usize,
    /// Fraction in (0, 1] applied to both per-minute ceilings.
    pub safety_margin: f64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_minute: DEFAULT_TOKENS_PER_MINUTE,
            max_requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            safety_margin: DEFAULT_SAFETY_MARGIN,
        }
    }
}

impl RateLimiterConfig {
    pub fn validate(&self) -> Result<(), RateLimitError> {
        if self.max_tokens_per_minute == 0 {
            return Err(RateLimitError::InvalidConfig("max_tokens_per_minute must be > 0".into()));
        }
        if self.max_requests_per_minute == 0 {
            return Err(RateLimitError::InvalidConfig("max_requests_per_minute must be > 0".into()));
        }
        if self.max_concurrent == 0 {
            return Err(RateLimitError::InvalidConfig("max_concurrent must be >= 1".into()));
        }
        if !(self.safety_margin > 0.0 && self.safety_margin <= 1.0) {
            return Err(RateLimitError::InvalidConfig(format!(
                "safety_margin must be in (0, 1], got {}",
                self.safety_margin
            )));
        }
        Ok(())
    }

    fn effective_tokens(&self) -> u64 {
        (self.max_tokens_per_minute as f64 * self.safety_margin).floor() as u64
    }

    fn effective_requests(&self) -> usize {
        (self.max_requests_per_minute as f64 * self.safety_margin).floor() as usize
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RateLimitError {
    #[error("estimated tokens ({estimated}) would exceed limit ({limit}); current usage: {current} tokens")]
    Capacity { estimated: u64, limit: u64, current: u64 },
    #[error("rate limiter is closed")]
    Closed,
    #[error("invalid rate limiter config: {0}")]
    InvalidConfig(String),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RateLimitStats {
    pub tokens_used: u64,
    pub tokens_limit: u64,
    pub tokens_percent: f64,
    pub requests_used: usize,
    pub requests_limit: usize,
    pub requests_percent: f64,
}

/// Slot in the in-flight call pool; released on drop.
#[derive(Debug)]
pub struct RequestPermit<'a> {
    _permit: SemaphorePermit<'a>,
}

impl RequestPermit<'_> {
    pub fn release(self) {}
}

#[derive(Debug)]
pub struct RateLimiter {
    max_tokens: u64,
    max_requests: usize,
    window: Mutex<RateWindow>,
    semaphore: Semaphore,
}

impl RateLimiter {
    pub fn new(cfg: RateLimiterConfig) -> Result<Self, RateLimitError> {
        cfg.validate()?;
        Ok(Self {
            max_tokens: cfg.effective_tokens(),
            max_requests: cfg.effective_requests(),
            window: Mutex::new(RateWindow::new(WINDOW)),
            semaphore: Semaphore::new(cfg.max_concurrent),
        })
    }

    /// Waits once for the token window to make room for `estimated_tokens`, then
    /// applies the request ceiling.
    ///
    /// When the estimate still does not fit after that wait, or is larger than the
    /// whole window, the call fails with [`RateLimitError::Capacity`]. The lock is
    /// never held while sleeping.
    ///
    /// The request ceiling is checked once: after sleeping for it the call
    /// returns without re-checking, so a burst may overshoot the request count
    /// slightly.
    pub async fn wait_if_needed(&self, estimated_tokens: u64) -> Result<(), RateLimitError> {
        if estimated_tokens > self.max_tokens {
            let current = self.window.lock().await.usage(Instant::now()).0;
            return Err(self.capacity(estimated_tokens, current));
        }

        let token_delay = {
            let mut window = self.window.lock().await;
            let now = Instant::now();
            let (current, _) = window.usage(now);
            if current + estimated_tokens <= self.max_tokens {
                None
            } else {
                let delay = window
                    .oldest_token_entry()
                    .map(|at| (at + window.span() + WAIT_BUFFER).saturating_duration_since(now))
                    .unwrap_or_default();
                Some((delay, current))
            }
        };

        if let Some((delay, current)) = token_delay {
            tracing::warn!(
                wait_secs = delay.as_secs_f64(),
                current,
                limit = self.max_tokens,
                "token limit approaching, waiting"
            );
            sleep(delay).await;

            let current = self.window.lock().await.usage(Instant::now()).0;
            if current + estimated_tokens > self.max_tokens {
                return Err(self.capacity(estimated_tokens, current));
            }
        }

        let request_delay = {
            let mut window = self.window.lock().await;
            let now = Instant::now();
            let (_, requests) = window.usage(now);
            if requests >= self.max_requests {
                window
                    .oldest_request()
                    .map(|at| ((at + window.span() + WAIT_BUFFER).saturating_duration_since(now), requests))
            } else {
                None
            }
        };
        if let Some((delay, requests)) = request_delay {
            if !delay.is_zero() {
                tracing::warn!(
                    wait_secs = delay.as_secs_f64(),
                    current = requests,
                    limit = self.max_requests,
                    "request limit approaching, waiting"
                );
                sleep(delay).await;
            }
        }
        Ok(())
    }

    fn capacity(&self, estimated: u64, current: u64) -> RateLimitError {
        RateLimitError::Capacity { estimated, limit: self.max_tokens, current }
    }

    pub async fn record_request(&self, tokens_used: u64) {
        let mut window = self.window.lock().await;
        window.record(Instant::now(), tokens_used);
    }

    pub async fn acquire(&self) -> Result<RequestPermit<'_>, RateLimitError> {
        let permit = self.semaphore.acquire().await.map_err(|_| RateLimitError::Closed)?;
        Ok(RequestPermit { _permit: permit })
    }

    #[cfg(test)]
    pub(crate) fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub async fn current_stats(&self) -> RateLimitStats {
        let (tokens_used, requests_used) = self.window.lock().await.usage(Instant::now());
        RateLimitStats {
            tokens_used,
            tokens_limit: self.max_tokens,
            tokens_percent: percent(tokens_used as f64, self.max_tokens as f64),
            requests_used,
            requests_limit: self.max_requests,
            requests_percent: percent(requests_used as f64, self.max_requests as f64),
        }
    }
}

fn percent(used: f64, limit: f64) -> f64 {
    if limit > 0.0 { used * 100.0 / limit } else { 0.0 }
}
