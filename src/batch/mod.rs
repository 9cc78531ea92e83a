//! Bounded-concurrency crawl-then-summarize over a batch of URLs.
//!
//! Each URL runs as its own task: fetch under the crawl pool, then summarize
//! under the rate limiter. A URL's failure only affects its own outcome, and
//! the report keeps input order regardless of completion order.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::task::AbortOnDropHandle;
use tracing::Instrument;

use crate::crawler::{Fetcher, fetch_deadline};
use crate::error::ErrorCode;
use crate::ratelimit::RateLimiter;
use crate::summarizer::Summarizer;
use crate::telemetry;
use crate::telemetry::ops::summarize::Phase;
use crate::util::text::round2;

mod job;
pub mod types;

pub use types::{BatchError, BatchMetadata, BatchPlan, BatchReport, InvalidInput, OutcomeStatus, UrlOutcome};

use job::{JobCtx, JobInput};

pub const DEFAULT_MAX_URLS: usize = 10;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const MIN_TIMEOUT_SECS: u64 = 10;
pub const MAX_TIMEOUT_SECS: u64 = 120;

#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    /// Upper bound accepted for `max_urls`.
    pub max_urls_per_request: usize,
    pub max_concurrent_crawls: usize,
    pub crawl_max_retries: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_urls_per_request: DEFAULT_MAX_URLS,
            max_concurrent_crawls: 5,
            crawl_max_retries: 2,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BatchRequest {
    pub urls: Vec<String>,
    pub titles: Option<Vec<String>>,
    pub max_urls: usize,
    pub timeout_per_url: u64,
}

#[cfg(test)]
impl BatchRequest {
    pub(crate) fn new(urls: Vec<String>) -> Self {
        Self {
            urls,
            titles: None,
            max_urls: DEFAULT_MAX_URLS,
            timeout_per_url: DEFAULT_TIMEOUT_SECS,
        }
    }
}

pub struct Pipeline {
    fetcher: Arc<dyn Fetcher>,
    summarizer: Arc<Summarizer>,
    crawl_slots: Arc<Semaphore>,
    cfg: PipelineConfig,
}

impl Pipeline {
    pub fn new(fetcher: Arc<dyn Fetcher>, summarizer: Arc<Summarizer>, cfg: PipelineConfig) -> Self {
        let crawl_slots = Arc::new(Semaphore::new(cfg.max_concurrent_crawls.max(1)));
        Self { fetcher, summarizer, crawl_slots, cfg }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        self.summarizer.limiter()
    }

    /// Validates the request, then runs every URL concurrently and aggregates
    /// the outcomes. Only input validation can fail; everything after it ends
    /// up inside the report.
    pub async fn summarize_batch(&self, req: BatchRequest) -> Result<BatchReport, InvalidInput> {
        let log = telemetry::summarize();
        let started = Instant::now();

        let (inputs, timeout) = {
            let _s = log.span(&Phase::Validate).entered();
            self.validate(req)?
        };
        log.info_kv(
            "processing batch",
            [("urls", inputs.len().to_string()), ("timeout_per_url", timeout.as_secs().to_string())],
        );

        let ctx = JobCtx {
            fetcher: self.fetcher.clone(),
            summarizer: self.summarizer.clone(),
            crawl_slots: self.crawl_slots.clone(),
            timeout,
            crawl_max_retries: self.cfg.crawl_max_retries,
        };
        // dropping the batch future (a cancelled tool call) aborts the jobs
        let handles: Vec<_> = inputs
            .iter()
            .cloned()
            .map(|input| AbortOnDropHandle::new(tokio::spawn(job::run_guarded(ctx.clone(), input))))
            .collect();

        let mut summaries = Vec::with_capacity(inputs.len());
        for (input, joined) in inputs.into_iter().zip(join_all(handles).await) {
            let outcome = joined.unwrap_or_else(|err| {
                tracing::error!(url = %input.url, error = %err, "job task aborted");
                job::unexpected(input, &err.to_string(), started)
            });
            summaries.push(outcome);
        }

        let report = aggregate(summaries, started.elapsed(), self.limiter())
            .instrument(log.span(&Phase::Aggregate))
            .await;
        let m = &report.metadata;
        log.totals(m.total_succeeded, m.total_partial, m.total_failed, m.total_tokens_used, m.total_processing_time_seconds);
        Ok(report)
    }

    /// Validates and truncates like [`Pipeline::summarize_batch`] but only reports
    /// what would run.
    pub fn plan(&self, req: BatchRequest) -> Result<BatchPlan, InvalidInput> {
        let requested = req.urls.len();
        let (inputs, timeout) = self.validate(req)?;
        Ok(BatchPlan {
            skipped: requested - inputs.len(),
            timeout_per_url: timeout.as_secs(),
            crawl_max_retries: self.cfg.crawl_max_retries,
            fetch_deadline_seconds: fetch_deadline(timeout, self.cfg.crawl_max_retries).as_secs(),
            titles: inputs.iter().map(|i| i.title.clone()).collect(),
            urls: inputs.into_iter().map(|i| i.url).collect(),
        })
    }

    fn validate(&self, req: BatchRequest) -> Result<(Vec<JobInput>, Duration), InvalidInput> {
        let BatchRequest { mut urls, titles, max_urls, timeout_per_url } = req;
        if urls.is_empty() {
            return Err(InvalidInput::new("At least one URL is required"));
        }
        if max_urls == 0 || max_urls > self.cfg.max_urls_per_request {
            return Err(InvalidInput::new(format!(
                "max_urls must be between 1 and {} (got {max_urls})",
                self.cfg.max_urls_per_request
            )));
        }
        if !(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS).contains(&timeout_per_url) {
            return Err(InvalidInput::new(format!(
                "timeout_per_url must be between {MIN_TIMEOUT_SECS} and {MAX_TIMEOUT_SECS} seconds (got {timeout_per_url})"
            )));
        }
        if let Some(titles) = &titles {
            if titles.len() != urls.len() {
                return Err(InvalidInput::new(format!(
                    "titles list length ({}) must match urls list length ({})",
                    titles.len(),
                    urls.len()
                )));
            }
        }

        if urls.len() > max_urls {
            telemetry::summarize().warn_kv(
                "limiting URLs to max_urls",
                [("requested", urls.len().to_string()), ("max_urls", max_urls.to_string())],
            );
            urls.truncate(max_urls);
        }
        let titles = titles.unwrap_or_default().into_iter().map(Some).chain(std::iter::repeat(None));
        let inputs = urls
            .into_iter()
            .zip(titles)
            .map(|(url, title)| JobInput { url, title })
            .collect();
        Ok((inputs, Duration::from_secs(timeout_per_url)))
    }
}

async fn aggregate(summaries: Vec<UrlOutcome>, elapsed: Duration, limiter: &RateLimiter) -> BatchReport {
    let count = |status| summaries.iter().filter(|s| s.status == status).count();
    let metadata = BatchMetadata {
        total_requested: summaries.len(),
        total_processed: summaries.len(),
        total_succeeded: count(OutcomeStatus::Success),
        total_failed: count(OutcomeStatus::Failed),
        total_partial: count(OutcomeStatus::Partial),
        total_tokens_used: summaries.iter().map(|s| s.tokens_used).sum(),
        total_processing_time_seconds: round2(elapsed.as_secs_f64()),
    };
    let errors = summaries
        .iter()
        .filter(|s| s.status != OutcomeStatus::Success || s.error.is_some())
        .map(|s| BatchError {
            url: s.url.clone(),
            error: s.error.clone().unwrap_or_else(|| "Unknown error".to_string()),
            error_code: s.error_code.unwrap_or(ErrorCode::UnknownError),
        })
        .collect();

    BatchReport {
        summaries,
        metadata,
        errors,
        rate_limit_stats: limiter.current_stats().await,
    }
}
