use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::Instrument;

use crate::crawler::{FetchError, Fetcher, fetch_deadline};
use crate::error::ErrorCode;
use crate::summarizer::{Summarizer, Summary, SummaryFailure};
use crate::telemetry;
use crate::telemetry::ops::summarize::Phase;
use crate::util::text::preview;

use super::types::{OutcomeStatus, UrlOutcome};

const PARTIAL_PREVIEW_CHARS: usize = 1000;
const PARTIAL_NOTE: &str = "Summarization failed, returning crawled content";

/// Everything a job needs, cloned into each spawned task.
#[derive(Clone)]
pub(crate) struct JobCtx {
    pub fetcher: Arc<dyn Fetcher>,
    pub summarizer: Arc<Summarizer>,
    pub crawl_slots: Arc<Semaphore>,
    pub timeout: Duration,
    pub crawl_max_retries: u32,
}

#[derive(Clone, Debug)]
pub(crate) struct JobInput {
    pub url: String,
    pub title: Option<String>,
}

#[derive(Debug)]
enum JobState {
    Fetching,
    Summarizing { content: String },
    Succeeded(Summary),
    PartiallyFailed { content: String, failure: SummaryFailure },
    Failed(FetchError),
}

/// Runs one URL through fetch then summarize. Never fails: unexpected errors
/// become a failed outcome.
pub(crate) async fn run_guarded(ctx: JobCtx, input: JobInput) -> UrlOutcome {
    let started = Instant::now();
    match run(&ctx, &input, started).await {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::error!(url = %input.url, error = %format!("{err:#}"), "unexpected job error");
            unexpected(input, &err.to_string(), started)
        }
    }
}

pub(crate) fn unexpected(input: JobInput, message: &str, started: Instant) -> UrlOutcome {
    UrlOutcome::failed(
        input.url,
        input.title,
        ErrorCode::UnknownError,
        format!("Unexpected error: {message}"),
        started.elapsed().as_secs_f64(),
    )
}

async fn run(ctx: &JobCtx, input: &JobInput, started: Instant) -> Result<UrlOutcome> {
    let log = telemetry::summarize();
    let url = input.url.as_str();
    let mut state = JobState::Fetching;

    loop {
        state = match state {
            JobState::Fetching => {
                let span = log.span_kv(&Phase::Crawl, [("url", url.to_string())]);
                match fetch(ctx, url).instrument(span).await? {
                    Ok(content) => JobState::Summarizing { content },
                    Err(err) => JobState::Failed(err),
                }
            }
            JobState::Summarizing { content } => {
                let span = log.span_kv(&Phase::Summarize, [("url", url.to_string())]);
                let result = ctx
                    .summarizer
                    .summarize_article(&content, url, input.title.as_deref())
                    .instrument(span)
                    .await;
                match result {
                    Ok(summary) => JobState::Succeeded(summary),
                    Err(failure) => JobState::PartiallyFailed { content, failure },
                }
            }
            terminal => return Ok(finish(input, terminal, started.elapsed().as_secs_f64())),
        };
    }
}

async fn fetch(ctx: &JobCtx, url: &str) -> Result<Result<String, FetchError>> {
    let _slot = ctx.crawl_slots.acquire().await.context("crawl pool closed")?;
    let deadline = fetch_deadline(ctx.timeout, ctx.crawl_max_retries);
    let fetched = tokio::time::timeout(deadline, ctx.fetcher.fetch(url, ctx.timeout, ctx.crawl_max_retries)).await;
    Ok(fetched.unwrap_or_else(|_| {
        tracing::warn!(url, deadline_secs = deadline.as_secs(), "crawl deadline exceeded");
        Err(FetchError::new(
            ErrorCode::CrawlTimeout,
            format!("Crawl timed out after {}s", deadline.as_secs()),
        ))
    }))
}

fn finish(input: &JobInput, state: JobState, elapsed: f64) -> UrlOutcome {
    let url = input.url.clone();
    let title = input.title.clone();
    match state {
        JobState::Succeeded(summary) => UrlOutcome {
            url,
            title,
            summary: summary.text,
            status: OutcomeStatus::Success,
            tokens_used: summary.tokens_used,
            processing_time_seconds: elapsed,
            error: None,
            error_code: None,
            note: None,
        },
        JobState::PartiallyFailed { content, failure } => UrlOutcome {
            url,
            title,
            summary: failure
                .fallback
                .unwrap_or_else(|| preview(&content, PARTIAL_PREVIEW_CHARS)),
            status: OutcomeStatus::Partial,
            tokens_used: 0,
            processing_time_seconds: elapsed,
            error: Some(failure.message),
            error_code: Some(failure.kind),
            note: Some(PARTIAL_NOTE.to_string()),
        },
        JobState::Failed(err) => UrlOutcome::failed(url, title, err.kind, err.message, elapsed),
        // only terminal states reach here
        JobState::Fetching | JobState::Summarizing { .. } => UrlOutcome::failed(
            url,
            title,
            ErrorCode::UnknownError,
            "Unexpected error: job ended before completion".to_string(),
            elapsed,
        ),
    }
}
