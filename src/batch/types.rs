use serde::Serialize;
use thiserror::Error;

use crate::error::ErrorCode;
use crate::ratelimit::RateLimitStats;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Partial,
    Failed,
}

/// Result for one URL of a batch.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UrlOutcome {
    pub url: String,
    pub title: Option<String>,
    pub summary: String,
    pub status: OutcomeStatus,
    pub tokens_used: u64,
    pub processing_time_seconds: f64,
    pub error: Option<String>,
    pub error_code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl UrlOutcome {
    pub(crate) fn failed(url: String, title: Option<String>, code: ErrorCode, error: String, elapsed: f64) -> Self {
        Self {
            url,
            title,
            summary: String::new(),
            status: OutcomeStatus::Failed,
            tokens_used: 0,
            processing_time_seconds: elapsed,
            error: Some(error),
            error_code: Some(code),
            note: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchMetadata {
    pub total_requested: usize,
    pub total_processed: usize,
    pub total_succeeded: usize,
    pub total_failed: usize,
    pub total_partial: usize,
    pub total_tokens_used: u64,
    pub total_processing_time_seconds: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchError {
    pub url: String,
    pub error: String,
    pub error_code: ErrorCode,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchReport {
    pub summaries: Vec<UrlOutcome>,
    pub metadata: BatchMetadata,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<BatchError>,
    pub rate_limit_stats: RateLimitStats,
}

/// What a batch would do, without fetching anything.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchPlan {
    pub urls: Vec<String>,
    pub titles: Vec<Option<String>>,
    /// URLs dropped by `max_urls`.
    pub skipped: usize,
    pub timeout_per_url: u64,
    pub crawl_max_retries: u32,
    pub fetch_deadline_seconds: u64,
}

/// Request rejected before any job started.
#[derive(Clone, Debug, Error, PartialEq, Serialize)]
#[error("{error}")]
pub struct InvalidInput {
    pub error: String,
    pub error_code: ErrorCode,
}

impl InvalidInput {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into(), error_code: ErrorCode::InvalidInput }
    }
}
