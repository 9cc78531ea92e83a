//! Summarization of fetched pages through an [`LlmClient`], under the shared
//! [`RateLimiter`].
//!
//! Every attempt waits for window capacity, takes an in-flight slot for the
//! network call only, and records the reported usage on success. Failed
//! attempts are classified (see [`policy::classify`]) and either retried with
//! capped exponential backoff or ended. Once the retry loop has started, a
//! failure still carries a fallback built from the raw page so callers always
//! have something to show.

use std::sync::Arc;

use thiserror::Error;

use crate::error::ErrorCode;
use crate::llm::{GenerateRequest, LlmClient, LlmError};
use crate::ratelimit::{RateLimitError, RateLimiter};
use crate::util::text::{char_len, preview, truncate_chars};

pub mod policy;
mod prompt;

pub use policy::Backoff;
pub use prompt::PromptTemplate;

use policy::{RetryState, Transition};

pub const MIN_CONTENT_CHARS: usize = 50;
pub const MAX_CONTENT_CHARS: usize = 50_000;
/// Added to the prompt estimate to cover the response.
pub const RESPONSE_TOKEN_MARGIN: u64 = 500;
pub const DEFAULT_MAX_RETRIES: u32 = 10;
const DEFAULT_TITLE: &str = "Article";
const FALLBACK_CHARS: usize = 500;
const RATE_LIMITED_PREFIX: &str = "FAILED TO SUMMARIZE due to API limits. Here is the raw content start: ";
const FALLBACK_PREFIX: &str = "FAILED TO SUMMARIZE. Here is the raw content start: ";

#[derive(Clone, Debug, PartialEq)]
pub struct Summary {
    pub text: String,
    pub tokens_used: u64,
}

#[derive(Clone, Debug, Error, PartialEq)]
#[error("{message}")]
pub struct SummaryFailure {
    pub kind: ErrorCode,
    pub message: String,
    /// Degraded stand-in for the summary, when one could be built.
    pub fallback: Option<String>,
}

impl SummaryFailure {
    fn new(kind: ErrorCode, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), fallback: None }
    }

    fn with_fallback(mut self, content: &str) -> Self {
        let prefix = match self.kind {
            ErrorCode::RateLimitExceeded => RATE_LIMITED_PREFIX,
            _ => FALLBACK_PREFIX,
        };
        self.fallback = Some(format!("{prefix}{}", preview(content, FALLBACK_CHARS)));
        self
    }
}

/// Roughly one token per four characters of prompt, plus the response margin.
pub fn estimate_tokens(prompt: &str) -> u64 {
    (char_len(prompt) / 4) as u64 + RESPONSE_TOKEN_MARGIN
}

enum AttemptError {
    Empty,
    Limiter(RateLimitError),
    Llm(LlmError),
}

pub struct Summarizer {
    client: Arc<dyn LlmClient>,
    limiter: Arc<RateLimiter>,
    prompt: PromptTemplate,
    max_retries: u32,
    backoff: Backoff,
}

impl Summarizer {
    pub fn new(client: Arc<dyn LlmClient>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            client,
            limiter,
            prompt: PromptTemplate::default(),
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: Backoff::default(),
        }
    }

    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[cfg(test)]
    pub(crate) fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub async fn summarize_article(
        &self,
        content: &str,
        url: &str,
        title: Option<&str>,
    ) -> Result<Summary, SummaryFailure> {
        let trimmed = char_len(content.trim());
        if trimmed < MIN_CONTENT_CHARS {
            return Err(SummaryFailure::new(
                ErrorCode::TokenLimitExceeded,
                format!("Content too short or empty: {trimmed} characters"),
            ));
        }

        let capped = truncate_chars(content, MAX_CONTENT_CHARS);
        let prompt = self.prompt.render(title.unwrap_or(DEFAULT_TITLE), url, capped);
        let estimate = estimate_tokens(&prompt);
        let attempts = self.max_retries.saturating_add(1);

        let mut state = RetryState::Attempt(0);
        loop {
            state = match state {
                RetryState::Attempt(attempt) => {
                    tracing::info!(url, attempt = attempt + 1, attempts, estimate, "summarizing");
                    match self.attempt(&prompt, estimate).await {
                        Ok(summary) => RetryState::Done(summary),
                        Err(AttemptError::Empty) => {
                            tracing::warn!(url, "empty response from backend");
                            RetryState::Fatal(SummaryFailure::new(
                                ErrorCode::GeminiError,
                                "Empty response from Gemini",
                            ))
                        }
                        Err(AttemptError::Limiter(err)) => {
                            tracing::error!(url, error = %err, "rate limiter rejected request");
                            let kind = match err {
                                RateLimitError::Capacity { .. } => ErrorCode::TokenLimitExceeded,
                                _ => ErrorCode::UnknownError,
                            };
                            RetryState::Fatal(SummaryFailure::new(kind, err.to_string()).with_fallback(content))
                        }
                        Err(AttemptError::Llm(err)) => {
                            let class = policy::classify(&err);
                            tracing::warn!(
                                url,
                                attempt = attempt + 1,
                                attempts,
                                code = %class.code(),
                                error = %err,
                                "summarization attempt failed"
                            );
                            let failure = SummaryFailure::new(class.code(), err.to_string()).with_fallback(content);
                            match policy::after_failure(class, attempt, self.max_retries, &self.backoff) {
                                Transition::Retry(delay) => RetryState::Retrying { attempt, delay },
                                Transition::Fatal => RetryState::Fatal(failure),
                                Transition::Exhausted => RetryState::Exhausted(failure),
                            }
                        }
                    }
                }
                RetryState::Retrying { attempt, delay } => {
                    tracing::warn!(url, attempt = attempt + 1, delay_secs = delay.as_secs_f64(), "retrying summarization");
                    tokio::time::sleep(delay).await;
                    RetryState::Attempt(attempt + 1)
                }
                RetryState::Done(summary) => {
                    tracing::info!(url, chars = char_len(&summary.text), tokens = summary.tokens_used, "summarized");
                    return Ok(summary);
                }
                RetryState::Fatal(failure) => return Err(failure),
                RetryState::Exhausted(failure) => {
                    tracing::error!(url, attempts, code = %failure.kind, "summarization retries exhausted");
                    return Err(failure);
                }
            };
        }
    }

    async fn attempt(&self, prompt: &str, estimate: u64) -> Result<Summary, AttemptError> {
        self.limiter.wait_if_needed(estimate).await.map_err(AttemptError::Limiter)?;
        let permit = self.limiter.acquire().await.map_err(AttemptError::Limiter)?;
        let result = self.client.generate(GenerateRequest::new(prompt)).await;
        permit.release();

        let response = result.map_err(AttemptError::Llm)?;
        let text = response.text.trim();
        if text.is_empty() {
            return Err(AttemptError::Empty);
        }
        let tokens_used = response.total_tokens.map(u64::from).unwrap_or(estimate);
        self.limiter.record_request(tokens_used).await;
        Ok(Summary { text: text.to_string(), tokens_used })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ApiErrorBody, GenerateResponse};
    use crate::ratelimit::RateLimiterConfig;
    use crate::testing::{ScriptedLlm, fast_backoff, unstructured};
    use reqwest::StatusCode;
    use std::time::Duration;

    fn page() -> String {
        "The committee voted to keep the benchmark rate at 10.5 percent. ".repeat(8)
    }

    fn limiter(tokens: u64) -> Arc<RateLimiter> {
        Arc::new(
            RateLimiter::new(RateLimiterConfig {
                max_tokens_per_minute: tokens,
                max_requests_per_minute: 100,
                max_concurrent: 2,
                safety_margin: 1.0,
            })
            .unwrap(),
        )
    }

    fn ok(text: &str, total: Option<u32>) -> Result<GenerateResponse, LlmError> {
        Ok(GenerateResponse {
            text: text.into(),
            total_tokens: total,
        })
    }

    fn quota() -> Result<GenerateResponse, LlmError> {
        Err(LlmError::Api {
            status: StatusCode::TOO_MANY_REQUESTS,
            error: ApiErrorBody {
                code: Some(429),
                message: "Resource has been exhausted".into(),
                status: Some("RESOURCE_EXHAUSTED".into()),
            },
        })
    }

    #[test]
    fn estimate_counts_characters() {
        assert_eq!(estimate_tokens(&"a".repeat(400)), 600);
        assert_eq!(estimate_tokens(""), 500);
    }

    #[tokio::test]
    async fn success_records_reported_usage() {
        let llm = Arc::new(ScriptedLlm::new(vec![ok("  Rates unchanged.  ", Some(321))]));
        let limiter = limiter(1_000_000);
        let s = Summarizer::new(llm.clone(), limiter.clone());

        let out = s.summarize_article(&page(), "https://x.test/a", Some("Rates")).await.unwrap();

        assert_eq!(out, Summary { text: "Rates unchanged.".into(), tokens_used: 321 });
        assert_eq!(limiter.current_stats().await.tokens_used, 321);
        assert_eq!(limiter.current_stats().await.requests_used, 1);
        let prompts = llm.prompts();
        assert!(prompts[0].contains("Title: Rates"));
        assert!(prompts[0].contains("Source: https://x.test/a"));
    }

    #[tokio::test]
    async fn missing_usage_falls_back_to_estimate() {
        let llm = Arc::new(ScriptedLlm::new(vec![ok("Summary.", None)]));
        let s = Summarizer::new(llm.clone(), limiter(1_000_000));

        let out = s.summarize_article(&page(), "https://x.test/a", None).await.unwrap();

        let expected = estimate_tokens(&llm.prompts()[0]);
        assert_eq!(out.tokens_used, expected);
        assert!(llm.prompts()[0].contains("Title: Article"));
    }

    #[tokio::test]
    async fn short_content_never_calls_backend() {
        let llm = Arc::new(ScriptedLlm::new(vec![]));
        let s = Summarizer::new(llm.clone(), limiter(1_000_000));

        let err = s.summarize_article("   tiny page   ", "https://x.test/a", None).await.unwrap_err();

        assert_eq!(err.kind, ErrorCode::TokenLimitExceeded);
        assert!(err.fallback.is_none());
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn empty_response_is_not_retried() {
        let llm = Arc::new(ScriptedLlm::new(vec![ok("   ", Some(10)), ok("late", Some(10))]));
        let limiter = limiter(1_000_000);
        let s = Summarizer::new(llm.clone(), limiter.clone());

        let err = s.summarize_article(&page(), "https://x.test/a", None).await.unwrap_err();

        assert_eq!(err.kind, ErrorCode::GeminiError);
        assert_eq!(llm.calls(), 1);
        assert_eq!(limiter.current_stats().await.requests_used, 0);
    }

    #[tokio::test]
    async fn rate_limits_are_retried_with_backoff() {
        let llm = Arc::new(ScriptedLlm::new(vec![quota(), quota(), ok("Finally.", Some(50))]));
        let s = Summarizer::new(llm.clone(), limiter(1_000_000)).with_backoff(fast_backoff());

        let out = s.summarize_article(&page(), "https://x.test/a", None).await.unwrap();

        assert_eq!(out.text, "Finally.");
        assert_eq!(llm.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_backoff_uses_five_second_base() {
        let llm = Arc::new(ScriptedLlm::new(vec![quota(), quota(), ok("Finally.", Some(50))]));
        let s = Summarizer::new(llm.clone(), limiter(1_000_000));
        let started = tokio::time::Instant::now();

        s.summarize_article(&page(), "https://x.test/a", None).await.unwrap();

        assert!(started.elapsed() >= Duration::from_secs(15));
    }

    #[tokio::test]
    async fn exhausted_retries_carry_raw_content() {
        let script = (0..4).map(|_| quota()).collect();
        let llm = Arc::new(ScriptedLlm::new(script));
        let s = Summarizer::new(llm.clone(), limiter(1_000_000))
            .with_max_retries(3)
            .with_backoff(fast_backoff());
        let content = page();

        let err = s.summarize_article(&content, "https://x.test/a", None).await.unwrap_err();

        assert_eq!(llm.calls(), 4);
        assert_eq!(err.kind, ErrorCode::RateLimitExceeded);
        let fallback = err.fallback.unwrap();
        assert!(fallback.starts_with(RATE_LIMITED_PREFIX));
        assert!(fallback.ends_with("..."));
        assert_eq!(
            char_len(&fallback),
            char_len(RATE_LIMITED_PREFIX) + FALLBACK_CHARS.min(char_len(&content)) + 3
        );
    }

    #[tokio::test]
    async fn unbounded_retry_setting_still_runs() {
        let llm = Arc::new(ScriptedLlm::new(vec![quota(), ok("Rates held.", Some(10))]));
        let s = Summarizer::new(llm.clone(), limiter(1_000_000))
            .with_max_retries(u32::MAX)
            .with_backoff(fast_backoff());

        let out = s.summarize_article(&page(), "https://x.test/a", None).await.unwrap();

        assert_eq!(out.text, "Rates held.");
        assert_eq!(llm.calls(), 2);
    }

    #[tokio::test]
    async fn token_limit_errors_stop_immediately() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            Err(unstructured("input token count exceeds limit")),
            ok("never", Some(1)),
        ]));
        let s = Summarizer::new(llm.clone(), limiter(1_000_000)).with_backoff(fast_backoff());

        let err = s.summarize_article(&page(), "https://x.test/a", None).await.unwrap_err();

        assert_eq!(err.kind, ErrorCode::TokenLimitExceeded);
        assert_eq!(llm.calls(), 1);
        let fallback = err.fallback.unwrap();
        assert!(fallback.starts_with(FALLBACK_PREFIX));
        assert!(!fallback.contains("API limits"));
    }

    #[tokio::test]
    async fn estimate_above_window_is_a_token_limit_failure() {
        let llm = Arc::new(ScriptedLlm::new(vec![ok("never", Some(1))]));
        let s = Summarizer::new(llm.clone(), limiter(100));

        let err = s.summarize_article(&page(), "https://x.test/a", None).await.unwrap_err();

        assert_eq!(err.kind, ErrorCode::TokenLimitExceeded);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn long_content_is_capped_before_prompting() {
        let llm = Arc::new(ScriptedLlm::new(vec![ok("Short.", Some(1))]));
        let s = Summarizer::new(llm.clone(), limiter(1_000_000))
            .with_prompt(PromptTemplate::new("{content}").unwrap());

        s.summarize_article(&"x".repeat(60_000), "https://x.test/a", None).await.unwrap();

        assert_eq!(char_len(&llm.prompts()[0]), MAX_CONTENT_CHARS);
    }

    #[tokio::test]
    async fn permit_is_released_after_failure() {
        let llm = Arc::new(ScriptedLlm::new(vec![Err(LlmError::MissingApiKey)]));
        let limiter = limiter(1_000_000);
        let s = Summarizer::new(llm, limiter.clone());

        let err = s.summarize_article(&page(), "https://x.test/a", None).await.unwrap_err();

        assert_eq!(err.kind, ErrorCode::GeminiError);
        assert_eq!(limiter.available_permits(), 2);
    }
}
