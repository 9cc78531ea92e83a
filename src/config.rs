use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::batch::{Pipeline, PipelineConfig, DEFAULT_TIMEOUT_SECS};
use crate::crawler::HttpFetcher;
use crate::llm::{GeminiClient, GeminiClientConfig};
use crate::ratelimit::{RateLimiter, RateLimiterConfig};
use crate::summarizer::{PromptTemplate, Summarizer, DEFAULT_MAX_RETRIES};

/// Process-wide settings read once at startup.
#[derive(Clone, Debug)]
pub struct Settings {
    pub gemini: GeminiClientConfig,
    pub limiter: RateLimiterConfig,
    pub pipeline: PipelineConfig,
    pub crawl_timeout_secs: u64,
    pub summarizer_max_retries: u32,
    pub prompt_file: Option<PathBuf>,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(GeminiClientConfig::from_env(), |key| std::env::var(key).ok())
    }

    fn from_lookup(gemini: GeminiClientConfig, get: impl Fn(&str) -> Option<String>) -> Self {
        let limiter_defaults = RateLimiterConfig::default();
        let pipeline_defaults = PipelineConfig::default();

        let max_concurrent = parse_or(&get, "MAX_CONCURRENT_REQUESTS", limiter_defaults.max_concurrent);
        let limiter = RateLimiterConfig {
            max_tokens_per_minute: parse_or(&get, "MAX_TOKENS_PER_MINUTE", limiter_defaults.max_tokens_per_minute),
            max_requests_per_minute: parse_or(&get, "MAX_REQUESTS_PER_MINUTE", limiter_defaults.max_requests_per_minute),
            max_concurrent,
            safety_margin: parse_or(&get, "RATE_LIMIT_SAFETY_MARGIN", limiter_defaults.safety_margin),
        };
        let pipeline = PipelineConfig {
            max_urls_per_request: parse_or(&get, "MAX_URLS_PER_REQUEST", pipeline_defaults.max_urls_per_request),
            max_concurrent_crawls: parse_or(&get, "MAX_CONCURRENT_CRAWLS", max_concurrent),
            crawl_max_retries: parse_or(&get, "CRAWL_MAX_RETRIES", pipeline_defaults.crawl_max_retries),
        };

        Self {
            gemini,
            limiter,
            pipeline,
            crawl_timeout_secs: parse_or(&get, "CRAWL_TIMEOUT_SECONDS", DEFAULT_TIMEOUT_SECS),
            summarizer_max_retries: parse_or(&get, "SUMMARIZER_MAX_RETRIES", DEFAULT_MAX_RETRIES),
            prompt_file: get("SUMMARIZER_PROMPT_FILE")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    pub fn prompt(&self) -> Result<PromptTemplate> {
        match &self.prompt_file {
            Some(path) => PromptTemplate::from_file(path),
            None => Ok(PromptTemplate::default()),
        }
    }

    /// Builds the shared limiter, the backend client and the fetcher, and wires
    /// them into one pipeline.
    pub fn build_pipeline(&self) -> Result<Pipeline> {
        if self.gemini.api_key.is_none() {
            tracing::warn!("GEMINI_API_KEY is not set; every summarization will fail");
        }
        let limiter = RateLimiter::new(self.limiter.clone()).context("invalid rate limiter configuration")?;
        let client = GeminiClient::new(self.gemini.clone()).context("failed to build Gemini client")?;
        let model = client.model().to_string();
        let summarizer = Summarizer::new(Arc::new(client), Arc::new(limiter))
            .with_prompt(self.prompt()?)
            .with_max_retries(self.summarizer_max_retries);
        let fetcher = HttpFetcher::new().context("failed to build HTTP client")?;

        tracing::info!(
            model = %model,
            tokens_per_minute = self.limiter.max_tokens_per_minute,
            requests_per_minute = self.limiter.max_requests_per_minute,
            max_concurrent = self.limiter.max_concurrent,
            max_concurrent_crawls = self.pipeline.max_concurrent_crawls,
            "pipeline ready"
        );
        Ok(Pipeline::new(Arc::new(fetcher), Arc::new(summarizer), self.pipeline.clone()))
    }
}

fn parse_or<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match get(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "ignoring unparseable setting");
            default
        }),
    }
}
