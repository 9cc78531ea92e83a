//! Scripted collaborators for pipeline tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::crawler::{FetchError, FetchResult, Fetcher, validate_url};
use crate::llm::{ApiErrorBody, GenerateRequest, GenerateResponse, LlmClient, LlmError};
use crate::summarizer::Backoff;

pub fn fast_backoff() -> Backoff {
    Backoff {
        rate_limit_base: Duration::from_millis(5),
        base: Duration::from_millis(1),
        max: Duration::from_millis(20),
    }
}

/// Replays queued responses in order, then fails every further call.
#[derive(Default)]
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<Result<GenerateResponse, LlmError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new(responses: Vec<Result<GenerateResponse, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always answers with `text`, reporting `tokens` of usage.
    pub fn answering(text: &str, tokens: u32, times: usize) -> Self {
        Self::new((0..times).map(|_| reply(text, tokens)).collect())
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

pub fn reply(text: &str, tokens: u32) -> Result<GenerateResponse, LlmError> {
    Ok(GenerateResponse {
        text: text.to_string(),
        total_tokens: Some(tokens),
    })
}

/// Backend error with no API status, so only its message can classify it.
pub fn unstructured(message: &str) -> LlmError {
    LlmError::Api {
        status: StatusCode::BAD_REQUEST,
        error: ApiErrorBody { code: None, message: message.to_string(), status: None },
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, LlmError> {
        self.prompts.lock().unwrap().push(request.prompt);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(LlmError::Api {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    error: ApiErrorBody { message: "scripted client has no response left".into(), ..Default::default() },
                })
            })
    }
}

#[derive(Clone)]
pub enum Page {
    Text(String),
    Fail(FetchError),
    /// Answers with the text after the delay.
    Slow(Duration, String),
    /// Never completes.
    Hang,
    Panic,
}

/// Serves fixed pages per URL; unknown URLs fail with a crawl error.
#[derive(Default)]
pub struct ScriptedFetcher {
    pages: HashMap<String, Page>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, page: Page) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    pub fn text(self, url: &str, text: impl Into<String>) -> Self {
        self.page(url, Page::Text(text.into()))
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str, _timeout: Duration, _max_retries: u32) -> FetchResult {
        validate_url(url)?;
        self.calls.lock().unwrap().push(url.to_string());
        match self.pages.get(url).cloned() {
            Some(Page::Text(text)) => Ok(text),
            Some(Page::Fail(err)) => Err(err),
            Some(Page::Slow(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            Some(Page::Hang) => std::future::pending().await,
            Some(Page::Panic) => panic!("scripted fetcher panic for {url}"),
            None => Err(FetchError::new(crate::error::ErrorCode::CrawlError, format!("no page for {url}"))),
        }
    }
}

/// Readable article body long enough to pass both content checks.
pub fn article(topic: &str) -> String {
    format!("{topic}: ").repeat(3)
        + &"Officials published new figures on Tuesday and analysts revised their forecasts. ".repeat(4)
}
