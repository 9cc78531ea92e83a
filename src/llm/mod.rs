use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod gemini;

pub use gemini::{GeminiClient, GeminiClientConfig};

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, LlmError>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct GenerateRequest {
    pub model: Option<String>,
    pub prompt: String,
    pub max_output_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            model: None,
            prompt: prompt.into(),
            max_output_tokens: None,
            temperature: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GenerateResponse {
    pub text: String,
    /// Total tokens billed for the call, when the backend reports usage.
    pub total_tokens: Option<u32>,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("GEMINI_API_KEY is not set")]
    MissingApiKey,
    #[error("generate request requires a non-empty prompt")]
    EmptyPrompt,
    #[error("http error: {0}")]
    Http(#[source] reqwest::Error),
    #[error("request timed out")]
    Timeout,
    #[error("api error {status}: {}", error.message)]
    Api { status: StatusCode, error: ApiErrorBody },
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

impl LlmError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Http(err)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default = "unknown_message")]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

fn unknown_message() -> String {
    "unknown error".to_string()
}

impl Default for ApiErrorBody {
    fn default() -> Self {
        Self {
            code: None,
            message: unknown_message(),
            status: None,
        }
    }
}
