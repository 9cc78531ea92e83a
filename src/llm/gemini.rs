use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use super::{ApiErrorBody, GenerateRequest, GenerateResponse, LlmClient, LlmError};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";
const DEFAULT_TEMPERATURE: f32 = 0.3;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Clone, Debug)]
pub struct GeminiClientConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub default_model: String,
    pub default_temperature: f32,
    pub timeout: Duration,
}

impl Default for GeminiClientConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: std::env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            default_temperature: DEFAULT_TEMPERATURE,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl GeminiClientConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(base) = std::env::var("GEMINI_BASE_URL") {
            cfg.base_url = base;
        }
        if let Ok(timeout) = std::env::var("GEMINI_TIMEOUT_SECS") {
            if let Ok(parsed) = timeout.parse::<u64>() {
                cfg.timeout = Duration::from_secs(parsed);
            }
        }
        cfg
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    http: HttpClient,
    cfg: GeminiClientConfig,
}

impl GeminiClient {
    pub fn new(cfg: GeminiClientConfig) -> Result<Self, LlmError> {
        let http = HttpClient::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(LlmError::from_reqwest)?;
        Ok(Self { http, cfg })
    }

    pub fn model(&self) -> &str {
        &self.cfg.default_model
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.cfg.base_url.trim_end_matches('/'),
            model
        )
    }

    fn build_api_request(&self, req: &GenerateRequest) -> ApiGenerateRequest {
        ApiGenerateRequest {
            contents: vec![ApiContent {
                role: Some("user".to_string()),
                parts: vec![ApiPart {
                    text: Some(req.prompt.clone()),
                }],
            }],
            generation_config: ApiGenerationConfig {
                temperature: req.temperature.unwrap_or(self.cfg.default_temperature),
                max_output_tokens: req.max_output_tokens,
            },
        }
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, LlmError> {
        if request.prompt.trim().is_empty() {
            return Err(LlmError::EmptyPrompt);
        }
        let api_key = self.cfg.api_key.clone().ok_or(LlmError::MissingApiKey)?;
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.cfg.default_model.clone());
        let api_request = self.build_api_request(&request);

        let response = self
            .http
            .post(self.endpoint(&model))
            .header("x-goog-api-key", api_key)
            .json(&api_request)
            .send()
            .await
            .map_err(LlmError::from_reqwest)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(LlmError::from_reqwest)?;

        if !status.is_success() {
            let api_err = serde_json::from_slice::<ApiErrorEnvelope>(&bytes)
                .ok()
                .map(|env| env.error);
            return Err(LlmError::Api {
                status,
                error: api_err.unwrap_or_default(),
            });
        }

        let parsed: ApiGenerateResponse = serde_json::from_slice(&bytes)?;

        let text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default();

        Ok(GenerateResponse {
            text,
            total_tokens: parsed.usage_metadata.and_then(|usage| usage.total_token_count),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerateRequest {
    contents: Vec<ApiContent>,
    generation_config: ApiGenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<ApiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerateResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    usage_metadata: Option<ApiUsage>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiCandidate {
    content: Option<ApiContent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUsage {
    total_token_count: Option<u32>,
}
