#![cfg(feature = "mcp-server")]

use serde::{Deserialize, Serialize};
use schemars::JsonSchema;

use crate::batch::{BatchRequest, DEFAULT_MAX_URLS, DEFAULT_TIMEOUT_SECS};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SummarizeWebParams {
    /// List of URLs to summarize. Each URL is crawled and summarized. Maximum 10 URLs per request.
    #[serde(default)]
    pub urls: Vec<String>,
    /// Optional list of titles corresponding to URLs. If provided, must match the length of urls.
    #[serde(default)]
    pub titles: Option<Vec<String>>,
    /// Maximum number of URLs to process (default: 10, max: 10)
    #[serde(default = "default_max_urls")]
    #[schemars(range(min = 1, max = 10))]
    pub max_urls: usize,
    /// Timeout in seconds for each URL crawl (default: 30)
    #[serde(default = "default_timeout_per_url")]
    #[schemars(range(min = 10, max = 120))]
    pub timeout_per_url: u64,
}

fn default_max_urls() -> usize { DEFAULT_MAX_URLS }
fn default_timeout_per_url() -> u64 { DEFAULT_TIMEOUT_SECS }

impl From<SummarizeWebParams> for BatchRequest {
    fn from(p: SummarizeWebParams) -> Self {
        BatchRequest {
            urls: p.urls,
            titles: p.titles,
            max_urls: p.max_urls,
            timeout_per_url: p.timeout_per_url,
        }
    }
}
