use std::time::Duration;

use reqwest::{Client, StatusCode};
use url::Url;

use super::FetchError;
use crate::error::ErrorCode;

pub(crate) struct Page {
    pub content_type: String,
    pub body: String,
}

/// Failure of a single attempt, tagged with whether another attempt may help.
pub(crate) struct AttemptError {
    pub error: FetchError,
    pub retryable: bool,
}

pub(crate) async fn fetch_page(client: &Client, url: &Url, timeout: Duration) -> Result<Page, AttemptError> {
    let response = client
        .get(url.clone())
        .timeout(timeout)
        .send()
        .await
        .map_err(|err| classify(err, timeout))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AttemptError {
            error: FetchError::new(ErrorCode::CrawlError, format!("HTTP {status} from {url}")),
            retryable: status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS,
        });
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();
    let body = response.text().await.map_err(|err| classify(err, timeout))?;
    Ok(Page { content_type, body })
}

fn classify(err: reqwest::Error, timeout: Duration) -> AttemptError {
    if err.is_timeout() {
        AttemptError {
            error: FetchError::new(ErrorCode::CrawlTimeout, format!("Timeout after {}s", timeout.as_secs_f64())),
            retryable: true,
        }
    } else if err.is_connect() {
        AttemptError {
            error: FetchError::new(ErrorCode::NetworkError, format!("Connection failed: {err}")),
            retryable: true,
        }
    } else {
        AttemptError {
            error: FetchError::new(ErrorCode::CrawlError, format!("Request failed: {err}")),
            retryable: err.is_request() || err.is_body(),
        }
    }
}
