use std::time::Duration;

use reqwest::StatusCode;

use crate::error::ErrorCode;
use crate::llm::LlmError;

/// What went wrong with one generate call, as far as retrying is concerned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureClass {
    RateLimit,
    TokenLimit,
    Network,
    Backend { retryable: bool },
}

impl FailureClass {
    pub fn code(&self) -> ErrorCode {
        match self {
            FailureClass::RateLimit => ErrorCode::RateLimitExceeded,
            FailureClass::TokenLimit => ErrorCode::TokenLimitExceeded,
            FailureClass::Network => ErrorCode::NetworkError,
            FailureClass::Backend { .. } => ErrorCode::GeminiError,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            FailureClass::RateLimit | FailureClass::Network => true,
            FailureClass::TokenLimit => false,
            FailureClass::Backend { retryable } => *retryable,
        }
    }
}

/// Structured signals first; message heuristics only when the error carries none.
pub fn classify(err: &LlmError) -> FailureClass {
    match err {
        LlmError::Api { status, error } => {
            let api_status = error.status.as_deref().unwrap_or_default();
            if *status == StatusCode::TOO_MANY_REQUESTS || api_status == "RESOURCE_EXHAUSTED" {
                FailureClass::RateLimit
            } else if api_status == "INVALID_ARGUMENT" && mentions_length(&error.message) {
                FailureClass::TokenLimit
            } else if status.is_server_error() {
                FailureClass::Backend { retryable: true }
            } else if error.status.is_none() {
                classify_message(&error.message)
            } else {
                FailureClass::Backend { retryable: false }
            }
        }
        LlmError::Timeout | LlmError::Http(_) => FailureClass::Network,
        LlmError::MissingApiKey | LlmError::EmptyPrompt => FailureClass::Backend { retryable: false },
        LlmError::Decode(_) => FailureClass::Backend { retryable: true },
    }
}

fn classify_message(message: &str) -> FailureClass {
    let lower = message.to_lowercase();
    let squashed: String = lower.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    if message.contains("429") || lower.contains("quota") || squashed.contains("resourceexhausted") {
        FailureClass::RateLimit
    } else if mentions_length(&lower) {
        FailureClass::TokenLimit
    } else {
        FailureClass::Backend { retryable: true }
    }
}

fn mentions_length(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("token") || lower.contains("length")
}

#[derive(Clone, Debug, PartialEq)]
pub struct Backoff {
    pub rate_limit_base: Duration,
    pub base: Duration,
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            rate_limit_base: Duration::from_secs(5),
            base: Duration::from_secs(1),
            max: Duration::from_secs(60),
        }
    }
}

impl Backoff {
    /// Delay after the failed attempt `attempt` (zero-based).
    pub fn delay(&self, class: FailureClass, attempt: u32) -> Duration {
        let base = match class {
            FailureClass::RateLimit => self.rate_limit_base,
            _ => self.base,
        };
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        base.checked_mul(factor).unwrap_or(self.max).min(self.max)
    }
}

/// Retry loop states of one summarization.
#[derive(Debug)]
pub enum RetryState<T, F> {
    Attempt(u32),
    Retrying { attempt: u32, delay: Duration },
    Done(T),
    Fatal(F),
    Exhausted(F),
}

/// Where a failed attempt leads.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Transition {
    Retry(Duration),
    Fatal,
    Exhausted,
}

pub fn after_failure(class: FailureClass, attempt: u32, max_retries: u32, backoff: &Backoff) -> Transition {
    if !class.is_retryable() {
        Transition::Fatal
    } else if attempt >= max_retries {
        Transition::Exhausted
    } else {
        Transition::Retry(backoff.delay(class, attempt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ApiErrorBody;
    use crate::testing::unstructured;

    fn api(status: StatusCode, api_status: Option<&str>, message: &str) -> LlmError {
        LlmError::Api {
            status,
            error: ApiErrorBody {
                code: Some(status.as_u16()),
                message: message.into(),
                status: api_status.map(str::to_string),
            },
        }
    }

    #[test]
    fn structured_errors_win_over_message() {
        let quota = api(StatusCode::TOO_MANY_REQUESTS, Some("RESOURCE_EXHAUSTED"), "slow down");
        assert_eq!(classify(&quota), FailureClass::RateLimit);

        let too_long = api(
            StatusCode::BAD_REQUEST,
            Some("INVALID_ARGUMENT"),
            "The input token count exceeds the maximum number of tokens allowed",
        );
        assert_eq!(classify(&too_long), FailureClass::TokenLimit);

        let bad_key = api(StatusCode::BAD_REQUEST, Some("INVALID_ARGUMENT"), "API key not valid");
        assert_eq!(classify(&bad_key), FailureClass::Backend { retryable: false });

        let outage = api(StatusCode::SERVICE_UNAVAILABLE, Some("UNAVAILABLE"), "try again");
        assert_eq!(classify(&outage), FailureClass::Backend { retryable: true });

        assert_eq!(classify(&LlmError::Timeout), FailureClass::Network);
    }

    #[test]
    fn unstructured_errors_fall_back_to_heuristics() {
        let cases = [
            ("429 Too Many Requests", FailureClass::RateLimit),
            ("Quota exceeded for project", FailureClass::RateLimit),
            ("google.api_core.exceptions.ResourceExhausted", FailureClass::RateLimit),
            ("Request payload exceeds max length", FailureClass::TokenLimit),
            ("too many tokens", FailureClass::TokenLimit),
            ("connection reset by peer", FailureClass::Backend { retryable: true }),
        ];
        for (message, expected) in cases {
            assert_eq!(classify(&unstructured(message)), expected, "{message}");
        }
    }

    #[test]
    fn codes_follow_class() {
        assert_eq!(FailureClass::RateLimit.code(), ErrorCode::RateLimitExceeded);
        assert_eq!(FailureClass::TokenLimit.code(), ErrorCode::TokenLimitExceeded);
        assert_eq!(FailureClass::Network.code(), ErrorCode::NetworkError);
        assert_eq!(FailureClass::Backend { retryable: true }.code(), ErrorCode::GeminiError);
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let b = Backoff::default();
        let secs = |class, attempt| b.delay(class, attempt).as_secs();

        assert_eq!(secs(FailureClass::RateLimit, 0), 5);
        assert_eq!(secs(FailureClass::RateLimit, 1), 10);
        assert_eq!(secs(FailureClass::RateLimit, 3), 40);
        assert_eq!(secs(FailureClass::RateLimit, 4), 60);
        assert_eq!(secs(FailureClass::Network, 0), 1);
        assert_eq!(secs(FailureClass::Network, 5), 32);
        assert_eq!(secs(FailureClass::Network, 6), 60);
        assert_eq!(secs(FailureClass::Network, 40), 60);
    }

    #[test]
    fn transitions_respect_retry_ceiling() {
        let b = Backoff::default();
        assert_eq!(after_failure(FailureClass::TokenLimit, 0, 10, &b), Transition::Fatal);
        assert_eq!(
            after_failure(FailureClass::RateLimit, 2, 10, &b),
            Transition::Retry(Duration::from_secs(20))
        );
        assert_eq!(after_failure(FailureClass::RateLimit, 10, 10, &b), Transition::Exhausted);
        assert_eq!(after_failure(FailureClass::Network, 0, 0, &b), Transition::Exhausted);
    }
}
