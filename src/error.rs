use serde::Serialize;

/// Machine-readable codes surfaced in tool responses and batch reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidInput,
    InvalidUrl,
    CrawlTimeout,
    CrawlError,
    RateLimitExceeded,
    GeminiError,
    TokenLimitExceeded,
    NetworkError,
    UnknownError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::InvalidUrl => "INVALID_URL",
            ErrorCode::CrawlTimeout => "CRAWL_TIMEOUT",
            ErrorCode::CrawlError => "CRAWL_ERROR",
            ErrorCode::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorCode::GeminiError => "GEMINI_ERROR",
            ErrorCode::TokenLimitExceeded => "TOKEN_LIMIT_EXCEEDED",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_wire_code() {
        let value = serde_json::to_value(ErrorCode::TokenLimitExceeded).unwrap();
        assert_eq!(value, "TOKEN_LIMIT_EXCEEDED");
        assert_eq!(ErrorCode::CrawlTimeout.to_string(), "CRAWL_TIMEOUT");
    }
}
