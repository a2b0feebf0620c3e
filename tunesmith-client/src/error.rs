//! Error types for tunesmith-client
//!
//! Every upstream failure is surfaced as an [`ApiError`] carrying a numeric
//! code and a human-readable message. Code `0` means no HTTP status was
//! available (network failure or malformed payload).

use thiserror::Error;

/// Message used when the upstream rejects a call without saying why
pub const DEFAULT_REJECTION_MESSAGE: &str = "request failed";

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// No response received (connect failure, timeout, DNS)
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx status, or a business-error code inside a 2xx body
    #[error("{message}")]
    Upstream {
        code: u16,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// Response arrived but lacks fields we rely on
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// No credential stored while the call needs one
    #[error("Not authenticated: set an API key first")]
    Unauthenticated,

    /// Local storage failure
    #[error(transparent)]
    Storage(#[from] tunesmith_common::Error),
}

impl ApiError {
    /// Numeric code for display and scripting
    pub fn code(&self) -> u16 {
        match self {
            ApiError::Upstream { code, .. } => *code,
            ApiError::Unauthenticated => 401,
            ApiError::Network(_) | ApiError::Malformed(_) | ApiError::Storage(_) => 0,
        }
    }

    /// Upstream rejection with an optional message, falling back to a default
    pub fn upstream(code: u16, message: Option<&str>) -> Self {
        Self::upstream_with_data(code, message, None)
    }

    /// Upstream rejection keeping the decoded error body
    pub fn upstream_with_data(
        code: u16,
        message: Option<&str>,
        data: Option<serde_json::Value>,
    ) -> Self {
        let message = message
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_REJECTION_MESSAGE)
            .to_string();
        ApiError::Upstream {
            code,
            message,
            data,
        }
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(ApiError::Network("down".into()).code(), 0);
        assert_eq!(ApiError::Malformed("no data".into()).code(), 0);
        assert_eq!(ApiError::Unauthenticated.code(), 401);
        assert_eq!(ApiError::upstream(429, Some("slow down")).code(), 429);
    }

    #[test]
    fn test_upstream_default_message() {
        let err = ApiError::upstream(500, Some("   "));
        assert_eq!(err.to_string(), DEFAULT_REJECTION_MESSAGE);

        let err = ApiError::upstream(400, Some("prompt too long"));
        assert_eq!(err.to_string(), "prompt too long");
    }
}
