//! Error types for metrics fetches.

use thiserror::Error;

/// Errors that can occur while fetching a block height series.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Transport-level failure (connect, TLS, body read).
    #[error("Request failed: {message}")]
    Request {
        /// Error message.
        message: String,
    },

    /// The request did not complete within the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// The endpoint answered with a non-success HTTP status.
    #[error("HTTP status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The body is not a valid query response document.
    #[error("Invalid response: {message}")]
    Decode {
        /// Error message.
        message: String,
    },

    /// The endpoint reported a query error.
    #[error("Upstream error ({error_type}): {message}")]
    Upstream {
        /// Prometheus error type.
        error_type: String,
        /// Error message.
        message: String,
    },

    /// The response decoded but its values are not usable block heights.
    #[error("Malformed series: {message}")]
    Malformed {
        /// Error message.
        message: String,
    },

    /// The configured endpoint is not a valid URL.
    #[error("Invalid URL: {message}")]
    InvalidUrl {
        /// Error message.
        message: String,
    },
}

impl FetchError {
    /// Create a request failed error.
    pub fn request<S: Into<String>>(message: S) -> Self {
        Self::Request {
            message: message.into(),
        }
    }

    /// Create a decode error.
    pub fn decode<S: Into<String>>(message: S) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a malformed series error.
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Short label used for logging and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Request { .. } => "request",
            FetchError::Timeout => "timeout",
            FetchError::Status { .. } => "status",
            FetchError::Decode { .. } => "decode",
            FetchError::Upstream { .. } => "upstream",
            FetchError::Malformed { .. } => "malformed",
            FetchError::InvalidUrl { .. } => "invalid_url",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return FetchError::Timeout;
        }
        if let Some(status) = err.status() {
            return FetchError::Status {
                status: status.as_u16(),
            };
        }
        FetchError::request(err.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::decode(err.to_string())
    }
}

/// Result type for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;
