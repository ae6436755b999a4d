//! GitHub API error types.

use std::time::Duration;

use thiserror::Error;

use crate::http::HttpError;
use crate::platform::PlatformError;

/// Errors that can occur when talking to the GitHub API.
#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("GitHub API error ({status}): {message}")]
    Api {
        status: u16,
        message: String,
        /// Delay hint from `retry-after` or the rate limit reset header.
        retry_after: Option<Duration>,
        /// Value of `x-ratelimit-remaining`, when sent.
        remaining: Option<u64>,
    },

    #[error("Unexpected payload for {context}: {message}")]
    Decode { context: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<HttpError> for GitHubError {
    fn from(err: HttpError) -> Self {
        Self::Http(err.to_string())
    }
}

impl From<GitHubError> for PlatformError {
    fn from(err: GitHubError) -> Self {
        match err {
            GitHubError::Http(message) => PlatformError::network(message),
            GitHubError::Api {
                status,
                message,
                retry_after,
                remaining,
            } => PlatformError::from_status(status, message, retry_after, remaining),
            GitHubError::Decode { context, message } => PlatformError::malformed(context, message),
            GitHubError::Config(message) => PlatformError::internal(message),
        }
    }
}

// Re-export the shared short_error_message function from platform module
pub use crate::platform::short_error_message;
