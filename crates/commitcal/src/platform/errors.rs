use std::time::Duration;

use thiserror::Error;

/// Errors raised at the remote API boundary.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// Non-success status that no other variant describes.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Rate limit exceeded. `retry_after` carries the server's hint when it sent one.
    #[error("Rate limit exceeded{}", retry_hint(.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    /// Missing, expired or rejected credentials.
    #[error("Authentication required")]
    AuthRequired,

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// Transport failure or timeout.
    #[error("Network error: {message}")]
    Network { message: String },

    /// The remote answered with a payload of unexpected shape.
    #[error("Malformed response from {context}: {message}")]
    MalformedResponse { context: String, message: String },

    #[error("Operation cancelled")]
    Cancelled,

    /// Client misconfiguration or an unexpected local failure.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(" (retry after {}s)", d.as_secs()),
        None => String::new(),
    }
}

impl PlatformError {
    #[inline]
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    #[inline]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    #[inline]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    #[inline]
    pub fn malformed(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            context: context.into(),
            message: message.into(),
        }
    }

    #[inline]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Classify a non-success HTTP status.
    ///
    /// 403 counts as a rate limit unless the server still reports remaining
    /// quota and the body does not mention rate limiting, in which case it is
    /// a permission failure and is returned as a plain `Api` error. A 403
    /// without quota headers is always a rate limit.
    pub fn from_status(
        status: u16,
        message: impl Into<String>,
        retry_after: Option<Duration>,
        remaining: Option<u64>,
    ) -> Self {
        let message = message.into();
        match status {
            401 => Self::AuthRequired,
            403 => {
                let mentions_limit = message.to_ascii_lowercase().contains("rate limit");
                if remaining.is_some_and(|r| r > 0) && !mentions_limit {
                    Self::Api { status, message }
                } else {
                    Self::RateLimited { retry_after }
                }
            }
            404 => Self::NotFound { resource: message },
            429 => Self::RateLimited { retry_after },
            _ => Self::Api { status, message },
        }
    }

    #[inline]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    #[inline]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::AuthRequired)
    }

    /// Whether a bounded backoff retry may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::Api { status, .. } => *status >= 500 || *status == 408,
            _ => false,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// First line of an error message, for progress output and report entries.
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

pub type Result<T> = std::result::Result<T, PlatformError>;
