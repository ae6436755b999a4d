//! Retry policy for remote commit fetches.
//!
//! Two failure classes are retried, each with its own schedule:
//!
//! - transient failures (network errors, 5xx, request timeouts) use
//!   exponential backoff with jitter, 1s doubling up to 30s, three retries;
//! - rate limiting waits out a fixed cooldown and retries once. A second rate
//!   limit is returned to the caller with its retry-after hint intact.
//!
//! Everything else (auth, not found, malformed payloads) fails on the first
//! attempt.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{ConstantBuilder, ExponentialBuilder, Retryable};

use crate::platform::{PlatformError, short_error_message};
use crate::sync::{
    INITIAL_BACKOFF_MS, MAX_BACKOFF_MS, MAX_TRANSIENT_RETRIES, ProgressCallback,
    RATE_LIMIT_COOLDOWN_SECS, SyncProgress, emit,
};

/// Configuration for retry operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// How long to wait after the remote reports rate limiting.
    pub rate_limit_cooldown: Duration,
    /// Retries granted after a rate limit before giving up.
    pub rate_limit_retries: usize,
    /// Retries granted for transient failures.
    pub transient_retries: usize,
    /// First transient backoff delay.
    pub min_delay: Duration,
    /// Cap on transient backoff delay.
    pub max_delay: Duration,
    /// Whether to add jitter to transient delays.
    pub with_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            rate_limit_cooldown: Duration::from_secs(RATE_LIMIT_COOLDOWN_SECS),
            rate_limit_retries: 1,
            transient_retries: MAX_TRANSIENT_RETRIES,
            min_delay: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_delay: Duration::from_millis(MAX_BACKOFF_MS),
            with_jitter: true,
        }
    }
}

impl RetryConfig {
    /// A configuration that never retries.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            rate_limit_retries: 0,
            transient_retries: 0,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_rate_limit_cooldown(mut self, cooldown: Duration) -> Self {
        self.rate_limit_cooldown = cooldown;
        self
    }

    #[must_use]
    pub fn with_transient_retries(mut self, retries: usize) -> Self {
        self.transient_retries = retries;
        self
    }

    /// Set whether to use jitter.
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.with_jitter = jitter;
        self
    }

    /// Exponential backoff used for transient failures.
    #[must_use]
    pub fn transient_backoff(&self) -> ExponentialBuilder {
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.transient_retries);

        if self.with_jitter {
            builder = builder.with_jitter();
        }

        builder
    }

    /// Fixed cooldown used after rate limiting.
    #[must_use]
    pub fn rate_limit_backoff(&self) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(self.rate_limit_cooldown)
            .with_max_times(self.rate_limit_retries)
    }
}

/// Wraps remote calls with the retry schedule from a [`RetryConfig`].
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `operation` until it succeeds or fails in a way that is not retried.
    ///
    /// `label` names the call in progress events and logs, e.g.
    /// `"owner/repo Jan 2024 - Mar 2024 p3"`. Each retry emits either
    /// [`SyncProgress::TransientRetry`] or [`SyncProgress::RateLimitBackoff`].
    pub async fn execute<T, F, Fut>(
        &self,
        label: &str,
        on_progress: Option<&ProgressCallback>,
        operation: F,
    ) -> Result<T, PlatformError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, PlatformError>>,
    {
        let counter = AtomicU32::new(0);

        let attempt = &counter;
        let operation = &operation;
        let config = &self.config;

        let with_transient_retry = move || async move {
            (|| {
                attempt.fetch_add(1, Ordering::SeqCst);
                operation()
            })
            .retry(config.transient_backoff())
            .when(PlatformError::is_transient)
            .notify(|err, dur| {
                let current = attempt.load(Ordering::SeqCst);
                let error = short_error_message(err);
                tracing::debug!(
                    "Transient failure on {}, retrying in {:?} (attempt {}): {}",
                    label,
                    dur,
                    current,
                    error
                );
                emit(
                    on_progress,
                    SyncProgress::TransientRetry {
                        label: label.to_string(),
                        attempt: current,
                        delay_ms: duration_ms(dur),
                        error,
                    },
                );
            })
            .await
        };

        with_transient_retry
            .retry(self.config.rate_limit_backoff())
            .when(PlatformError::is_rate_limited)
            .notify(|err, dur| {
                let current = attempt.load(Ordering::SeqCst);
                tracing::warn!(
                    "Rate limited on {}, cooling down for {:?} (attempt {}): {}",
                    label,
                    dur,
                    current,
                    short_error_message(err)
                );
                emit(
                    on_progress,
                    SyncProgress::RateLimitBackoff {
                        label: label.to_string(),
                        retry_after_ms: duration_ms(dur),
                        attempt: current,
                    },
                );
            })
            .await
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
