//! Builder for [`SyncOrchestrator`].
//!
//! # Example
//!
//! ```ignore
//! use commitcal::sync::{SyncOptions, SyncOrchestrator};
//!
//! let orchestrator = SyncOrchestrator::builder()
//!     .source(github_client)
//!     .store(CommitStore::new(db))
//!     .options(SyncOptions::default())
//!     .progress(callback)
//!     .build()?;
//!
//! let result = orchestrator.sync("user-1", &repos, range, &cancel).await?;
//! ```

use std::sync::Arc;

use crate::platform::CommitSource;
use crate::retry::{RetryConfig, RetryPolicy};
use crate::store::CommitStore;

use super::engine::SyncOrchestrator;
use super::progress::ProgressCallback;
use super::types::SyncOptions;

/// Error type for orchestrator construction.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Missing required field in builder.
    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },
}

/// Builder for creating a [`SyncOrchestrator`].
pub struct SyncOrchestratorBuilder<S> {
    source: Option<Arc<S>>,
    store: Option<CommitStore>,
    retry: Option<RetryConfig>,
    options: Option<SyncOptions>,
    progress: Option<Arc<ProgressCallback>>,
}

impl<S> Default for SyncOrchestratorBuilder<S> {
    fn default() -> Self {
        Self {
            source: None,
            store: None,
            retry: None,
            options: None,
            progress: None,
        }
    }
}

impl<S: CommitSource + 'static> SyncOrchestratorBuilder<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the commit source.
    pub fn source(mut self, source: S) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Set a commit source that is shared with other owners.
    pub fn shared_source(mut self, source: Arc<S>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn store(mut self, store: CommitStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Override the retry schedule for remote calls.
    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = Some(config);
        self
    }

    pub fn options(mut self, options: SyncOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Set the progress callback.
    pub fn progress(mut self, callback: Arc<ProgressCallback>) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Build the orchestrator. Options are normalized on the way in.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::MissingField` if the source or store is not set.
    pub fn build(self) -> Result<SyncOrchestrator<S>, BuildError> {
        let source = self
            .source
            .ok_or(BuildError::MissingField { field: "source" })?;
        let store = self
            .store
            .ok_or(BuildError::MissingField { field: "store" })?;

        Ok(SyncOrchestrator {
            source,
            store,
            retry: RetryPolicy::new(self.retry.unwrap_or_default()),
            options: self.options.unwrap_or_default().normalized(),
            progress: self.progress,
        })
    }
}

impl<S: CommitSource + 'static> SyncOrchestrator<S> {
    /// Create a new builder.
    pub fn builder() -> SyncOrchestratorBuilder<S> {
        SyncOrchestratorBuilder::new()
    }
}
