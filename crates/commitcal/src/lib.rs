//! Commitcal - commit history ingestion and caching for calendar views.
//!
//! This library pulls commit history from a paginated, rate-limited hosting
//! API, caches it durably, and decides per repository whether the cache can
//! be served without another fetch.
//!
//! # Features
//!
//! - `github` - reqwest-backed HTTP transport and the GitHub commit source.
//! - `migrate` - Enables database migration support. When enabled, you can use
//!   [`connect_and_migrate`] to automatically run migrations on connection.
//! - `sqlite` - SQLite backend for the cache.
//!
//! # Example
//!
//! ```ignore
//! use commitcal::{connect_and_migrate, service::SyncService, store::CommitStore};
//! use commitcal::github::{GitHubClient, GitHubClientConfig};
//! use commitcal::sync::{DateRange, SyncOrchestrator};
//!
//! let db = connect_and_migrate("sqlite://commitcal.db?mode=rwc").await?;
//! let client = GitHubClient::new(Some(&token), GitHubClientConfig::default())?;
//! let service = SyncService::new(
//!     SyncOrchestrator::builder()
//!         .source(client)
//!         .store(CommitStore::new(Arc::new(db)))
//!         .build()?,
//! );
//!
//! let response = service
//!     .request_sync("user-1", DateRange::months_back(Utc::now(), 12), false, &cancel)
//!     .await?;
//! ```

pub mod db;
pub mod entity;
pub mod http;
pub mod platform;
pub mod retry;
pub mod service;
pub mod store;
pub mod sync;

#[cfg(feature = "github")]
pub mod github;

#[cfg(feature = "migrate")]
pub mod migration;

pub use db::connect;
#[cfg(feature = "migrate")]
pub use db::connect_and_migrate;
pub use entity::prelude::*;
pub use platform::{ApiRateLimiter, CommitSource, PlatformError, RemoteCommit, RepoRef, rate_limits};
pub use retry::{RetryConfig, RetryPolicy};
pub use service::{BackfillResponse, SyncResponse, SyncService};
pub use store::{CommitStore, StoreError};
pub use sync::{DateRange, SyncError, SyncOptions, SyncOrchestrator};
