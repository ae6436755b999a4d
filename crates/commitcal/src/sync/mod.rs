//! Commit sync: freshness, windowing and orchestration.
//!
//! # Module Structure
//!
//! - [`types`] - Options, reports and results: `SyncOptions`, `SyncReport`,
//!   `BatchSyncReport`, constants
//! - [`progress`] - Progress reporting: `SyncProgress`, `ProgressCallback`, `emit()`
//! - [`window`] - `TimeWindowPlanner` splits a range into oldest-first windows
//! - [`freshness`] - `FreshnessEvaluator` decides whether cached data is trusted
//! - [`engine`] - `SyncOrchestrator` with `sync()` and `backfill_older()`
//!
//! # Example
//!
//! ```ignore
//! use commitcal::sync::{DateRange, SyncOrchestrator};
//!
//! let orchestrator = SyncOrchestrator::builder()
//!     .source(client)
//!     .store(store)
//!     .build()?;
//! let result = orchestrator
//!     .sync("user-1", &repos, DateRange::months_back(Utc::now(), 12), &cancel)
//!     .await?;
//! println!("{} commits, {} failed", result.commits.len(), result.report.failed());
//! ```

mod context;
pub mod engine;
pub mod freshness;
mod progress;
mod types;
pub mod window;

pub use context::{BuildError, SyncOrchestratorBuilder};
pub use engine::SyncOrchestrator;
pub use freshness::{Freshness, FreshnessEvaluator};
pub use window::{SyncWindow, TimeWindowPlanner};

// Re-export types
pub use types::{
    BatchSyncReport, DateRange, FailureKind, RepoOutcome, RepoSyncState, SyncError, SyncFailure,
    SyncOptions, SyncReport, SyncResult,
};

// Re-export constants
pub use types::{
    DEFAULT_CONCURRENCY, DEFAULT_MAX_COMMITS_PER_REPO, DEFAULT_MAX_PAGES_PER_WINDOW,
    DEFAULT_MONTHS_BACK, DEFAULT_PAGE_SIZE, DEFAULT_TTL_MINUTES, DEFAULT_WINDOW_MONTHS,
    INITIAL_BACKOFF_MS, MAX_BACKOFF_MS, MAX_TRANSIENT_RETRIES, RATE_LIMIT_COOLDOWN_SECS,
};

// Re-export progress types
pub use progress::{ProgressCallback, SyncProgress, emit};
