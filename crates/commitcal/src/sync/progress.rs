//! Progress reporting for sync and backfill runs.
//!
//! Events are purely observational. A UI renders them, the CLI logs them, and
//! nothing in the engine depends on whether a callback is installed.

use super::types::{RepoOutcome, RepoSyncState};

/// Progress events emitted during sync operations.
///
/// `repo` fields carry the `owner/name` of the repository the event concerns.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// Freshness has been evaluated for every requested repository.
    SyncPlanned {
        /// Repositories in the request.
        repositories: usize,
        /// Repositories served from the cache without remote calls.
        fresh: usize,
        /// Repositories that will be fetched.
        stale: usize,
    },

    /// A repository moved to a new state.
    RepoState {
        repo: String,
        state: RepoSyncState,
    },

    /// Starting a time window for a repository.
    FetchingWindow {
        repo: String,
        /// Human-readable window label, e.g. `"Jan 2024 - Mar 2024"`.
        window: String,
        /// Window index (1-indexed, oldest first).
        index: usize,
        /// Number of windows planned for this repository.
        total: usize,
    },

    /// Fetched a page of commits.
    FetchedPage {
        repo: String,
        window: String,
        /// Page number (1-indexed).
        page: u32,
        /// Number of commits on this page.
        count: usize,
        /// Running total of commits fetched for the repository.
        total_so_far: usize,
    },

    /// A window stopped paging because it hit the page cap.
    PageCapReached {
        repo: String,
        window: String,
        max_pages: u32,
    },

    /// A repository stopped fetching because it hit the commit cap.
    CommitCapReached { repo: String, max_commits: usize },

    /// A window's commits were written to the cache.
    CommitsStored {
        repo: String,
        window: String,
        /// Distinct commits written (inserted or refreshed).
        stored: u64,
    },

    /// A window was abandoned because the remote returned an unreadable page.
    WindowSkipped {
        repo: String,
        window: String,
        error: String,
    },

    /// Rate limited - waiting out the cooldown before retrying.
    RateLimitBackoff {
        /// Which call was rate limited.
        label: String,
        /// Milliseconds until retry.
        retry_after_ms: u64,
        /// Attempts made so far.
        attempt: u32,
    },

    /// A transient failure is being retried with backoff.
    TransientRetry {
        label: String,
        attempt: u32,
        delay_ms: u64,
        error: String,
    },

    /// A repository finished, successfully or not.
    RepoFinished {
        repo: String,
        outcome: RepoOutcome,
        fetched: usize,
        stored: u64,
    },

    /// A repository failed. Other repositories keep going.
    RepoFailed { repo: String, error: String },

    /// Every repository has reached a terminal state.
    SyncComplete {
        /// Repositories refreshed from the remote.
        synced: usize,
        /// Repositories served from the cache.
        cached: usize,
        failed: usize,
        cancelled: usize,
        skipped: usize,
    },
}

/// Callback for progress updates during sync operations.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}
