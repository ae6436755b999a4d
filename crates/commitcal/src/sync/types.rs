//! Sync options, per-repository reports and batch results.

use std::fmt;

use chrono::{DateTime, Duration, Months, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::entity::commit::Model as CommitModel;
use crate::entity::repository::Model as RepositoryModel;
use crate::platform::{MAX_PAGE_SIZE, PlatformError, short_error_message};
use crate::store::StoreError;

/// Commits requested per remote page.
pub const DEFAULT_PAGE_SIZE: u32 = MAX_PAGE_SIZE;

/// Safety cap on pages walked within one window.
pub const DEFAULT_MAX_PAGES_PER_WINDOW: u32 = 50;

/// Cap on commits fetched per repository in one run.
pub const DEFAULT_MAX_COMMITS_PER_REPO: usize = 5_000;

/// Repositories fetched concurrently.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Minutes a successful sync stays fresh.
pub const DEFAULT_TTL_MINUTES: i64 = 30;

/// Width of one sync window in months.
pub const DEFAULT_WINDOW_MONTHS: u32 = 2;

/// History covered by a sync when no range is given.
pub const DEFAULT_MONTHS_BACK: u32 = 12;

/// Initial transient backoff delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 1_000;

/// Maximum transient backoff delay in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 30_000;

/// Retries for network errors and 5xx responses.
pub const MAX_TRANSIENT_RETRIES: usize = 3;

/// Cooldown after the remote reports rate limiting.
pub const RATE_LIMIT_COOLDOWN_SECS: u64 = 60;

/// Options for a sync or backfill run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Commits per page, at most [`MAX_PAGE_SIZE`].
    pub page_size: u32,
    /// Pages walked per window before giving up on reaching the end.
    pub max_pages_per_window: u32,
    /// Commits fetched per repository before stopping. `None` disables the cap.
    pub max_commits_per_repo: Option<usize>,
    /// Repositories fetched concurrently.
    pub concurrency: usize,
    /// How long a successful sync keeps a repository fresh.
    pub ttl: Duration,
    /// Width of one window.
    pub window_months: u32,
    /// Refetch every repository regardless of freshness.
    pub force_refresh: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_pages_per_window: DEFAULT_MAX_PAGES_PER_WINDOW,
            max_commits_per_repo: Some(DEFAULT_MAX_COMMITS_PER_REPO),
            concurrency: DEFAULT_CONCURRENCY,
            ttl: Duration::minutes(DEFAULT_TTL_MINUTES),
            window_months: DEFAULT_WINDOW_MONTHS,
            force_refresh: false,
        }
    }
}

impl SyncOptions {
    #[must_use]
    pub fn with_force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }

    /// Clamp every field into its valid range.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.page_size = self.page_size.clamp(1, MAX_PAGE_SIZE);
        self.max_pages_per_window = self.max_pages_per_window.max(1);
        self.concurrency = self.concurrency.max(1);
        self.window_months = self.window_months.max(1);
        if self.ttl < Duration::zero() {
            self.ttl = Duration::zero();
        }
        self
    }
}

/// Inclusive range of author dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, SyncError> {
        if start > end {
            return Err(SyncError::InvalidRange {
                message: format!(
                    "start {} is after end {}",
                    start.to_rfc3339(),
                    end.to_rfc3339()
                ),
            });
        }
        Ok(Self { start, end })
    }

    /// The `months` months ending at `now`.
    pub fn months_back(now: DateTime<Utc>, months: u32) -> Self {
        let start = now
            .checked_sub_months(Months::new(months))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self { start, end: now }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

/// Where a repository is in its sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoSyncState {
    Idle,
    CheckingFreshness,
    ServedFromCache,
    Fetching,
    Storing,
    Done,
    Failed,
    Cancelled,
    Skipped,
}

impl RepoSyncState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::ServedFromCache | Self::Done | Self::Failed | Self::Cancelled | Self::Skipped
        )
    }
}

/// Final outcome for one repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoOutcome {
    /// Fresh; no remote calls were made.
    ServedFromCache,
    /// Fetched from the remote and stored.
    Synced,
    Failed,
    /// Stopped by cancellation before finishing.
    Cancelled,
    /// Nothing to do, e.g. a backfill with no gap.
    Skipped,
}

impl RepoOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, Self::ServedFromCache | Self::Synced | Self::Skipped)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ServedFromCache => "served_from_cache",
            Self::Synced => "synced",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for RepoOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a per-repository failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Auth,
    RateLimit,
    Network,
    MalformedResponse,
    Store,
    Remote,
    Internal,
}

/// Why a repository failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Seconds to wait before retrying, when the remote rate limited us.
    pub retry_after_secs: Option<u64>,
    /// The stored credentials were rejected and must be replaced.
    pub requires_reauth: bool,
}

impl SyncFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after_secs: None,
            requires_reauth: false,
        }
    }
}

impl From<&PlatformError> for SyncFailure {
    fn from(err: &PlatformError) -> Self {
        let kind = match err {
            PlatformError::AuthRequired => FailureKind::Auth,
            PlatformError::Api { status: 403, .. } => FailureKind::Auth,
            PlatformError::RateLimited { .. } => FailureKind::RateLimit,
            PlatformError::Network { .. } => FailureKind::Network,
            PlatformError::MalformedResponse { .. } => FailureKind::MalformedResponse,
            PlatformError::Api { .. } | PlatformError::NotFound { .. } => FailureKind::Remote,
            PlatformError::Cancelled | PlatformError::Internal { .. } => FailureKind::Internal,
        };
        Self {
            kind,
            message: short_error_message(err),
            retry_after_secs: err.retry_after().map(|d| d.as_secs()),
            requires_reauth: err.is_auth(),
        }
    }
}

impl From<&StoreError> for SyncFailure {
    fn from(err: &StoreError) -> Self {
        Self::new(FailureKind::Store, short_error_message(err))
    }
}

impl fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Outcome of one repository within a batch.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub repository_id: Uuid,
    pub full_name: String,
    pub outcome: RepoOutcome,
    /// Commits received from the remote.
    pub commits_fetched: usize,
    /// Distinct commits written to the cache.
    pub commits_stored: u64,
    /// Windows walked to completion.
    pub windows_completed: usize,
    pub windows_total: usize,
    pub error: Option<SyncFailure>,
}

impl SyncReport {
    pub(crate) fn new(repo: &RepositoryModel, outcome: RepoOutcome) -> Self {
        Self {
            repository_id: repo.id,
            full_name: repo.full_name(),
            outcome,
            commits_fetched: 0,
            commits_stored: 0,
            windows_completed: 0,
            windows_total: 0,
            error: None,
        }
    }

    pub(crate) fn failed(repo: &RepositoryModel, failure: SyncFailure) -> Self {
        Self {
            error: Some(failure),
            ..Self::new(repo, RepoOutcome::Failed)
        }
    }

    /// Mark the repository failed, keeping the counts gathered so far.
    pub(crate) fn fail(&mut self, failure: SyncFailure) {
        self.outcome = RepoOutcome::Failed;
        self.error = Some(failure);
    }

    pub fn requires_reauth(&self) -> bool {
        self.error.as_ref().is_some_and(|e| e.requires_reauth)
    }
}

/// Per-repository reports for a whole batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSyncReport {
    pub reports: Vec<SyncReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchSyncReport {
    fn count(&self, outcome: RepoOutcome) -> usize {
        self.reports.iter().filter(|r| r.outcome == outcome).count()
    }

    pub fn synced(&self) -> usize {
        self.count(RepoOutcome::Synced)
    }

    pub fn served_from_cache(&self) -> usize {
        self.count(RepoOutcome::ServedFromCache)
    }

    pub fn failed(&self) -> usize {
        self.count(RepoOutcome::Failed)
    }

    pub fn cancelled(&self) -> usize {
        self.count(RepoOutcome::Cancelled)
    }

    pub fn skipped(&self) -> usize {
        self.count(RepoOutcome::Skipped)
    }

    pub fn successful(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_success()).count()
    }

    pub fn total_fetched(&self) -> usize {
        self.reports.iter().map(|r| r.commits_fetched).sum()
    }

    pub fn total_stored(&self) -> u64 {
        self.reports.iter().map(|r| r.commits_stored).sum()
    }

    /// Whether any repository was fetched from the remote, even partially.
    pub fn touched_remote(&self) -> bool {
        self.reports.iter().any(|r| {
            !matches!(
                r.outcome,
                RepoOutcome::ServedFromCache | RepoOutcome::Skipped
            )
        })
    }

    pub fn requires_reauth(&self) -> bool {
        self.reports.iter().any(SyncReport::requires_reauth)
    }

    pub fn report_for(&self, full_name: &str) -> Option<&SyncReport> {
        self.reports.iter().find(|r| r.full_name == full_name)
    }
}

/// Commits for the requested range plus the batch report.
#[derive(Debug, Clone)]
pub struct SyncResult {
    /// Every cached commit in the range after the sync, newest first.
    pub commits: Vec<CommitModel>,
    pub report: BatchSyncReport,
}

/// Errors that abort a whole call.
///
/// `sync` and `backfill_older` only fail with [`SyncError::AuthRequired`];
/// per-repository failures, including cache reads and writes, land in
/// [`SyncReport::error`]. `Store` and `Remote` come from the service calls
/// around a batch, such as listing or discovering repositories.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Stale repositories need fetching but no credentials are available.
    #[error("Authentication required")]
    AuthRequired,

    #[error("Invalid date range: {message}")]
    InvalidRange { message: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A remote call outside any per-repository sync failed.
    #[error(transparent)]
    Remote(#[from] PlatformError),
}

impl SyncError {
    pub fn requires_reauth(&self) -> bool {
        match self {
            Self::AuthRequired => true,
            Self::Remote(e) => e.is_auth(),
            _ => false,
        }
    }
}
