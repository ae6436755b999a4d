//! Entry points for callers: calendar views, the CLI and scheduled jobs.
//!
//! [`SyncService`] resolves a user's tracked repositories, runs the
//! orchestrator and shapes the result for presentation. It holds no state of
//! its own beyond the orchestrator, so one instance can serve many concurrent
//! requests.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::entity::commit::Model as CommitModel;
use crate::entity::repository::Model as RepositoryModel;
use crate::platform::{CommitSource, MAX_PAGE_SIZE};
use crate::store::{CacheStats, CommitStore, RepositoryInput};
use crate::sync::{
    BatchSyncReport, DateRange, RepoOutcome, SyncError, SyncOrchestrator, SyncReport,
};

/// Pages of `/user/repos` walked by discovery.
pub const DISCOVERY_MAX_PAGES: u32 = 10;

/// Whether a response needed the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    /// Every repository was fresh.
    Cache,
    Remote,
}

/// Per-repository line of a sync response.
#[derive(Debug, Clone, Serialize)]
pub struct RepositoryStats {
    pub id: Uuid,
    pub full_name: String,
    pub outcome: RepoOutcome,
    pub commits_fetched: usize,
    pub commits_stored: u64,
    /// Commits of this repository in the response.
    pub commits_in_range: usize,
    pub error: Option<String>,
    pub requires_reauth: bool,
}

impl RepositoryStats {
    fn from_report(report: &SyncReport, commits: &[CommitModel]) -> Self {
        Self {
            id: report.repository_id,
            full_name: report.full_name.clone(),
            outcome: report.outcome,
            commits_fetched: report.commits_fetched,
            commits_stored: report.commits_stored,
            commits_in_range: commits
                .iter()
                .filter(|c| c.repository_id == report.repository_id)
                .count(),
            error: report.error.as_ref().map(|e| e.message.clone()),
            requires_reauth: report.requires_reauth(),
        }
    }
}

/// Totals across a sync response.
#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub source: ResponseSource,
    pub total_commits: usize,
    pub repositories: usize,
    pub synced: usize,
    pub served_from_cache: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub commits_fetched: usize,
    pub commits_stored: u64,
    /// Some repository was rejected for bad credentials.
    pub requires_reauth: bool,
}

impl SyncSummary {
    fn from_report(report: &BatchSyncReport, total_commits: usize) -> Self {
        Self {
            source: if report.touched_remote() {
                ResponseSource::Remote
            } else {
                ResponseSource::Cache
            },
            total_commits,
            repositories: report.reports.len(),
            synced: report.synced(),
            served_from_cache: report.served_from_cache(),
            failed: report.failed(),
            cancelled: report.cancelled(),
            commits_fetched: report.total_fetched(),
            commits_stored: report.total_stored(),
            requires_reauth: report.requires_reauth(),
        }
    }
}

/// Answer to [`SyncService::request_sync`].
#[derive(Debug, Clone, Serialize)]
pub struct SyncResponse {
    /// Cached commits in the requested range, newest first.
    pub commits: Vec<CommitModel>,
    pub repositories: Vec<RepositoryStats>,
    pub summary: SyncSummary,
}

/// Answer to [`SyncService::request_backfill`].
#[derive(Debug, Clone, Serialize)]
pub struct BackfillResponse {
    /// Commits written by this backfill.
    pub new_commits: u64,
    /// Cached commits from the requested start until now.
    pub total_commits: usize,
    pub report: BatchSyncReport,
}

/// Sync operations scoped to a user.
pub struct SyncService<S> {
    orchestrator: SyncOrchestrator<S>,
}

impl<S> Clone for SyncService<S> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: self.orchestrator.clone(),
        }
    }
}

impl<S> std::fmt::Debug for SyncService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncService")
            .field("orchestrator", &self.orchestrator)
            .finish()
    }
}

impl<S: CommitSource + 'static> SyncService<S> {
    pub fn new(orchestrator: SyncOrchestrator<S>) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &SyncOrchestrator<S> {
        &self.orchestrator
    }

    fn store(&self) -> &CommitStore {
        self.orchestrator.store()
    }

    /// Sync every enabled repository of `user_id` for `range` and return the
    /// commits in it.
    pub async fn request_sync(
        &self,
        user_id: &str,
        range: DateRange,
        force_refresh: bool,
        cancel: &CancellationToken,
    ) -> Result<SyncResponse, SyncError> {
        let repositories = self.store().sync_repositories(user_id).await?;
        let orchestrator = if force_refresh {
            self.orchestrator.with_force_refresh(true)
        } else {
            self.orchestrator.clone()
        };

        let result = orchestrator
            .sync(user_id, &repositories, range, cancel)
            .await?;

        let stats = result
            .report
            .reports
            .iter()
            .map(|r| RepositoryStats::from_report(r, &result.commits))
            .collect();
        let summary = SyncSummary::from_report(&result.report, result.commits.len());

        Ok(SyncResponse {
            commits: result.commits,
            repositories: stats,
            summary,
        })
    }

    /// Extend cached history of every enabled repository back to `start`.
    pub async fn request_backfill(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<BackfillResponse, SyncError> {
        let repositories = self.store().sync_repositories(user_id).await?;
        let report = self
            .orchestrator
            .backfill_older(user_id, &repositories, start, cancel)
            .await?;

        let ids: Vec<Uuid> = repositories.iter().map(|r| r.id).collect();
        let total_commits = self
            .store()
            .query_range(&ids, start, Utc::now())
            .await?
            .len();

        Ok(BackfillResponse {
            new_commits: report.total_stored(),
            total_commits,
            report,
        })
    }

    pub async fn register_repository(
        &self,
        user_id: &str,
        input: &RepositoryInput,
    ) -> Result<RepositoryModel, SyncError> {
        Ok(self.store().register_repository(user_id, input).await?)
    }

    /// Register every repository the authenticated user can see.
    ///
    /// Existing rows keep their sync state; only metadata is refreshed.
    pub async fn discover_repositories(
        &self,
        user_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<RepositoryModel>, SyncError> {
        let source = self.orchestrator.source();
        if !source.has_credentials() {
            return Err(SyncError::AuthRequired);
        }

        let mut registered = Vec::new();
        for page in 1..=DISCOVERY_MAX_PAGES {
            if cancel.is_cancelled() {
                break;
            }
            let label = format!("user repositories p{}", page);
            let batch = self
                .orchestrator
                .retry_policy()
                .execute(&label, None, || source.list_user_repos(page, MAX_PAGE_SIZE))
                .await?;

            tracing::debug!(page, count = batch.len(), "Fetched repository page");
            for remote in &batch {
                let input = RepositoryInput::from(remote);
                registered.push(self.store().register_repository(user_id, &input).await?);
            }
            if batch.len() < MAX_PAGE_SIZE as usize {
                break;
            }
        }

        tracing::info!(user_id, count = registered.len(), "Discovered repositories");
        Ok(registered)
    }

    pub async fn list_repositories(&self, user_id: &str) -> Result<Vec<RepositoryModel>, SyncError> {
        Ok(self.store().all_repositories(user_id).await?)
    }

    pub async fn set_sync_enabled(&self, repository_id: Uuid, enabled: bool) -> Result<(), SyncError> {
        Ok(self.store().set_sync_enabled(repository_id, enabled).await?)
    }

    /// Delete a repository and its cached commits.
    pub async fn remove_repository(&self, repository_id: Uuid) -> Result<(), SyncError> {
        Ok(self.store().remove_repository(repository_id).await?)
    }

    pub async fn cache_stats(&self, user_id: &str) -> Result<CacheStats, SyncError> {
        Ok(self.store().cache_stats(user_id).await?)
    }
}
