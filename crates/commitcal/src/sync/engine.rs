//! Sync orchestration.
//!
//! [`SyncOrchestrator::sync`] partitions repositories into fresh and stale,
//! fetches the stale ones window by window with bounded concurrency, and
//! returns every cached commit in the range along with a per-repository
//! report. [`SyncOrchestrator::backfill_older`] fetches only the history
//! older than what is already cached.
//!
//! A failing repository never aborts the batch, and neither does a failed
//! cache read: it is recorded against the repository it concerns. The only
//! batch-level error is missing credentials, checked before any remote call.

mod fetch;
mod worker;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::entity::commit::Model as CommitModel;
use crate::entity::repository::Model as RepositoryModel;
use crate::platform::CommitSource;
use crate::retry::RetryPolicy;
use crate::store::{CommitStore, StoreError, sort_newest_first};

use super::freshness::FreshnessEvaluator;
use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::{
    BatchSyncReport, DateRange, FailureKind, RepoOutcome, RepoSyncState, SyncError, SyncFailure,
    SyncOptions, SyncReport, SyncResult,
};
use super::window::TimeWindowPlanner;

use worker::{RepoJob, RepoWorker};

/// Coordinates freshness checks, remote fetches and cache writes.
///
/// Build one with [`SyncOrchestrator::builder`]. Each call takes its own
/// [`CancellationToken`], so concurrent runs never cancel each other.
pub struct SyncOrchestrator<S> {
    pub(crate) source: Arc<S>,
    pub(crate) store: CommitStore,
    pub(crate) retry: RetryPolicy,
    pub(crate) options: SyncOptions,
    pub(crate) progress: Option<Arc<ProgressCallback>>,
}

impl<S> Clone for SyncOrchestrator<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            store: self.store.clone(),
            retry: self.retry.clone(),
            options: self.options.clone(),
            progress: self.progress.clone(),
        }
    }
}

impl<S> std::fmt::Debug for SyncOrchestrator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("store", &self.store)
            .field("retry", &self.retry)
            .field("options", &self.options)
            .field("progress", &self.progress.is_some())
            .finish_non_exhaustive()
    }
}

impl<S: CommitSource + 'static> SyncOrchestrator<S> {
    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn store(&self) -> &CommitStore {
        &self.store
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// A copy of this orchestrator with `force_refresh` overridden.
    #[must_use]
    pub fn with_force_refresh(&self, force: bool) -> Self {
        let mut orchestrator = self.clone();
        orchestrator.options.force_refresh = force;
        orchestrator
    }

    fn on_progress(&self) -> Option<&ProgressCallback> {
        self.progress.as_deref()
    }

    fn worker(&self, cancel: &CancellationToken) -> RepoWorker<S> {
        RepoWorker {
            source: Arc::clone(&self.source),
            store: self.store.clone(),
            retry: self.retry.clone(),
            options: self.options.clone(),
            progress: self.progress.clone(),
            cancel: cancel.clone(),
        }
    }

    /// Bring `repositories` up to date for `range` and return the cached
    /// commits in that range, newest first.
    ///
    /// Fresh repositories are served from the cache without remote calls. If
    /// any repository is stale and the source has no credentials, the call
    /// fails with [`SyncError::AuthRequired`] before contacting the remote.
    /// A repository whose cached commits cannot be read is reported failed
    /// with [`FailureKind::Store`]; the rest of the batch is unaffected.
    #[tracing::instrument(
        skip(self, repositories, range, cancel),
        fields(repositories = repositories.len(), start = %range.start, end = %range.end)
    )]
    pub async fn sync(
        &self,
        user_id: &str,
        repositories: &[RepositoryModel],
        range: DateRange,
        cancel: &CancellationToken,
    ) -> Result<SyncResult, SyncError> {
        let started_at = Utc::now();

        let (cached, unreadable) = self.read_cached(repositories, range).await;
        let mut cached_counts: HashMap<Uuid, usize> = HashMap::new();
        for commit in &cached {
            *cached_counts.entry(commit.repository_id).or_default() += 1;
        }

        let freshness = FreshnessEvaluator::new(self.options.ttl);
        let mut reports = Vec::with_capacity(repositories.len());
        let mut stale = Vec::new();
        let mut fresh = 0usize;

        for repo in repositories {
            let full_name = repo.full_name();
            if let Some(e) = unreadable.get(&repo.id) {
                self.state(&full_name, RepoSyncState::Failed);
                reports.push(SyncReport::failed(repo, SyncFailure::from(e)));
                continue;
            }
            self.state(&full_name, RepoSyncState::CheckingFreshness);

            let cached_in_range = cached_counts.get(&repo.id).copied().unwrap_or(0);
            let verdict = freshness.evaluate(
                repo.last_synced_at.map(|t| t.with_timezone(&Utc)),
                cached_in_range,
                self.options.force_refresh,
                started_at,
            );

            if verdict.needs_refresh() {
                tracing::debug!(repo = %full_name, cached_in_range, reason = ?verdict, "Repository is stale");
                stale.push(repo.clone());
            } else {
                tracing::debug!(repo = %full_name, cached_in_range, "Serving repository from cache");
                self.state(&full_name, RepoSyncState::ServedFromCache);
                reports.push(SyncReport::new(repo, RepoOutcome::ServedFromCache));
                fresh += 1;
            }
        }

        emit(
            self.on_progress(),
            SyncProgress::SyncPlanned {
                repositories: repositories.len(),
                fresh,
                stale: stale.len(),
            },
        );

        if stale.is_empty() {
            return Ok(SyncResult {
                commits: cached,
                report: self.finish_batch(repositories, reports, started_at),
            });
        }

        if !self.source.has_credentials() {
            tracing::warn!(stale = stale.len(), "Stale repositories but no credentials");
            return Err(SyncError::AuthRequired);
        }

        let windows = self.planner().plan_range(range.start, range.end);
        let jobs = stale
            .iter()
            .map(|repo| RepoJob {
                repo: repo.clone(),
                windows: windows.clone(),
                mark_synced: true,
            })
            .collect();
        reports.extend(self.run_jobs(jobs, cancel).await);

        // Fresh repositories are unchanged; only fetched ones are read again.
        let (fetched, unreadable) = self.read_cached(&stale, range).await;
        for report in &mut reports {
            if let Some(e) = unreadable.get(&report.repository_id) {
                report.fail(SyncFailure::from(e));
            }
        }

        let refreshed: HashSet<Uuid> = stale.iter().map(|r| r.id).collect();
        let mut commits: Vec<CommitModel> = cached
            .into_iter()
            .filter(|c| !refreshed.contains(&c.repository_id))
            .chain(fetched)
            .collect();
        sort_newest_first(&mut commits);

        Ok(SyncResult {
            commits,
            report: self.finish_batch(repositories, reports, started_at),
        })
    }

    /// Cached commits of `repositories` within `range`, newest first.
    ///
    /// Each repository is read on its own so a failed read only affects that
    /// repository; failures are returned keyed by repository id.
    async fn read_cached(
        &self,
        repositories: &[RepositoryModel],
        range: DateRange,
    ) -> (Vec<CommitModel>, HashMap<Uuid, StoreError>) {
        let mut commits = Vec::new();
        let mut failures = HashMap::new();
        let mut seen = HashSet::new();

        for repo in repositories {
            if !seen.insert(repo.id) {
                continue;
            }
            match self
                .store
                .query_range(&[repo.id], range.start, range.end)
                .await
            {
                Ok(rows) => commits.extend(rows),
                Err(e) => {
                    tracing::error!(repo = %repo.full_name(), error = %e, "Failed to read cached commits");
                    failures.insert(repo.id, e);
                }
            }
        }

        sort_newest_first(&mut commits);
        (commits, failures)
    }

    /// Fetch history older than each repository's oldest cached commit, back
    /// to `requested_start`.
    ///
    /// For each repository the gap is `[requested_start, oldest)`, or
    /// `[requested_start, now)` when nothing is cached. Repositories without a
    /// gap are skipped. Backfill does not advance `last_synced_at`.
    #[tracing::instrument(
        skip(self, repositories, cancel),
        fields(repositories = repositories.len())
    )]
    pub async fn backfill_older(
        &self,
        user_id: &str,
        repositories: &[RepositoryModel],
        requested_start: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<BatchSyncReport, SyncError> {
        let started_at = Utc::now();
        let planner = self.planner();
        let mut reports = Vec::with_capacity(repositories.len());
        let mut jobs = Vec::new();

        for repo in repositories {
            let full_name = repo.full_name();
            let oldest = match self.store.oldest_commit_date(repo.id).await {
                Ok(oldest) => oldest,
                Err(e) => {
                    tracing::error!(repo = %full_name, error = %e, "Failed to read oldest commit");
                    self.state(&full_name, RepoSyncState::Failed);
                    reports.push(SyncReport::failed(repo, SyncFailure::from(&e)));
                    continue;
                }
            };

            let gap_end = oldest.unwrap_or(started_at);
            // The remote treats `until` as inclusive; stop one second short of
            // the oldest cached commit so it is not fetched again.
            let windows = if requested_start < gap_end {
                planner.plan_range(requested_start, gap_end - Duration::seconds(1))
            } else {
                Vec::new()
            };

            if windows.is_empty() {
                tracing::debug!(repo = %full_name, oldest = ?oldest, "No history gap to backfill");
                self.state(&full_name, RepoSyncState::Skipped);
                reports.push(SyncReport::new(repo, RepoOutcome::Skipped));
                continue;
            }

            tracing::debug!(
                repo = %full_name,
                gap_start = %requested_start,
                gap_end = %gap_end,
                windows = windows.len(),
                "Backfilling history gap"
            );
            jobs.push(RepoJob {
                repo: repo.clone(),
                windows,
                mark_synced: false,
            });
        }

        emit(
            self.on_progress(),
            SyncProgress::SyncPlanned {
                repositories: repositories.len(),
                fresh: repositories.len() - jobs.len(),
                stale: jobs.len(),
            },
        );

        if !jobs.is_empty() {
            if !self.source.has_credentials() {
                tracing::warn!(pending = jobs.len(), "Backfill needed but no credentials");
                return Err(SyncError::AuthRequired);
            }
            reports.extend(self.run_jobs(jobs, cancel).await);
        }

        Ok(self.finish_batch(repositories, reports, started_at))
    }

    fn planner(&self) -> TimeWindowPlanner {
        TimeWindowPlanner::new(self.options.window_months)
    }

    fn state(&self, repo: &str, state: RepoSyncState) {
        emit(
            self.on_progress(),
            SyncProgress::RepoState {
                repo: repo.to_string(),
                state,
            },
        );
    }

    /// Run repository jobs on at most `concurrency` tasks.
    async fn run_jobs(&self, jobs: Vec<RepoJob>, cancel: &CancellationToken) -> Vec<SyncReport> {
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let mut handles = Vec::with_capacity(jobs.len());

        for job in jobs {
            let repo = job.repo.clone();
            let worker = self.worker(cancel);
            let semaphore = Arc::clone(&semaphore);

            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return SyncReport::failed(
                            &job.repo,
                            SyncFailure::new(FailureKind::Internal, "Semaphore closed unexpectedly"),
                        );
                    }
                };

                if worker.cancel.is_cancelled() {
                    return worker.cancelled(&job);
                }
                worker.run(job).await
            });

            handles.push((repo, handle));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for (repo, handle) in handles {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    tracing::error!(repo = %repo.full_name(), error = %e, "Repository task panicked");
                    reports.push(SyncReport::failed(
                        &repo,
                        SyncFailure::new(FailureKind::Internal, format!("Task panic: {}", e)),
                    ));
                }
            }
        }
        reports
    }

    /// Order reports like the input and emit the completion event.
    fn finish_batch(
        &self,
        repositories: &[RepositoryModel],
        mut reports: Vec<SyncReport>,
        started_at: DateTime<Utc>,
    ) -> BatchSyncReport {
        let order: HashMap<Uuid, usize> = repositories
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id, i))
            .collect();
        reports.sort_by_key(|r| order.get(&r.repository_id).copied().unwrap_or(usize::MAX));

        let batch = BatchSyncReport {
            reports,
            started_at,
            finished_at: Utc::now(),
        };

        tracing::info!(
            synced = batch.synced(),
            cached = batch.served_from_cache(),
            failed = batch.failed(),
            cancelled = batch.cancelled(),
            skipped = batch.skipped(),
            "Sync batch complete"
        );
        emit(
            self.on_progress(),
            SyncProgress::SyncComplete {
                synced: batch.synced(),
                cached: batch.served_from_cache(),
                failed: batch.failed(),
                cancelled: batch.cancelled(),
                skipped: batch.skipped(),
            },
        );
        batch
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, MockExecResult};

    use crate::entity::commit;
    use crate::entity::visibility::Visibility;
    use crate::platform::{PageRequest, RemoteCommit, RemoteRepository, RepoRef, Result};
    use crate::retry::RetryConfig;

    use super::*;

    /// Serves the same three commits for every repository.
    #[derive(Default)]
    struct ThreeCommits {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CommitSource for ThreeCommits {
        fn has_credentials(&self) -> bool {
            true
        }

        async fn fetch_page(
            &self,
            repo: &RepoRef,
            _request: &PageRequest,
            _cancel: &CancellationToken,
        ) -> Result<Vec<RemoteCommit>> {
            self.calls
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(repo.full_name());
            let now = Utc::now();
            Ok((1..=3)
                .map(|i| RemoteCommit {
                    sha: format!("sha{i}"),
                    message: format!("commit {i}"),
                    author_name: "Jane".to_string(),
                    author_login: None,
                    author_date: now - Duration::days(i),
                    verified: false,
                    html_url: format!("https://github.com/a/x/commit/sha{i}"),
                    avatar_url: None,
                    author_profile: None,
                    diff: None,
                })
                .collect())
        }

        async fn list_user_repos(&self, _page: u32, _per_page: u32) -> Result<Vec<RemoteRepository>> {
            Ok(Vec::new())
        }
    }

    fn repository(name: &str) -> RepositoryModel {
        let now = Utc::now().fixed_offset();
        RepositoryModel {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            owner: "a".to_string(),
            name: name.to_string(),
            description: None,
            language: None,
            stars: 0,
            forks: 0,
            visibility: Visibility::Public,
            html_url: format!("https://github.com/a/{name}"),
            sync_enabled: true,
            last_synced_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn orchestrator(db: MockDatabase) -> SyncOrchestrator<ThreeCommits> {
        SyncOrchestrator::builder()
            .source(ThreeCommits::default())
            .store(CommitStore::new(Arc::new(db.into_connection())))
            .retry(RetryConfig::disabled())
            .build()
            .expect("orchestrator builds")
    }

    fn last_ten_days() -> DateRange {
        let now = Utc::now();
        DateRange::new(now - Duration::days(10), now).expect("valid range")
    }

    fn stored(rows: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: rows,
        }
    }

    #[tokio::test]
    async fn failed_final_read_keeps_reports_and_fails_the_repository() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_results([Vec::<commit::Model>::new()])
            .append_exec_results([stored(3), stored(1)])
            .append_query_errors([DbErr::Custom("disk I/O error".to_string())]);
        let orchestrator = orchestrator(db);
        let repo = repository("x");

        let result = orchestrator
            .sync(
                "user-1",
                std::slice::from_ref(&repo),
                last_ten_days(),
                &CancellationToken::new(),
            )
            .await
            .expect("a failed cache read does not abort the batch");

        assert!(result.commits.is_empty());
        let report = &result.report.reports[0];
        assert_eq!(report.outcome, RepoOutcome::Failed);
        assert_eq!(report.error.as_ref().map(|e| e.kind), Some(FailureKind::Store));
        assert_eq!(report.commits_fetched, 3);
        assert_eq!(report.commits_stored, 3);
        assert_eq!(report.windows_completed, 1);
    }

    #[tokio::test]
    async fn unreadable_repository_is_not_fetched() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_query_errors([DbErr::Custom("disk I/O error".to_string())])
            .append_query_results([Vec::<commit::Model>::new()])
            .append_exec_results([stored(3), stored(1)])
            .append_query_results([Vec::<commit::Model>::new()]);
        let orchestrator = orchestrator(db);
        let broken = repository("broken");
        let healthy = repository("healthy");

        let result = orchestrator
            .sync(
                "user-1",
                &[broken.clone(), healthy.clone()],
                last_ten_days(),
                &CancellationToken::new(),
            )
            .await
            .expect("sync succeeds");

        let reports = &result.report.reports;
        assert_eq!(reports[0].repository_id, broken.id);
        assert_eq!(reports[0].outcome, RepoOutcome::Failed);
        assert_eq!(reports[0].error.as_ref().map(|e| e.kind), Some(FailureKind::Store));
        assert_eq!(reports[0].commits_fetched, 0);

        assert_eq!(reports[1].repository_id, healthy.id);
        assert_eq!(reports[1].outcome, RepoOutcome::Synced);
        assert_eq!(reports[1].commits_stored, 3);

        let calls = orchestrator
            .source()
            .calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        assert_eq!(calls, vec!["a/healthy".to_string()]);
    }
}
