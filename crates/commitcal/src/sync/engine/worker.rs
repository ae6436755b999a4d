//! One repository's sync unit: windows in order, upsert per window, then the
//! sync timestamp.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::entity::repository::Model as RepositoryModel;
use crate::platform::{CommitSource, PlatformError, RepoRef};
use crate::retry::RetryPolicy;
use crate::store::CommitStore;
use crate::sync::progress::{ProgressCallback, SyncProgress, emit};
use crate::sync::types::{
    RepoOutcome, RepoSyncState, SyncFailure, SyncOptions, SyncReport,
};
use crate::sync::window::SyncWindow;

use super::fetch::{WindowEnd, WindowFetch};

/// A repository and the windows to fetch for it.
#[derive(Debug, Clone)]
pub(super) struct RepoJob {
    pub repo: RepositoryModel,
    pub windows: Vec<SyncWindow>,
    /// Advance `last_synced_at` on success. Backfills leave it alone.
    pub mark_synced: bool,
}

/// Owned handles for a spawned repository task.
pub(super) struct RepoWorker<S> {
    pub(super) source: Arc<S>,
    pub(super) store: CommitStore,
    pub(super) retry: RetryPolicy,
    pub(super) options: SyncOptions,
    pub(super) progress: Option<Arc<ProgressCallback>>,
    pub(super) cancel: CancellationToken,
}

impl<S: CommitSource> RepoWorker<S> {
    #[inline]
    pub(super) fn on_progress(&self) -> Option<&ProgressCallback> {
        self.progress.as_deref()
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

    /// Report for a job that never started because the run was cancelled.
    pub(super) fn cancelled(&self, job: &RepoJob) -> SyncReport {
        let full_name = job.repo.full_name();
        self.state(&full_name, RepoSyncState::Cancelled);
        let mut report = SyncReport::new(&job.repo, RepoOutcome::Cancelled);
        report.windows_total = job.windows.len();
        report
    }

    pub(super) async fn run(&self, job: RepoJob) -> SyncReport {
        let RepoJob {
            repo,
            windows,
            mark_synced,
        } = job;
        let repo_ref = RepoRef::from(&repo);
        let full_name = repo.full_name();
        let started_at = Utc::now();

        let mut report = SyncReport::new(&repo, RepoOutcome::Synced);
        report.windows_total = windows.len();

        let mut remaining = self.options.max_commits_per_repo;
        let mut fetched = 0usize;
        let mut failure: Option<SyncFailure> = None;
        let mut cancelled = false;

        for (index, window) in windows.iter().enumerate() {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            self.state(&full_name, RepoSyncState::Fetching);
            emit(
                self.on_progress(),
                SyncProgress::FetchingWindow {
                    repo: full_name.clone(),
                    window: window.label.clone(),
                    index: index + 1,
                    total: windows.len(),
                },
            );

            let WindowFetch { commits, end } = self
                .walk_window(&repo_ref, window, &mut remaining, &mut fetched)
                .await;
            report.commits_fetched += commits.len();

            // Whatever was fetched is stored, even when the walk was cut short.
            if !commits.is_empty() {
                self.state(&full_name, RepoSyncState::Storing);
                match self.store.upsert(repo.id, &commits).await {
                    Ok(summary) => {
                        report.commits_stored += summary.stored;
                        emit(
                            self.on_progress(),
                            SyncProgress::CommitsStored {
                                repo: full_name.clone(),
                                window: window.label.clone(),
                                stored: summary.stored,
                            },
                        );
                    }
                    Err(e) => {
                        tracing::error!(repo = %full_name, error = %e, "Failed to store commits");
                        failure = Some(SyncFailure::from(&e));
                        break;
                    }
                }
            }

            match end {
                WindowEnd::Exhausted | WindowEnd::PageCap => report.windows_completed += 1,
                WindowEnd::CommitCap => {
                    report.windows_completed += 1;
                    break;
                }
                WindowEnd::Cancelled => {
                    cancelled = true;
                    break;
                }
                WindowEnd::Failed(e @ PlatformError::MalformedResponse { .. }) => {
                    emit(
                        self.on_progress(),
                        SyncProgress::WindowSkipped {
                            repo: full_name.clone(),
                            window: window.label.clone(),
                            error: e.to_string(),
                        },
                    );
                    failure.get_or_insert_with(|| SyncFailure::from(&e));
                }
                WindowEnd::Failed(e) => {
                    failure = Some(SyncFailure::from(&e));
                    break;
                }
            }
        }

        let synced_at = mark_synced.then_some(started_at);
        self.finish(&repo, report, failure, cancelled, synced_at)
            .await
    }

    async fn finish(
        &self,
        repo: &RepositoryModel,
        mut report: SyncReport,
        mut failure: Option<SyncFailure>,
        cancelled: bool,
        synced_at: Option<DateTime<Utc>>,
    ) -> SyncReport {
        let full_name = repo.full_name();

        if failure.is_none()
            && !cancelled
            && let Some(at) = synced_at
            && let Err(e) = self.store.mark_synced(repo.id, at).await
        {
            tracing::error!(repo = %full_name, error = %e, "Failed to record sync time");
            failure = Some(SyncFailure::from(&e));
        }

        let (outcome, state) = match (&failure, cancelled) {
            (Some(_), _) => (RepoOutcome::Failed, RepoSyncState::Failed),
            (None, true) => (RepoOutcome::Cancelled, RepoSyncState::Cancelled),
            (None, false) => (RepoOutcome::Synced, RepoSyncState::Done),
        };
        report.outcome = outcome;

        if let Some(failure) = failure {
            tracing::warn!(
                repo = %full_name,
                kind = ?failure.kind,
                error = %failure.message,
                "Repository sync failed"
            );
            emit(
                self.on_progress(),
                SyncProgress::RepoFailed {
                    repo: full_name.clone(),
                    error: failure.message.clone(),
                },
            );
            report.error = Some(failure);
        } else {
            tracing::info!(
                repo = %full_name,
                fetched = report.commits_fetched,
                stored = report.commits_stored,
                outcome = %outcome,
                "Repository sync finished"
            );
        }

        self.state(&full_name, state);
        emit(
            self.on_progress(),
            SyncProgress::RepoFinished {
                repo: full_name,
                outcome,
                fetched: report.commits_fetched,
                stored: report.commits_stored,
            },
        );
        report
    }
}
