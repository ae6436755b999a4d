//! Durable commit cache.
//!
//! Commits are keyed by `(repository_id, sha)` and upserted, so re-running a
//! sync never duplicates rows. Range reads page through the table internally
//! and return commits newest first.
//!
//! The free functions take a `&DatabaseConnection`; [`CommitStore`] bundles a
//! shared connection with the upsert retry settings for the sync engine.
//!
//! ```ignore
//! use commitcal::store::CommitStore;
//!
//! let store = CommitStore::new(Arc::new(db));
//! let stored = store.upsert(repo.id, &commits).await?;
//! let cached = store.query_range(&[repo.id], start, end).await?;
//! ```

mod commits;
mod errors;
mod repositories;
mod stats;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::entity::commit::Model as CommitModel;
use crate::entity::repository::Model as RepositoryModel;
use crate::platform::RemoteCommit;

pub use commits::{
    DEFAULT_UPSERT_BACKOFF_MS, DEFAULT_UPSERT_RETRIES, Enrichment, UpsertSummary,
    bulk_upsert_with_retry, count_for_repository, latest_commit_date, oldest_commit_date,
    query_range, upsert_commits,
};
pub(crate) use commits::sort_newest_first;
pub use errors::{Result, StoreError};
pub use repositories::{
    RepositoryInput, find_by_id, find_by_natural_key, find_for_user, mark_synced, register,
    remove, set_sync_enabled,
};
pub use stats::{CacheStats, RepositoryCacheStats, cache_stats};

/// Shared handle over the commit cache.
#[derive(Clone)]
pub struct CommitStore {
    db: Arc<DatabaseConnection>,
    upsert_retries: u32,
    upsert_backoff_ms: u64,
}

impl CommitStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            upsert_retries: DEFAULT_UPSERT_RETRIES,
            upsert_backoff_ms: DEFAULT_UPSERT_BACKOFF_MS,
        }
    }

    /// Override how often a locked or busy upsert is retried.
    #[must_use]
    pub fn with_upsert_retry(mut self, retries: u32, initial_backoff_ms: u64) -> Self {
        self.upsert_retries = retries;
        self.upsert_backoff_ms = initial_backoff_ms;
        self
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    // ─── Commits ─────────────────────────────────────────────────────────────

    pub async fn upsert(
        &self,
        repository_id: Uuid,
        commits: &[RemoteCommit],
    ) -> Result<UpsertSummary> {
        upsert_commits(
            &self.db,
            repository_id,
            commits,
            self.upsert_retries,
            self.upsert_backoff_ms,
        )
        .await
    }

    pub async fn query_range(
        &self,
        repository_ids: &[Uuid],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CommitModel>> {
        query_range(&self.db, repository_ids, start, end).await
    }

    pub async fn oldest_commit_date(&self, repository_id: Uuid) -> Result<Option<DateTime<Utc>>> {
        oldest_commit_date(&self.db, repository_id).await
    }

    pub async fn latest_commit_date(&self, repository_id: Uuid) -> Result<Option<DateTime<Utc>>> {
        latest_commit_date(&self.db, repository_id).await
    }

    pub async fn count_for_repository(&self, repository_id: Uuid) -> Result<u64> {
        count_for_repository(&self.db, repository_id).await
    }

    // ─── Repositories ────────────────────────────────────────────────────────

    pub async fn register_repository(
        &self,
        user_id: &str,
        input: &RepositoryInput,
    ) -> Result<RepositoryModel> {
        register(&self.db, user_id, input).await
    }

    /// Repositories of a user that take part in sync.
    pub async fn sync_repositories(&self, user_id: &str) -> Result<Vec<RepositoryModel>> {
        find_for_user(&self.db, user_id, true).await
    }

    pub async fn all_repositories(&self, user_id: &str) -> Result<Vec<RepositoryModel>> {
        find_for_user(&self.db, user_id, false).await
    }

    pub async fn find_repository(&self, id: Uuid) -> Result<RepositoryModel> {
        find_by_id(&self.db, id)
            .await?
            .ok_or_else(|| StoreError::not_found_by_id(id))
    }

    pub async fn mark_synced(&self, repository_id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        mark_synced(&self.db, repository_id, at).await
    }

    pub async fn set_sync_enabled(&self, repository_id: Uuid, enabled: bool) -> Result<()> {
        set_sync_enabled(&self.db, repository_id, enabled).await
    }

    pub async fn remove_repository(&self, repository_id: Uuid) -> Result<()> {
        remove(&self.db, repository_id).await
    }

    pub async fn cache_stats(&self, user_id: &str) -> Result<CacheStats> {
        cache_stats(&self.db, user_id).await
    }
}

impl std::fmt::Debug for CommitStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitStore")
            .field("upsert_retries", &self.upsert_retries)
            .field("upsert_backoff_ms", &self.upsert_backoff_ms)
            .finish_non_exhaustive()
    }
}
