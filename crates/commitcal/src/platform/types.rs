use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::entity::commit_details::{AuthorProfile, DEFAULT_AVATAR_URL, DiffFileSummary};
use crate::entity::commit_status::CommitStatus;
use crate::entity::repository::Model as RepositoryModel;

use super::errors::Result;

/// Largest page size the remote accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Rate limit state reported in response headers.
#[derive(Debug, Clone)]
pub struct RateLimitInfo {
    pub limit: u64,
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

/// Address of a remote repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl From<&RepositoryModel> for RepoRef {
    fn from(model: &RepositoryModel) -> Self {
        Self::new(model.owner.clone(), model.name.clone())
    }
}

/// One page of a commit listing, optionally bounded in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: u32,
    /// Page size, never above [`MAX_PAGE_SIZE`].
    pub per_page: u32,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl PageRequest {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PAGE_SIZE),
            since: None,
            until: None,
        }
    }

    #[must_use]
    pub fn within(mut self, since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self.until = Some(until);
        self
    }
}

/// A commit as returned by the remote, already decoded and enriched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommit {
    pub sha: String,
    pub message: String,
    pub author_name: String,
    /// Account login linked to the commit author, when the remote knows one.
    pub author_login: Option<String>,
    pub author_date: DateTime<Utc>,
    pub verified: bool,
    pub html_url: String,
    pub avatar_url: Option<String>,
    /// `None` when the profile was not fetched or the fetch failed.
    pub author_profile: Option<AuthorProfile>,
    /// `None` when the diff was not fetched or the fetch failed. A fetched
    /// diff with no file changes is `Some(vec![])`.
    pub diff: Option<Vec<DiffFileSummary>>,
}

impl RemoteCommit {
    #[inline]
    pub fn status(&self) -> CommitStatus {
        CommitStatus::from_verified(self.verified)
    }

    pub fn avatar_or_default(&self) -> String {
        self.avatar_url
            .clone()
            .unwrap_or_else(|| DEFAULT_AVATAR_URL.to_string())
    }
}

/// A repository visible to the authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRepository {
    pub owner: String,
    pub name: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub stars: u32,
    pub forks: u32,
    pub is_private: bool,
    pub html_url: String,
}

/// The remote side of a sync: anything that can list commits page by page.
///
/// Implementations must return commits in the order the remote provides them
/// (newest first). A page shorter than `per_page` ends the walk.
#[async_trait]
pub trait CommitSource: Send + Sync {
    /// Whether a credential is configured. Sync fails fast without one.
    fn has_credentials(&self) -> bool;

    /// Fetch one page of commits.
    ///
    /// `cancel` is checked between per-commit enrichment calls; when it fires
    /// the commits enriched so far are returned.
    async fn fetch_page(
        &self,
        repo: &RepoRef,
        request: &PageRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<RemoteCommit>>;

    /// List repositories of the authenticated user, most recently updated first.
    async fn list_user_repos(&self, page: u32, per_page: u32) -> Result<Vec<RemoteRepository>>;
}

#[async_trait]
impl<S: CommitSource + ?Sized> CommitSource for std::sync::Arc<S> {
    fn has_credentials(&self) -> bool {
        (**self).has_credentials()
    }

    async fn fetch_page(
        &self,
        repo: &RepoRef,
        request: &PageRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<RemoteCommit>> {
        (**self).fetch_page(repo, request, cancel).await
    }

    async fn list_user_repos(&self, page: u32, per_page: u32) -> Result<Vec<RemoteRepository>> {
        (**self).list_user_repos(page, per_page).await
    }
}
